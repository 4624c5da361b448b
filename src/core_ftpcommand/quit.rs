use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the QUIT FTP command.
///
/// The reply carries the close flag; the dispatch loop tears the connection
/// down after writing it.
pub struct QuitHandler;

#[async_trait]
impl CommandHandler for QuitHandler {
    fn names(&self) -> &'static [&'static str] {
        &["QUIT"]
    }

    fn requires_login(&self) -> bool {
        false
    }

    async fn process(
        &self,
        _ctx: Arc<CommandContext>,
        _command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        info!("Received QUIT command. Closing connection.");
        Ok(Some(
            Reply::new(221, "Service closing control connection.").closing(),
        ))
    }
}
