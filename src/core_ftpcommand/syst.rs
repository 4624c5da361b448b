use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the SYST FTP command.
pub struct SystHandler;

#[async_trait]
impl CommandHandler for SystHandler {
    fn names(&self) -> &'static [&'static str] {
        &["SYST"]
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
        Ok(Some(Reply::new(215, "UNIX Type: L8")))
    }
}
