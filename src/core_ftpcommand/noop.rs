use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the NOOP FTP command.
pub struct NoopHandler;

#[async_trait]
impl CommandHandler for NoopHandler {
    fn names(&self) -> &'static [&'static str] {
        &["NOOP"]
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
        Ok(Some(Reply::new(200, "Command okay.")))
    }
}
