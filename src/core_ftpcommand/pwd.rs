use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the PWD (Print Working Directory) FTP command.
pub struct PwdHandler;

#[async_trait]
impl CommandHandler for PwdHandler {
    fn names(&self) -> &'static [&'static str] {
        &["PWD", "XPWD"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        _command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let current = ctx.session.lock().await.current_dir();
        Ok(Some(Reply::new(257, format!("\"{}\"", current))))
    }
}
