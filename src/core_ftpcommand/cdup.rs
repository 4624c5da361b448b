use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the CDUP (Change to Parent Directory) FTP command. Popping at
/// the root is a harmless no-op.
pub struct CdupHandler;

#[async_trait]
impl CommandHandler for CdupHandler {
    fn names(&self) -> &'static [&'static str] {
        &["CDUP"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        _command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let mut session = ctx.session.lock().await;
        session.dir_stack.pop();
        Ok(Some(Reply::new(200, "Command okay.")))
    }
}
