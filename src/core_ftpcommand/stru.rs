use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;
use crate::core_session::FileStructure;

/// Handles the STRU FTP command. Only File structure is supported.
pub struct StruHandler;

#[async_trait]
impl CommandHandler for StruHandler {
    fn names(&self) -> &'static [&'static str] {
        &["STRU"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        match FileStructure::parse(&command.argument) {
            Some(FileStructure::File) => {
                ctx.session.lock().await.structure = FileStructure::File;
                Ok(Some(Reply::new(200, "Structure set to File.")))
            }
            Some(_) => Ok(Some(Reply::new(
                504,
                "Only File structure is supported.",
            ))),
            None => Err(CommandError::BadArguments),
        }
    }
}
