use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;
use crate::core_session::TransmissionMode;

/// Handles the MODE FTP command. Only Stream mode is supported; the command
/// itself is kept for compatibility.
pub struct ModeHandler;

#[async_trait]
impl CommandHandler for ModeHandler {
    fn names(&self) -> &'static [&'static str] {
        &["MODE"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        match TransmissionMode::parse(&command.argument) {
            Some(TransmissionMode::Stream) => {
                ctx.session.lock().await.transmission_mode = TransmissionMode::Stream;
                Ok(Some(Reply::new(200, "Using Stream transfer mode.")))
            }
            Some(_) => Ok(Some(Reply::new(
                504,
                "Only Stream transfer mode is supported.",
            ))),
            None => Err(CommandError::BadArguments),
        }
    }
}
