use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;
use crate::core_session::TransferType;

/// Handles the TYPE FTP command.
///
/// Sets the transfer type to ASCII, EBCDIC, Image, or Local Byte. Bytes are
/// transferred verbatim in every type; only the reported setting changes.
pub struct TypeHandler;

#[async_trait]
impl CommandHandler for TypeHandler {
    fn names(&self) -> &'static [&'static str] {
        &["TYPE"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        match TransferType::parse(&command.argument) {
            Some(transfer_type) => {
                ctx.session.lock().await.transfer_type = transfer_type;
                Ok(Some(Reply::new(
                    200,
                    format!("Type set to {}", transfer_type),
                )))
            }
            None => Ok(Some(Reply::new(
                504,
                "Command not implemented for that parameter.",
            ))),
        }
    }
}
