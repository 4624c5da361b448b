use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the ABOR FTP command.
///
/// Cancels the outstanding abortable command, if any. The cancelled
/// command's own 426 arrives as a deferred reply from the coordinator; this
/// reply only acknowledges the abort request.
pub struct AborHandler;

#[async_trait]
impl CommandHandler for AborHandler {
    fn names(&self) -> &'static [&'static str] {
        &["ABOR"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        _command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        if ctx.coordinator.cancel() {
            info!("Abort requested for running transfer");
            Ok(Some(Reply::new(226, "File transfer aborting.")))
        } else {
            Ok(Some(Reply::new(226, "No transfer to abort.")))
        }
    }
}
