use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::stor::receive_into_target;
use crate::core_ftpcommand::utils::{require_argument, resolve_path};
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the APPE (Append) FTP command. Refused when the backend cannot
/// append.
pub struct AppeHandler;

#[async_trait]
impl CommandHandler for AppeHandler {
    fn names(&self) -> &'static [&'static str] {
        &["APPE"]
    }

    fn is_abortable(&self) -> bool {
        true
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let arg = require_argument(&command)?;
        let (path, storage) = resolve_path(&ctx, arg).await?;
        if !storage.supports_append() {
            return Err(CommandError::NotSupported);
        }

        let target = storage.append(&path).await?;
        let written = receive_into_target(&ctx, target, &token).await?;

        info!("Appended {} bytes to {}", written, path);
        Ok(Some(Reply::new(226, "File transfer complete.")))
    }
}
