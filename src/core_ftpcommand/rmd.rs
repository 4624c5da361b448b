use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::utils::{require_argument, resolve_path};
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;
use crate::core_storage::ResolvedPath;

/// Handles the RMD (Remove Directory) FTP command.
pub struct RmdHandler;

#[async_trait]
impl CommandHandler for RmdHandler {
    fn names(&self) -> &'static [&'static str] {
        &["RMD", "XRMD"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let arg = require_argument(&command)?;
        let (path, storage) = resolve_path(&ctx, arg).await?;

        match storage.resolve(&path).await? {
            ResolvedPath::Directory(_) => {}
            ResolvedPath::File(_) => {
                return Ok(Some(Reply::new(550, "Not a directory.")));
            }
            ResolvedPath::Missing => return Err(CommandError::NotFound(path)),
        }

        match storage.remove_dir(&path).await {
            Ok(()) => {
                info!("Directory removed: {}", path);
                Ok(Some(Reply::new(250, "Directory removed.")))
            }
            Err(err) => {
                error!("Failed to remove directory {}: {}", path, err);
                let message = if storage.supports_non_empty_dir_removal() {
                    "Failed to remove directory."
                } else {
                    "Failed to remove directory (it may not be empty)."
                };
                Ok(Some(Reply::new(550, message)))
            }
        }
    }
}
