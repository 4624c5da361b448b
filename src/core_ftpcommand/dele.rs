use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::utils::{require_argument, resolve_path};
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;
use crate::core_storage::ResolvedPath;

/// Handles the DELE (Delete File) FTP command.
pub struct DeleHandler;

#[async_trait]
impl CommandHandler for DeleHandler {
    fn names(&self) -> &'static [&'static str] {
        &["DELE"]
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
            ResolvedPath::File(_) => {}
            ResolvedPath::Directory(_) => {
                return Ok(Some(Reply::new(550, "Is a directory.")));
            }
            ResolvedPath::Missing => return Err(CommandError::NotFound(path)),
        }

        match storage.remove_file(&path).await {
            Ok(()) => {
                info!("File deleted: {}", path);
                Ok(Some(Reply::new(250, "File deleted.")))
            }
            Err(err) => {
                error!("Failed to delete {}: {}", path, err);
                Ok(Some(Reply::new(550, "Failed to delete file.")))
            }
        }
    }
}
