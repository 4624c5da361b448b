use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::utils::{require_argument, resolve_path};
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the MKD (Make Directory) FTP command.
///
/// Creates a new directory on the session's storage and reports the created
/// path back in quoted 257 form.
pub struct MkdHandler;

#[async_trait]
impl CommandHandler for MkdHandler {
    fn names(&self) -> &'static [&'static str] {
        &["MKD", "XMKD"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let arg = require_argument(&command)?;
        let (path, storage) = resolve_path(&ctx, arg).await?;

        if storage.resolve(&path).await?.exists() {
            warn!("Directory already exists: {}", path);
            return Ok(Some(Reply::new(550, "Directory already exists.")));
        }

        match storage.create_dir(&path).await {
            Ok(()) => {
                info!("Directory created successfully: {}", path);
                Ok(Some(Reply::new(257, format!("\"{}\" created.", path))))
            }
            Err(err) => {
                error!("Failed to create directory {}: {}", path, err);
                Ok(Some(Reply::new(550, "Failed to create directory.")))
            }
        }
    }
}
