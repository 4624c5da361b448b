use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::utils::{require_argument, resolve_path};
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the RNTO (Rename To) FTP command. Requires a pending RNFR; the
/// pending source is cleared whether the rename succeeds or not.
pub struct RntoHandler;

#[async_trait]
impl CommandHandler for RntoHandler {
    fn names(&self) -> &'static [&'static str] {
        &["RNTO"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let arg = require_argument(&command)?;
        let source = ctx
            .session
            .lock()
            .await
            .rename_source
            .take()
            .ok_or(CommandError::BadSequence)?;
        let (target, storage) = resolve_path(&ctx, arg).await?;

        if storage.resolve(&target).await?.exists() {
            return Ok(Some(Reply::new(553, "Target name already exists.")));
        }

        match storage.rename(&source, &target).await {
            Ok(()) => {
                info!("Renamed {} -> {}", source, target);
                Ok(Some(Reply::new(250, "Rename successful.")))
            }
            Err(err) => {
                error!("Failed to rename {} -> {}: {}", source, target, err);
                Ok(Some(Reply::new(550, "Rename failed.")))
            }
        }
    }
}
