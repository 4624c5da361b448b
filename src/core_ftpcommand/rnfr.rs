use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::utils::{require_argument, resolve_path};
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the RNFR (Rename From) FTP command. The source must exist; it is
/// remembered until the following RNTO consumes it.
pub struct RnfrHandler;

#[async_trait]
impl CommandHandler for RnfrHandler {
    fn names(&self) -> &'static [&'static str] {
        &["RNFR"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let arg = require_argument(&command)?;
        let (path, storage) = resolve_path(&ctx, arg).await?;
        if !storage.resolve(&path).await?.exists() {
            return Err(CommandError::NotFound(path));
        }
        info!("Rename source set: {}", path);
        ctx.session.lock().await.rename_source = Some(path);
        Ok(Some(Reply::new(350, "Ready for RNTO.")))
    }
}
