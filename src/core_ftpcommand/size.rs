use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::utils::{require_argument, resolve_path};
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;
use crate::core_storage::ResolvedPath;

/// Handles the SIZE FTP command.
pub struct SizeHandler;

#[async_trait]
impl CommandHandler for SizeHandler {
    fn names(&self) -> &'static [&'static str] {
        &["SIZE"]
    }

    fn features(&self) -> &'static [&'static str] {
        &["SIZE"]
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
            ResolvedPath::File(info) => Ok(Some(Reply::new(213, info.size.to_string()))),
            _ => Err(CommandError::NotFound(path)),
        }
    }
}
