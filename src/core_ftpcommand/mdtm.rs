use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::utils::{format_mdtm, require_argument, resolve_path};
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;
use crate::core_storage::ResolvedPath;

/// Handles the MDTM (Modification Time) FTP command.
pub struct MdtmHandler;

#[async_trait]
impl CommandHandler for MdtmHandler {
    fn names(&self) -> &'static [&'static str] {
        &["MDTM"]
    }

    fn features(&self) -> &'static [&'static str] {
        &["MDTM"]
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
            ResolvedPath::File(info) => match info.modified {
                Some(modified) => Ok(Some(Reply::new(213, format_mdtm(modified)))),
                None => Ok(Some(Reply::new(550, "Modification time unavailable."))),
            },
            _ => Err(CommandError::NotFound(path)),
        }
    }
}
