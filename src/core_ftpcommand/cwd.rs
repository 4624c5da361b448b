use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::utils::require_argument;
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;
use crate::core_storage::ResolvedPath;

/// Handles the CWD (Change Working Directory) FTP command.
///
/// The new directory must resolve to an existing directory on the session's
/// storage before the directory stack is replaced.
pub struct CwdHandler;

#[async_trait]
impl CommandHandler for CwdHandler {
    fn names(&self) -> &'static [&'static str] {
        &["CWD", "XCWD"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let arg = require_argument(&command)?;
        let (stack, storage) = {
            let session = ctx.session.lock().await;
            let storage = session.storage().ok_or(CommandError::NotLoggedIn)?;
            (session.resolve_stack(arg), storage)
        };
        let target = format!("/{}", stack.join("/"));
        match storage.resolve(&target).await? {
            ResolvedPath::Directory(_) => {
                let mut session = ctx.session.lock().await;
                session.dir_stack = stack;
                info!("Changed working directory to {}", target);
                Ok(Some(Reply::new(250, "Directory successfully changed.")))
            }
            _ => Ok(Some(Reply::new(550, "Failed to change directory."))),
        }
    }
}
