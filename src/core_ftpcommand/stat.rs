use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::list::format_list_line;
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;
use crate::core_storage::ResolvedPath;

/// Handles the STAT FTP command.
///
/// Without an argument it reports session status inline; with a path it
/// sends the listing over the control channel, which lets clients inspect
/// a directory while a data transfer is running.
pub struct StatHandler;

#[async_trait]
impl CommandHandler for StatHandler {
    fn names(&self) -> &'static [&'static str] {
        &["STAT"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let arg = command.argument.trim();
        if arg.is_empty() {
            let (username, current, transfer_type) = {
                let session = ctx.session.lock().await;
                (
                    session.username.clone().unwrap_or_else(|| "-".into()),
                    session.current_dir(),
                    session.transfer_type,
                )
            };
            let secured = ctx.adapter.lock().await.is_secured();
            let lines = vec![
                String::from("FTP server status:"),
                format!(" Logged in as {}", username),
                format!(" Working directory: {}", current),
                format!(" TYPE: {}", transfer_type),
                format!(" Control channel: {}", if secured { "TLS" } else { "cleartext" }),
                String::from("End of status"),
            ];
            return Ok(Some(Reply::with_lines(211, lines)));
        }

        let (path, storage) = {
            let session = ctx.session.lock().await;
            let storage = session.storage().ok_or(CommandError::NotLoggedIn)?;
            (session.resolve_virtual(arg), storage)
        };
        let entries = match storage.resolve(&path).await? {
            ResolvedPath::Directory(_) => storage.list(&path).await?,
            ResolvedPath::File(info) => vec![info],
            ResolvedPath::Missing => return Err(CommandError::NotFound(path)),
        };
        let mut lines = vec![format!("Status of {}:", path)];
        for entry in &entries {
            lines.push(format!(" {}", format_list_line(entry)));
        }
        lines.push(String::from("End of status"));
        Ok(Some(Reply::with_lines(213, lines)))
    }
}
