use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the SITE FTP command.
///
/// SITE BLST reports the background transfer queue; SITE HELP lists what is
/// available.
pub struct SiteHandler;

#[async_trait]
impl CommandHandler for SiteHandler {
    fn names(&self) -> &'static [&'static str] {
        &["SITE"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let mut parts = command.argument.split_whitespace();
        let subcommand = parts.next().unwrap_or("").to_ascii_uppercase();
        match subcommand.as_str() {
            "BLST" => {
                let statuses = ctx.transfers.statuses();
                if statuses.is_empty() {
                    return Ok(Some(Reply::new(211, "No background transfers.")));
                }
                let mut lines = vec![String::from("Background transfers:")];
                for (id, status) in statuses {
                    lines.push(format!(" {} {}", id, status));
                }
                lines.push(String::from("End"));
                Ok(Some(Reply::with_lines(211, lines)))
            }
            "HELP" => Ok(Some(Reply::with_lines(
                214,
                vec![
                    String::from("The following SITE commands are recognized:"),
                    String::from(" BLST"),
                    String::from(" HELP"),
                    String::from("Direct comments to the server administrator."),
                ],
            ))),
            "" => Err(CommandError::BadArguments),
            other => Ok(Some(Reply::new(
                502,
                format!("SITE {} not implemented.", other),
            ))),
        }
    }
}
