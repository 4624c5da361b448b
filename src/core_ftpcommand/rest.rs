use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::utils::require_argument;
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the REST (Restart) FTP command. The offset applies to the next
/// RETR or STOR, which consumes it.
pub struct RestHandler;

#[async_trait]
impl CommandHandler for RestHandler {
    fn names(&self) -> &'static [&'static str] {
        &["REST"]
    }

    fn features(&self) -> &'static [&'static str] {
        &["REST STREAM"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let arg = require_argument(&command)?;
        let offset: u64 = arg.parse().map_err(|_| CommandError::BadArguments)?;
        ctx.session.lock().await.restart_offset = Some(offset);
        Ok(Some(Reply::new(
            350,
            format!("Restarting at {}. Send STORE or RETRIEVE.", offset),
        )))
    }
}
