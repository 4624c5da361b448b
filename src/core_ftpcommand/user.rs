use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::constants::USERNAME_REGEX;
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the USER FTP command.
///
/// Remembers the username for the following PASS and asks the client for
/// the password. A second USER restarts the login exchange.
pub struct UserHandler;

#[async_trait]
impl CommandHandler for UserHandler {
    fn names(&self) -> &'static [&'static str] {
        &["USER"]
    }

    fn requires_login(&self) -> bool {
        false
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let username = command.argument.trim();
        if username.is_empty() {
            return Err(CommandError::BadArguments);
        }
        let valid = Regex::new(USERNAME_REGEX)
            .map(|re| re.is_match(username))
            .unwrap_or(false);
        if !valid {
            warn!("Rejected malformed username");
            return Err(CommandError::BadArguments);
        }

        {
            let mut session = ctx.session.lock().await;
            session.pending_user = Some(username.to_string());
            session.is_authenticated = false;
        }

        let reply = if username.eq_ignore_ascii_case("anonymous") {
            info!("Anonymous login initiated");
            Reply::new(
                331,
                "Anonymous login okay, send your complete email address as password.",
            )
        } else {
            info!("Username accepted: {}", username);
            Reply::new(331, "User name okay, need password.")
        };
        Ok(Some(reply))
    }
}
