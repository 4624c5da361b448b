use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the PASS FTP command.
///
/// Completes the login started by USER. A successful validation is the only
/// path that assigns the session's storage backend and resets the directory
/// stack to root.
pub struct PassHandler;

#[async_trait]
impl CommandHandler for PassHandler {
    fn names(&self) -> &'static [&'static str] {
        &["PASS"]
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
        let username = {
            let session = ctx.session.lock().await;
            match session.pending_user.clone() {
                Some(username) => username,
                None => return Err(CommandError::BadSequence),
            }
        };

        match ctx
            .authenticator
            .authenticate(&username, &command.argument)
            .await
        {
            Some(account) => {
                let storage = ctx.storage_factory.create(&account);
                let mut session = ctx.session.lock().await;
                session.login(account.username.clone(), storage);
                info!("User {} logged in", account.username);
                Ok(Some(Reply::new(230, "User logged in, proceed.")))
            }
            None => {
                warn!("Login failed for user {}", username);
                let mut session = ctx.session.lock().await;
                session.pending_user = None;
                Ok(Some(Reply::new(530, "Login incorrect.")))
            }
        }
    }
}
