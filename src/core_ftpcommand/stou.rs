use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::stor::receive_into_target;
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the STOU (Store Unique) FTP command.
///
/// Picks a name that does not exist yet, derived from the optional argument
/// plus a random suffix, and reports it in the 226 reply.
pub struct StouHandler;

#[async_trait]
impl CommandHandler for StouHandler {
    fn names(&self) -> &'static [&'static str] {
        &["STOU"]
    }

    fn is_abortable(&self) -> bool {
        true
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let base = {
            let trimmed = command.argument.trim();
            if trimmed.is_empty() {
                String::from("unique")
            } else {
                trimmed.to_string()
            }
        };
        let storage = {
            let session = ctx.session.lock().await;
            session.storage().ok_or(CommandError::NotLoggedIn)?
        };

        let mut path = String::new();
        for _ in 0..16 {
            let suffix: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(6)
                .map(char::from)
                .collect();
            let candidate = {
                let session = ctx.session.lock().await;
                session.resolve_virtual(&format!("{}.{}", base, suffix))
            };
            if !storage.resolve(&candidate).await?.exists() {
                path = candidate;
                break;
            }
        }
        if path.is_empty() {
            return Err(CommandError::FileUnavailable(
                "Could not derive a unique name.".into(),
            ));
        }

        let target = storage.create(&path, 0).await?;
        let written = receive_into_target(&ctx, target, &token).await?;

        info!("Stored {} bytes to unique file {}", written, path);
        Ok(Some(Reply::new(226, format!("Transfer complete ({}).", path))))
    }
}
