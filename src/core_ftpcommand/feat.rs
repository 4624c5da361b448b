use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the FEAT FTP command.
///
/// The feature list is assembled from the registered handlers, so a handler
/// added to the table advertises itself without touching this file.
pub struct FeatHandler;

#[async_trait]
impl CommandHandler for FeatHandler {
    fn names(&self) -> &'static [&'static str] {
        &["FEAT"]
    }

    fn requires_login(&self) -> bool {
        false
    }

    fn features(&self) -> &'static [&'static str] {
        &["UTF8"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        _command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let mut features = BTreeSet::new();
        for handler in ctx.handlers.values() {
            for feature in handler.features() {
                features.insert(*feature);
            }
        }
        let mut lines = vec![String::from("Features:")];
        for feature in features {
            lines.push(format!(" {}", feature));
        }
        lines.push(String::from("End"));
        Ok(Some(Reply::with_lines(211, lines)))
    }
}
