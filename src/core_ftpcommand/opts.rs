use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::utils::require_argument;
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::{Command, TextEncoding};
use crate::core_session::MlstFact;

/// Handles the OPTS FTP command.
///
/// `OPTS UTF8 ON|OFF` switches the command-channel encoding, which the
/// parser picks up from the next line on. `OPTS MLST fact;fact;...`
/// restricts the facts MLST/MLSD emit.
pub struct OptsHandler;

#[async_trait]
impl CommandHandler for OptsHandler {
    fn names(&self) -> &'static [&'static str] {
        &["OPTS"]
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
        let arg = require_argument(&command)?;
        let (option, value) = match arg.split_once(' ') {
            Some((option, value)) => (option, value.trim()),
            None => (arg, ""),
        };

        match option.to_ascii_uppercase().as_str() {
            "UTF8" | "UTF-8" => {
                let encoding = match value.to_ascii_uppercase().as_str() {
                    "ON" | "" => TextEncoding::Utf8,
                    "OFF" => TextEncoding::Latin1,
                    _ => return Err(CommandError::BadArguments),
                };
                let session = ctx.session.lock().await;
                *session.encoding.lock().unwrap() = encoding;
                let state = if encoding == TextEncoding::Utf8 { "on" } else { "off" };
                Ok(Some(Reply::new(200, format!("UTF8 set to {}", state))))
            }
            "MLST" => {
                let mut facts = Vec::new();
                for name in value.split(';').filter(|f| !f.is_empty()) {
                    if let Some(fact) = MlstFact::from_name(name) {
                        if !facts.contains(&fact) {
                            facts.push(fact);
                        }
                    }
                }
                let listed: String = facts
                    .iter()
                    .map(|f| format!("{};", f))
                    .collect();
                ctx.session.lock().await.mlst_facts = facts;
                Ok(Some(Reply::new(200, format!("MLST OPTS {}", listed))))
            }
            _ => Ok(Some(Reply::new(501, "Option not understood."))),
        }
    }
}
