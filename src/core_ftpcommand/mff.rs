use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::utils::{parse_mdtm, require_argument, resolve_path};
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the MFF (Modify Fact) FTP command. Only the `Modify` fact is
/// writable; the argument form is `Modify=YYYYMMDDHHMMSS; path`.
pub struct MffHandler;

#[async_trait]
impl CommandHandler for MffHandler {
    fn names(&self) -> &'static [&'static str] {
        &["MFF"]
    }

    fn features(&self) -> &'static [&'static str] {
        &["MFF Modify;"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let arg = require_argument(&command)?;
        let (facts, path_arg) = arg.split_once(' ').ok_or(CommandError::BadArguments)?;
        let mut modify = None;
        for fact in facts.split(';').filter(|f| !f.is_empty()) {
            let (name, value) = fact.split_once('=').ok_or(CommandError::BadArguments)?;
            if name.eq_ignore_ascii_case("modify") {
                let time = parse_mdtm(value).ok_or(CommandError::BadArguments)?;
                modify = Some((time, value.to_string()));
            } else {
                return Ok(Some(Reply::new(
                    504,
                    format!("Fact {} not modifiable.", name),
                )));
            }
        }
        let (modify, raw_value) = modify.ok_or(CommandError::BadArguments)?;

        let (path, storage) = resolve_path(&ctx, path_arg.trim()).await?;
        if !storage.resolve(&path).await?.exists() {
            return Err(CommandError::NotFound(path));
        }
        storage.set_modified(&path, modify).await?;
        Ok(Some(Reply::new(
            213,
            format!("Modify={}; {}", raw_value, path),
        )))
    }
}
