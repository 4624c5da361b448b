use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::utils::{format_mdtm, open_data_connection};
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;
use crate::core_session::MlstFact;
use crate::core_storage::{EntryInfo, ResolvedPath};

/// One machine-parseable fact line, restricted to the facts the session has
/// selected via OPTS MLST.
pub fn format_facts(entry: &EntryInfo, facts: &[MlstFact], path: &str) -> String {
    let mut line = String::new();
    for fact in facts {
        match fact {
            MlstFact::Type => {
                line.push_str(if entry.is_dir { "type=dir;" } else { "type=file;" })
            }
            MlstFact::Size => {
                if !entry.is_dir {
                    line.push_str(&format!("size={};", entry.size));
                }
            }
            MlstFact::Modify => {
                if let Some(modified) = entry.modified {
                    line.push_str(&format!("modify={};", format_mdtm(modified)));
                }
            }
            MlstFact::Perm => {
                line.push_str(if entry.is_dir { "perm=flcdmpe;" } else { "perm=adfrw;" })
            }
        }
    }
    format!("{} {}", line, path)
}

/// Handles the MLST FTP command: facts for a single path, inline on the
/// control channel.
pub struct MlstHandler;

#[async_trait]
impl CommandHandler for MlstHandler {
    fn names(&self) -> &'static [&'static str] {
        &["MLST"]
    }

    fn features(&self) -> &'static [&'static str] {
        &["MLST type*;size*;modify*;perm*;"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let (path, storage, facts) = {
            let session = ctx.session.lock().await;
            let storage = session.storage().ok_or(CommandError::NotLoggedIn)?;
            (
                session.resolve_virtual(command.argument.trim()),
                storage,
                session.mlst_facts.clone(),
            )
        };
        let entry = match storage.resolve(&path).await? {
            ResolvedPath::File(info) | ResolvedPath::Directory(info) => info,
            ResolvedPath::Missing => return Err(CommandError::NotFound(path)),
        };
        Ok(Some(Reply::with_lines(
            250,
            vec![
                String::from("Listing follows:"),
                format!(" {}", format_facts(&entry, &facts, &path)),
                String::from("End"),
            ],
        )))
    }
}

/// Handles the MLSD FTP command: facts for every entry of a directory, over
/// the data connection. Abortable like the other listing transfers.
pub struct MlsdHandler;

#[async_trait]
impl CommandHandler for MlsdHandler {
    fn names(&self) -> &'static [&'static str] {
        &["MLSD"]
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
        let (path, storage, facts) = {
            let session = ctx.session.lock().await;
            let storage = session.storage().ok_or(CommandError::NotLoggedIn)?;
            (
                session.resolve_virtual(command.argument.trim()),
                storage,
                session.mlst_facts.clone(),
            )
        };
        match storage.resolve(&path).await? {
            ResolvedPath::Directory(_) => {}
            _ => return Err(CommandError::NotFound(path)),
        }
        let entries = storage.list(&path).await?;

        let mut listing = String::new();
        for entry in &entries {
            listing.push_str(&format_facts(entry, &facts, &entry.name));
            listing.push_str("\r\n");
        }

        let mut data = open_data_connection(&ctx).await?;
        tokio::select! {
            _ = token.cancelled() => return Err(CommandError::Aborted),
            written = data.write_all(listing.as_bytes()) => written?,
        }
        data.shutdown().await?;
        Ok(Some(Reply::new(226, "Directory send OK.")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facts_respect_selection() {
        let entry = EntryInfo {
            name: "f".into(),
            is_dir: false,
            size: 9,
            modified: None,
        };
        let line = format_facts(&entry, &[MlstFact::Size], "/f");
        assert_eq!(line, "size=9; /f");
        let line = format_facts(&entry, &[MlstFact::Type, MlstFact::Size], "/f");
        assert_eq!(line, "type=file;size=9; /f");
    }

    #[test]
    fn directories_omit_size() {
        let entry = EntryInfo {
            name: "d".into(),
            is_dir: true,
            size: 0,
            modified: None,
        };
        let line = format_facts(&entry, &[MlstFact::Type, MlstFact::Size], "/d");
        assert_eq!(line, "type=dir; /d");
    }
}
