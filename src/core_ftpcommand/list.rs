use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::utils::open_data_connection;
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;
use crate::core_storage::{EntryInfo, ResolvedPath};

/// Formats one entry in the classic `ls -l` shape clients expect.
pub fn format_list_line(entry: &EntryInfo) -> String {
    let kind = if entry.is_dir { 'd' } else { '-' };
    let perms = if entry.is_dir { "rwxr-xr-x" } else { "rw-r--r--" };
    let date = entry
        .modified
        .map(|m| DateTime::<Utc>::from(m).format("%b %e %H:%M").to_string())
        .unwrap_or_else(|| String::from("Jan  1 00:00"));
    format!(
        "{}{} 1 ftp ftp {:>12} {} {}",
        kind, perms, entry.size, date, entry.name
    )
}

/// Handles the LIST and NLST FTP commands.
///
/// Both stream a directory listing over the data connection; NLST sends
/// bare names. Abortable: a client may cancel a long listing with ABOR.
pub struct ListHandler;

#[async_trait]
impl CommandHandler for ListHandler {
    fn names(&self) -> &'static [&'static str] {
        &["LIST", "NLST"]
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
        // options like -l / -a are accepted and ignored
        let arg = command
            .argument
            .split_whitespace()
            .find(|part| !part.starts_with('-'))
            .unwrap_or("");
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

        let names_only = command.name.eq_ignore_ascii_case("NLST");
        let mut listing = String::new();
        for entry in &entries {
            if names_only {
                listing.push_str(&entry.name);
            } else {
                listing.push_str(&format_list_line(entry));
            }
            listing.push_str("\r\n");
        }

        let mut data = open_data_connection(&ctx).await?;
        tokio::select! {
            _ = token.cancelled() => return Err(CommandError::Aborted),
            written = data.write_all(listing.as_bytes()) => written?,
        }
        data.shutdown().await?;
        info!("Listed {} entries of {}", entries.len(), path);
        Ok(Some(Reply::new(226, "Directory send OK.")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn list_line_shape() {
        let entry = EntryInfo {
            name: "file1.txt".into(),
            is_dir: false,
            size: 2134,
            modified: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(86_400)),
        };
        let line = format_list_line(&entry);
        assert!(line.starts_with("-rw-r--r-- 1 ftp ftp"));
        assert!(line.ends_with("file1.txt"));
        assert!(line.contains("2134"));
    }

    #[test]
    fn directories_are_marked() {
        let entry = EntryInfo {
            name: "sub".into(),
            is_dir: true,
            size: 0,
            modified: None,
        };
        assert!(format_list_line(&entry).starts_with("drwxr-xr-x"));
    }
}
