//! Common functions shared by the command handlers.

use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::warn;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::{CommandContext, CommandError, Reply};
use crate::core_parser::Command;
use crate::core_storage::StorageBackend;

pub(crate) fn require_argument(command: &Command) -> Result<&str, CommandError> {
    let arg = command.argument.trim();
    if arg.is_empty() {
        return Err(CommandError::BadArguments);
    }
    Ok(arg)
}

/// Resolves the argument against the session's directory stack and hands
/// back the storage it belongs to.
pub(crate) async fn resolve_path(
    ctx: &CommandContext,
    arg: &str,
) -> Result<(String, Arc<dyn StorageBackend>), CommandError> {
    let session = ctx.session.lock().await;
    let storage = session.storage().ok_or(CommandError::NotLoggedIn)?;
    Ok((session.resolve_virtual(arg), storage))
}

/// Takes the session's pending data-connection endpoint, announces the
/// transfer on the control channel, and opens the connection.
pub(crate) async fn open_data_connection(
    ctx: &CommandContext,
) -> Result<TcpStream, CommandError> {
    let channel = ctx
        .session
        .lock()
        .await
        .data_channel
        .take()
        .ok_or(CommandError::NoDataConnection)?;
    let mut control = ctx.control.clone();
    control
        .send(&Reply::new(
            150,
            "File status okay; about to open data connection.",
        ))
        .await?;
    channel
        .open(ctx.config.server.data_timeout_secs)
        .await
        .map_err(|err| {
            warn!("failed to open data connection: {}", err);
            CommandError::DataConnectionFailed
        })
}

/// Pump loop for data transfers. Checks the abort token around every I/O
/// call so an ABOR lands between two buffer moves at the latest.
pub(crate) async fn copy_with_abort<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
    token: &CancellationToken,
) -> Result<u64, CommandError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buffer = vec![0u8; buffer_size];
    let mut total = 0u64;
    loop {
        let read = tokio::select! {
            _ = token.cancelled() => return Err(CommandError::Aborted),
            read = reader.read(&mut buffer) => read?,
        };
        if read == 0 {
            break;
        }
        tokio::select! {
            _ = token.cancelled() => return Err(CommandError::Aborted),
            written = writer.write_all(&buffer[..read]) => written?,
        }
        total += read as u64;
    }
    writer.flush().await?;
    Ok(total)
}

pub(crate) fn format_mdtm(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format("%Y%m%d%H%M%S").to_string()
}

pub(crate) fn parse_mdtm(value: &str) -> Option<SystemTime> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M%S").ok()?;
    Some(SystemTime::from(Utc.from_utc_datetime(&naive)))
}
