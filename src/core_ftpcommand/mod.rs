//! Command handlers and the seams they are built on: the reply type, the
//! handler trait, the per-connection context, and the error-to-reply
//! mapping.

// Here's the list of the FTP commands implemented
pub mod abor;
pub mod appe;
pub mod auth;
pub mod cdup;
pub mod cwd;
pub mod dele;
pub mod feat;
pub mod list;
pub mod mdtm;
pub mod mff;
pub mod mkd;
pub mod mlst;
pub mod mode;
pub mod noop;
pub mod opts;
pub mod pass;
pub mod pwd;
pub mod quit;
pub mod rest;
pub mod retr;
pub mod rmd;
pub mod rnfr;
pub mod rnto;
pub mod site;
pub mod size;
pub mod stat;
pub mod stor;
pub mod stou;
pub mod stru;
pub mod syst;
pub mod type_;
pub mod user;

// The registry and the common functions are here
pub mod handlers;
pub mod utils;

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core_auth::Authenticator;
use crate::core_network::coordinator::BackgroundCommandCoordinator;
use crate::core_parser::{Command, SharedEncoding};
use crate::core_pipeline::{PipeWriter, SecureConnectionAdapter};
use crate::core_session::FtpSession;
use crate::core_storage::StorageFactory;
use crate::core_transfer::TransferQueue;

/// One control-channel reply: a 3-digit code plus one or more text lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    code: u16,
    lines: Vec<String>,
    closes: bool,
}

impl Reply {
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            lines: vec![text.into()],
            closes: false,
        }
    }

    pub fn with_lines(code: u16, lines: Vec<String>) -> Self {
        Self {
            code,
            lines,
            closes: false,
        }
    }

    /// Marks the reply as the last one on this connection (QUIT).
    pub fn closing(mut self) -> Self {
        self.closes = true;
        self
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn closes_connection(&self) -> bool {
        self.closes
    }

    /// Wire form: `CODE text\r\n`, or `CODE-line...` continuations with a
    /// final `CODE line` for multi-line replies.
    pub fn to_wire(&self) -> String {
        match self.lines.len() {
            0 => format!("{}\r\n", self.code),
            1 => format!("{} {}\r\n", self.code, self.lines[0]),
            n => {
                let mut wire = String::new();
                for line in &self.lines[..n - 1] {
                    wire.push_str(&format!("{}-{}\r\n", self.code, line));
                }
                wire.push_str(&format!("{} {}\r\n", self.code, self.lines[n - 1]));
                wire
            }
        }
    }
}

/// Everything a handler can fail with, each mapped to exactly one reply so
/// the dispatch loop never crashes on a handler error.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("syntax error in arguments")]
    BadArguments,
    #[error("bad sequence of commands")]
    BadSequence,
    #[error("not logged in")]
    NotLoggedIn,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    FileUnavailable(String),
    #[error("no data connection established")]
    NoDataConnection,
    #[error("could not open data connection")]
    DataConnectionFailed,
    #[error("transfer aborted")]
    Aborted,
    #[error("not supported")]
    NotSupported,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CommandError {
    pub fn to_reply(&self) -> Reply {
        match self {
            CommandError::BadArguments => {
                Reply::new(501, "Syntax error in parameters or arguments.")
            }
            CommandError::BadSequence => Reply::new(503, "Bad sequence of commands."),
            CommandError::NotLoggedIn => Reply::new(530, "Not logged in."),
            CommandError::NotFound(path) => {
                Reply::new(550, format!("{}: No such file or directory.", path))
            }
            CommandError::FileUnavailable(message) => Reply::new(550, message.clone()),
            CommandError::NoDataConnection => Reply::new(425, "Use PORT or PASV first."),
            CommandError::DataConnectionFailed => Reply::new(425, "Can't open data connection."),
            CommandError::Aborted => Reply::new(426, "Connection closed; transfer aborted."),
            CommandError::NotSupported => Reply::new(502, "Command not implemented."),
            CommandError::Io(_) => Reply::new(
                451,
                "Requested action aborted. Local error in processing.",
            ),
        }
    }
}

/// Writes replies into the connection's outbound pipe, encoded with the
/// session's current text encoding.
#[derive(Clone)]
pub struct ControlWriter {
    pipe: PipeWriter,
    encoding: SharedEncoding,
}

impl ControlWriter {
    pub fn new(pipe: PipeWriter, encoding: SharedEncoding) -> Self {
        Self { pipe, encoding }
    }

    pub async fn send(&mut self, reply: &Reply) -> io::Result<()> {
        let encoding = *self.encoding.lock().unwrap();
        let bytes = encoding.encode(&reply.to_wire());
        self.pipe.write(Bytes::from(bytes)).await?;
        self.pipe.flush().await
    }
}

/// Convenience struct to group everything a handler may need.
pub struct CommandContext {
    pub config: Arc<Config>,
    pub session: Arc<Mutex<FtpSession>>,
    pub authenticator: Arc<dyn Authenticator>,
    pub storage_factory: Arc<dyn StorageFactory>,
    pub control: ControlWriter,
    pub transfers: TransferQueue,
    pub adapter: Arc<Mutex<SecureConnectionAdapter>>,
    pub coordinator: Arc<BackgroundCommandCoordinator>,
    pub handlers: Arc<HashMap<&'static str, Arc<dyn CommandHandler>>>,
    /// Fires when the connection closes; non-abortable handlers get it as
    /// their cancellation token.
    pub token: CancellationToken,
}

/// One FTP command implementation, registered under one or more names.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn names(&self) -> &'static [&'static str];

    fn requires_login(&self) -> bool {
        true
    }

    /// Abortable handlers run on the background coordinator so ABOR can
    /// cancel them while the dispatch loop stays responsive.
    fn is_abortable(&self) -> bool {
        false
    }

    /// Lines contributed to the FEAT reply.
    fn features(&self) -> &'static [&'static str] {
        &[]
    }

    /// Returning `Ok(None)` means the handler already wrote its reply (or
    /// deliberately stays silent).
    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError>;
}
