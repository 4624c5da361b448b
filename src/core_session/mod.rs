//! Per-connection mutable state. Owned exclusively by one connection's
//! dispatch loop; never shared across connections.

pub mod mode;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core_network::channel::DataChannel;
use crate::core_parser::SharedEncoding;
use crate::core_storage::StorageBackend;
use crate::core_transfer::TransferStatus;

pub use mode::{FileStructure, TransferType, TransmissionMode};

/// Structured listing facts a client may request via OPTS MLST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MlstFact {
    Type,
    Size,
    Modify,
    Perm,
}

impl MlstFact {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "type" => Some(MlstFact::Type),
            "size" => Some(MlstFact::Size),
            "modify" => Some(MlstFact::Modify),
            "perm" => Some(MlstFact::Perm),
            _ => None,
        }
    }

    pub const ALL: [MlstFact; 4] = [MlstFact::Type, MlstFact::Size, MlstFact::Modify, MlstFact::Perm];
}

impl fmt::Display for MlstFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MlstFact::Type => "type",
            MlstFact::Size => "size",
            MlstFact::Modify => "modify",
            MlstFact::Perm => "perm",
        };
        write!(f, "{}", name)
    }
}

pub struct FtpSession {
    /// Current directory as a stack of names; root is the empty stack.
    pub dir_stack: Vec<String>,
    /// Swapped atomically on login; absent before.
    pub storage: Option<Arc<dyn StorageBackend>>,
    pub username: Option<String>,
    pub pending_user: Option<String>,
    pub is_authenticated: bool,
    pub transfer_type: TransferType,
    pub transmission_mode: TransmissionMode,
    pub structure: FileStructure,
    pub encoding: SharedEncoding,
    pub restart_offset: Option<u64>,
    pub rename_source: Option<String>,
    pub data_channel: Option<DataChannel>,
    /// Transfer IDs of background uploads started by this session, with the
    /// last status observed at enqueue time.
    pub background_uploads: HashMap<String, TransferStatus>,
    pub mlst_facts: Vec<MlstFact>,
}

impl FtpSession {
    pub fn new(encoding: SharedEncoding) -> Self {
        Self {
            dir_stack: Vec::new(),
            storage: None,
            username: None,
            pending_user: None,
            is_authenticated: false,
            transfer_type: TransferType::Ascii,
            transmission_mode: TransmissionMode::Stream,
            structure: FileStructure::File,
            encoding,
            restart_offset: None,
            rename_source: None,
            data_channel: None,
            background_uploads: HashMap::new(),
            mlst_facts: MlstFact::ALL.to_vec(),
        }
    }

    pub fn current_dir(&self) -> String {
        format!("/{}", self.dir_stack.join("/"))
    }

    /// Resolves `arg` against the directory stack into a normalized virtual
    /// path. `..` pops, `.` and empty components vanish; the result never
    /// escapes the root.
    pub fn resolve_stack(&self, arg: &str) -> Vec<String> {
        let mut parts = if arg.starts_with('/') {
            Vec::new()
        } else {
            self.dir_stack.clone()
        };
        for component in arg.split('/') {
            match component {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                name => parts.push(name.to_string()),
            }
        }
        parts
    }

    pub fn resolve_virtual(&self, arg: &str) -> String {
        format!("/{}", self.resolve_stack(arg).join("/"))
    }

    /// The only path that assigns the storage backend; also resets the
    /// directory stack to root.
    pub fn login(&mut self, username: String, storage: Arc<dyn StorageBackend>) {
        self.storage = Some(storage);
        self.dir_stack.clear();
        self.username = Some(username);
        self.pending_user = None;
        self.is_authenticated = true;
    }

    pub fn storage(&self) -> Option<Arc<dyn StorageBackend>> {
        self.storage.clone()
    }

    /// Releases everything the session owns: the storage handle and any
    /// passive listener still waiting for a peer.
    pub fn close(&mut self) {
        self.data_channel = None;
        self.storage = None;
        self.is_authenticated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_parser::{shared_encoding, TextEncoding};

    fn session() -> FtpSession {
        FtpSession::new(shared_encoding(TextEncoding::Utf8))
    }

    #[test]
    fn root_is_empty_stack() {
        let s = session();
        assert_eq!(s.current_dir(), "/");
    }

    #[test]
    fn resolve_relative_and_absolute() {
        let mut s = session();
        s.dir_stack = vec!["pub".into(), "incoming".into()];
        assert_eq!(s.resolve_virtual("file.txt"), "/pub/incoming/file.txt");
        assert_eq!(s.resolve_virtual("/etc/motd"), "/etc/motd");
    }

    #[test]
    fn dot_dot_cannot_escape_root() {
        let mut s = session();
        s.dir_stack = vec!["pub".into()];
        assert_eq!(s.resolve_virtual("../../../x"), "/x");
        assert_eq!(s.resolve_virtual("/.."), "/");
    }

    #[test]
    fn resolve_collapses_dots_and_empty_components() {
        let s = session();
        assert_eq!(s.resolve_virtual("a//b/./c"), "/a/b/c");
    }
}
