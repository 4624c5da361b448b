//! Transfer type (TYPE), transmission mode (MODE) and structure (STRU)
//! settings tracked per session.

use std::fmt;

/// The RFC 959 representation type. `Local` carries its byte-size
/// parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Ascii,
    Ebcdic,
    Image,
    Local(u8),
}

impl TransferType {
    /// Parses the TYPE argument, e.g. `A`, `I`, `L 8`.
    pub fn parse(arg: &str) -> Option<Self> {
        let mut parts = arg.split_whitespace();
        let primary = parts.next()?.to_ascii_uppercase();
        match primary.as_str() {
            "A" => Some(TransferType::Ascii),
            "E" => Some(TransferType::Ebcdic),
            "I" => Some(TransferType::Image),
            "L" => {
                let size = parts.next()?.parse::<u8>().ok()?;
                Some(TransferType::Local(size))
            }
            _ => None,
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferType::Ascii => write!(f, "A"),
            TransferType::Ebcdic => write!(f, "E"),
            TransferType::Image => write!(f, "I"),
            TransferType::Local(size) => write!(f, "L {}", size),
        }
    }
}

/// The MODE command's parameter. Only `Stream` is usable; the others are
/// kept for a precise 504 reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmissionMode {
    Stream,
    Block,
    Compressed,
}

impl TransmissionMode {
    pub fn parse(arg: &str) -> Option<Self> {
        match arg.trim().to_ascii_uppercase().as_str() {
            "S" => Some(TransmissionMode::Stream),
            "B" => Some(TransmissionMode::Block),
            "C" => Some(TransmissionMode::Compressed),
            _ => None,
        }
    }
}

/// The STRU command's parameter. Only `File` is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStructure {
    File,
    Record,
    Page,
}

impl FileStructure {
    pub fn parse(arg: &str) -> Option<Self> {
        match arg.trim().to_ascii_uppercase().as_str() {
            "F" => Some(FileStructure::File),
            "R" => Some(FileStructure::Record),
            "P" => Some(FileStructure::Page),
            _ => None,
        }
    }
}
