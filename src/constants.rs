// src/constants.rs

pub const USERNAME_REGEX: &str = r"^[a-zA-Z0-9._-]{1,32}$";
pub const IP_HOSTNAME_MAX_LENGTH: usize = 128;

/// Read size for the socket-facing pump loops.
pub const RECEIVE_BUFFER_SIZE: usize = 8192;

/// Segment capacity of every in-process byte pipe.
pub const PIPE_SEGMENTS: usize = 16;

pub const DEFAULT_GREETING: &str = "ferroftpd FTP server ready.";
pub const DEFAULT_DATA_TIMEOUT_SECS: u64 = 30;
