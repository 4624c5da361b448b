// SSL/TLS support for ferroftpd. The engine itself never touches record
// framing; it hands a byte-stream view to the acceptor built here.

pub mod error;
pub mod wrapper;

pub use error::TlsError;
pub use wrapper::RustlsWrapper;
