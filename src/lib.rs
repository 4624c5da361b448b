pub mod config;
pub mod constants;
pub mod core_auth;
pub mod core_cli;
pub mod core_ftpcommand;
pub mod core_network;
pub mod core_parser;
pub mod core_pipeline;
pub mod core_session;
pub mod core_storage;
pub mod core_tls;
pub mod core_transfer;
pub mod server;

pub use config::Config;
pub use core_session::FtpSession;
