use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DATA_TIMEOUT_SECS, DEFAULT_GREETING};

#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    pub listen_address: String,
    pub listen_port: u16,
    pub pasv_address: String,
    pub greeting: String,
    pub chroot_dir: String,
    pub data_timeout_secs: u64,
    pub upload_buffer_size: Option<usize>, // Optional to allow default value
    pub download_buffer_size: Option<usize>, // Optional to allow default value
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TlsSettings {
    pub cert_file: String,
    pub key_file: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AuthSettings {
    pub allow_anonymous: bool,
    pub passwd_file: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub tls: Option<TlsSettings>,
    #[serde(default)]
    pub auth: AuthSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: String::from("0.0.0.0"),
            listen_port: 21,
            pasv_address: String::from("127.0.0.1"),
            greeting: String::from(DEFAULT_GREETING),
            chroot_dir: String::from("/var/ftp"),
            data_timeout_secs: DEFAULT_DATA_TIMEOUT_SECS,
            upload_buffer_size: Some(256 * 1024),   // Default 256 KB
            download_buffer_size: Some(128 * 1024), // Default 128 KB
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            allow_anonymous: true,
            passwd_file: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            tls: None,
            auth: AuthSettings::default(),
        }
    }
}

impl Config {
    pub fn upload_buffer_size(&self) -> usize {
        self.server.upload_buffer_size.unwrap_or(256 * 1024)
    }

    pub fn download_buffer_size(&self) -> usize {
        self.server.download_buffer_size.unwrap_or(128 * 1024)
    }
}
