//! User validation. Consumed by the PASS handler through the
//! [`Authenticator`] trait; the bundled implementation checks bcrypt hashes
//! from a passwd file and optionally admits anonymous users.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{info, warn};

#[derive(Debug, Clone)]
pub struct UserAccount {
    pub username: String,
    pub home: PathBuf,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `None` means the credentials were rejected.
    async fn authenticate(&self, username: &str, password: &str) -> Option<UserAccount>;
}

#[derive(Debug, Clone)]
pub struct PasswdEntry {
    username: String,
    hashed_password: String,
}

impl PasswdEntry {
    /// Parses one `username:bcrypt-hash` line; anything else is skipped.
    pub fn from_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() != 2 {
            return None;
        }
        Some(PasswdEntry {
            username: parts[0].to_string(),
            hashed_password: parts[1].to_string(),
        })
    }

    pub fn get_username(&self) -> &str {
        &self.username
    }

    pub fn get_hashed_password(&self) -> &str {
        &self.hashed_password
    }
}

pub struct PasswdAuthenticator {
    entries: HashMap<String, PasswdEntry>,
    allow_anonymous: bool,
    home_root: PathBuf,
}

impl PasswdAuthenticator {
    pub fn new(allow_anonymous: bool, home_root: PathBuf) -> Self {
        Self {
            entries: HashMap::new(),
            allow_anonymous,
            home_root,
        }
    }

    /// Loads `username:hash` lines from a passwd file.
    pub fn with_passwd_file(mut self, path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read passwd file: {}", path))?;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match PasswdEntry::from_line(line) {
                Some(entry) => {
                    self.entries.insert(entry.get_username().to_string(), entry);
                }
                None => warn!("Skipping malformed passwd line"),
            }
        }
        info!("Loaded {} user entries from {}", self.entries.len(), path);
        Ok(self)
    }
}

#[async_trait]
impl Authenticator for PasswdAuthenticator {
    async fn authenticate(&self, username: &str, password: &str) -> Option<UserAccount> {
        if username.eq_ignore_ascii_case("anonymous") || username.eq_ignore_ascii_case("ftp") {
            if self.allow_anonymous {
                info!("Anonymous login accepted");
                return Some(UserAccount {
                    username: String::from("anonymous"),
                    home: self.home_root.clone(),
                });
            }
            warn!("Anonymous login refused by configuration");
            return None;
        }
        let entry = self.entries.get(username)?;
        match bcrypt::verify(password, entry.get_hashed_password()) {
            Ok(true) => Some(UserAccount {
                username: username.to_string(),
                home: self.home_root.clone(),
            }),
            Ok(false) => {
                warn!("Password mismatch for user {}", username);
                None
            }
            Err(err) => {
                warn!("Unusable password hash for user {}: {}", username, err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_lines_only() {
        let entry = PasswdEntry::from_line("alice:$2b$10$hash").unwrap();
        assert_eq!(entry.get_username(), "alice");
        assert_eq!(entry.get_hashed_password(), "$2b$10$hash");
        assert!(PasswdEntry::from_line("no-colon-here").is_none());
        assert!(PasswdEntry::from_line("too:many:colons").is_none());
    }

    #[tokio::test]
    async fn anonymous_follows_configuration() {
        let open = PasswdAuthenticator::new(true, PathBuf::from("/srv/ftp"));
        assert!(open.authenticate("anonymous", "x@y").await.is_some());
        let closed = PasswdAuthenticator::new(false, PathBuf::from("/srv/ftp"));
        assert!(closed.authenticate("anonymous", "x@y").await.is_none());
    }

    #[tokio::test]
    async fn verifies_bcrypt_hash() {
        let hash = bcrypt::hash("hunter2", 4).unwrap();
        let mut auth = PasswdAuthenticator::new(false, PathBuf::from("/srv/ftp"));
        auth.entries.insert(
            "bob".into(),
            PasswdEntry {
                username: "bob".into(),
                hashed_password: hash,
            },
        );
        assert!(auth.authenticate("bob", "hunter2").await.is_some());
        assert!(auth.authenticate("bob", "wrong").await.is_none());
        assert!(auth.authenticate("carol", "hunter2").await.is_none());
    }
}
