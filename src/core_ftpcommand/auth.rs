use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;

/// Handles the AUTH FTP command.
///
/// `AUTH TLS` acknowledges with 234 first — the client starts its handshake
/// only after reading the reply — and then swaps the connection adapter to
/// the TLS pair. The swap drains the 234 through the old plain pair before
/// the handshake bytes are consumed. A failed handshake leaves the
/// connection in cleartext; the client sees the failure at the TLS layer.
pub struct AuthHandler;

#[async_trait]
impl CommandHandler for AuthHandler {
    fn names(&self) -> &'static [&'static str] {
        &["AUTH"]
    }

    fn requires_login(&self) -> bool {
        false
    }

    fn features(&self) -> &'static [&'static str] {
        &["AUTH TLS"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let mechanism = command.argument.trim().to_ascii_uppercase();
        if mechanism != "TLS" && mechanism != "SSL" {
            return Ok(Some(Reply::new(
                504,
                "Only AUTH TLS is supported.",
            )));
        }

        let mut adapter = ctx.adapter.lock().await;
        if !adapter.tls_available() {
            return Ok(Some(Reply::new(
                534,
                "TLS not available. Please configure SSL/TLS in the server.",
            )));
        }
        if adapter.is_secured() {
            return Ok(Some(Reply::new(234, "TLS already enabled.")));
        }

        let mut control = ctx.control.clone();
        control
            .send(&Reply::new(234, "Enabling TLS Connection."))
            .await?;
        match adapter.enable_tls().await {
            Ok(()) => {
                info!("Control channel TLS enabled");
                Ok(None)
            }
            Err(err) => {
                warn!("AUTH TLS handshake failed: {}", err);
                // 234 already went out; the client's TLS layer reports the
                // failure, and the control channel stays usable in cleartext
                Ok(None)
            }
        }
    }
}

/// Handles the PBSZ FTP command. Only `PBSZ 0` is meaningful for TLS.
pub struct PbszHandler;

#[async_trait]
impl CommandHandler for PbszHandler {
    fn names(&self) -> &'static [&'static str] {
        &["PBSZ"]
    }

    fn requires_login(&self) -> bool {
        false
    }

    fn features(&self) -> &'static [&'static str] {
        &["PBSZ"]
    }

    async fn process(
        &self,
        _ctx: Arc<CommandContext>,
        _command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        Ok(Some(Reply::new(200, "PBSZ=0")))
    }
}

/// Handles the PROT FTP command. Data-channel protection is not
/// implemented, so only `PROT C` is accepted.
pub struct ProtHandler;

#[async_trait]
impl CommandHandler for ProtHandler {
    fn names(&self) -> &'static [&'static str] {
        &["PROT"]
    }

    fn requires_login(&self) -> bool {
        false
    }

    fn features(&self) -> &'static [&'static str] {
        &["PROT"]
    }

    async fn process(
        &self,
        _ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        match command.argument.trim().to_ascii_uppercase().as_str() {
            "C" => Ok(Some(Reply::new(200, "Protection level set to C."))),
            "P" | "S" | "E" => Ok(Some(Reply::new(
                536,
                "Requested protection level not supported.",
            ))),
            _ => Err(CommandError::BadArguments),
        }
    }
}
