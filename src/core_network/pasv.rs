//! Passive-mode data connections: PASV and EPSV.

use std::io;
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_network::channel::DataChannel;
use crate::core_parser::Command;

/// Sets up a passive mode listener. Returns the listener and the formatted
/// PASV reply text.
pub async fn setup_pasv_listener(pasv_ip: IpAddr) -> io::Result<(TcpListener, String)> {
    let listener = TcpListener::bind((pasv_ip, 0)).await?;
    let addr = listener.local_addr()?;

    let ip_string = pasv_ip.to_string();
    let ip_parts: Vec<&str> = ip_string.split('.').collect();
    let pasv_response = format!(
        "Entering Passive Mode ({},{},{},{},{},{}).",
        ip_parts[0],
        ip_parts[1],
        ip_parts[2],
        ip_parts[3],
        addr.port() / 256,
        addr.port() % 256
    );
    debug!(
        "PASV listener set up on IP: {}, Port: {}",
        pasv_ip,
        addr.port()
    );
    Ok((listener, pasv_response))
}

fn pasv_ip(ctx: &CommandContext) -> Result<IpAddr, CommandError> {
    ctx.config
        .server
        .pasv_address
        .parse()
        .map_err(|_| CommandError::FileUnavailable("Passive address misconfigured.".into()))
}

/// Handles the PASV (Passive Mode) FTP command.
pub struct PasvHandler;

#[async_trait]
impl CommandHandler for PasvHandler {
    fn names(&self) -> &'static [&'static str] {
        &["PASV"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        _command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let ip = pasv_ip(&ctx)?;
        if !ip.is_ipv4() {
            return Err(CommandError::FileUnavailable(
                "PASV requires an IPv4 passive address; use EPSV.".into(),
            ));
        }
        let (listener, text) = setup_pasv_listener(ip).await?;
        let mut session = ctx.session.lock().await;
        session.data_channel = Some(DataChannel::Passive(listener));
        Ok(Some(Reply::new(227, text)))
    }
}

/// Handles the EPSV (Extended Passive Mode) FTP command.
pub struct EpsvHandler;

#[async_trait]
impl CommandHandler for EpsvHandler {
    fn names(&self) -> &'static [&'static str] {
        &["EPSV"]
    }

    fn features(&self) -> &'static [&'static str] {
        &["EPSV"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        _command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let ip = pasv_ip(&ctx)?;
        let listener = TcpListener::bind((ip, 0)).await?;
        let port = listener.local_addr()?.port();
        let mut session = ctx.session.lock().await;
        session.data_channel = Some(DataChannel::Passive(listener));
        Ok(Some(Reply::new(
            229,
            format!("Entering Extended Passive Mode (|||{}|)", port),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pasv_reply_encodes_port_in_two_octets() {
        let (listener, text) = setup_pasv_listener("127.0.0.1".parse().unwrap())
            .await
            .unwrap();
        let port = listener.local_addr().unwrap().port();
        let expected = format!(
            "Entering Passive Mode (127,0,0,1,{},{}).",
            port / 256,
            port % 256
        );
        assert_eq!(text, expected);
    }
}
