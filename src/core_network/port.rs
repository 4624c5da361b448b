//! Active-mode data connections: PORT and EPRT.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::constants::IP_HOSTNAME_MAX_LENGTH;
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_network::channel::DataChannel;
use crate::core_parser::Command;

/// Parses the PORT argument: four IP octets and two port octets, all
/// comma-separated.
pub fn parse_port_argument(arg: &str) -> Option<SocketAddr> {
    let parts: Vec<&str> = arg.split(',').collect();
    if parts.len() != 6 {
        return None;
    }
    let octets: Vec<u8> = parts
        .iter()
        .map(|p| p.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;
    let ip = IpAddr::from([octets[0], octets[1], octets[2], octets[3]]);
    let port = u16::from(octets[4]) << 8 | u16::from(octets[5]);
    Some(SocketAddr::new(ip, port))
}

/// Parses the EPRT argument, `|proto|addr|port|` with an arbitrary
/// delimiter character.
pub fn parse_eprt_argument(arg: &str) -> Option<SocketAddr> {
    let delimiter = arg.chars().next()?;
    let parts: Vec<&str> = arg.split(delimiter).collect();
    // leading and trailing delimiters produce empty first/last parts
    if parts.len() != 5 || !parts[0].is_empty() || !parts[4].is_empty() {
        return None;
    }
    if parts[2].len() > IP_HOSTNAME_MAX_LENGTH {
        return None;
    }
    let ip: IpAddr = parts[2].parse().ok()?;
    match (parts[1], ip) {
        ("1", IpAddr::V4(_)) | ("2", IpAddr::V6(_)) => {}
        _ => return None,
    }
    let port: u16 = parts[3].parse().ok()?;
    Some(SocketAddr::new(ip, port))
}

/// Handles the PORT (Active Mode) FTP command.
pub struct PortHandler;

#[async_trait]
impl CommandHandler for PortHandler {
    fn names(&self) -> &'static [&'static str] {
        &["PORT"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let addr = parse_port_argument(&command.argument).ok_or(CommandError::BadArguments)?;
        info!("Received PORT command for {}", addr);
        let mut session = ctx.session.lock().await;
        session.data_channel = Some(DataChannel::Active(addr));
        Ok(Some(Reply::new(200, "PORT command successful.")))
    }
}

/// Handles the EPRT (Extended Active Mode) FTP command.
pub struct EprtHandler;

#[async_trait]
impl CommandHandler for EprtHandler {
    fn names(&self) -> &'static [&'static str] {
        &["EPRT"]
    }

    fn features(&self) -> &'static [&'static str] {
        &["EPRT"]
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        _token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let addr = parse_eprt_argument(&command.argument).ok_or(CommandError::BadArguments)?;
        info!("Received EPRT command for {}", addr);
        let mut session = ctx.session.lock().await;
        session.data_channel = Some(DataChannel::Active(addr));
        Ok(Some(Reply::new(200, "EPRT command successful.")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_port_octets() {
        let addr = parse_port_argument("132,235,1,2,24,131").unwrap();
        assert_eq!(addr, "132.235.1.2:6275".parse().unwrap());
        assert!(parse_port_argument("1,2,3,4,5").is_none());
        assert!(parse_port_argument("300,2,3,4,5,6").is_none());
    }

    #[test]
    fn parses_eprt_forms() {
        let v4 = parse_eprt_argument("|1|132.235.1.2|6275|").unwrap();
        assert_eq!(v4, "132.235.1.2:6275".parse().unwrap());
        let v6 = parse_eprt_argument("|2|::1|7000|").unwrap();
        assert_eq!(v6.port(), 7000);
        // protocol/address family mismatch
        assert!(parse_eprt_argument("|2|132.235.1.2|6275|").is_none());
        assert!(parse_eprt_argument("garbage").is_none());
    }
}
