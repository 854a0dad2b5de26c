use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tracing::debug;

use super::icmp::ping_latency;
use super::{Checker, Verdict};
use crate::endpoint::{EndpointState, Protocol, Target};
use crate::monitoring::dns;
use crate::monitoring::types::Latency;

#[derive(Debug, Error)]
enum DialError {
    #[error("{0}")]
    Dial(#[source] io::Error),

    #[error("i/o timeout after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Close(#[source] io::Error),
}

/// Open and close a TCP connection
async fn dial_tcp(address: &str, timeout: Duration) -> Result<(), DialError> {
    let mut stream = tokio::time::timeout(timeout, TcpStream::connect(address))
        .await
        .map_err(|_| DialError::Timeout(timeout))?
        .map_err(DialError::Dial)?;

    match stream.shutdown().await {
        // peer hung up first
        Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
        result => result.map_err(DialError::Close),
    }
}

/// Bind a local socket and connect it to the first address of `address`.
///
/// UDP is connectionless: this only proves the name resolves and a route
/// exists, the remote side is never contacted.
async fn dial_udp(address: &str, timeout: Duration) -> Result<(), DialError> {
    let connect = async {
        let remote = tokio::net::lookup_host(address).await?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no addresses for {address}"))
        })?;
        let local = match remote {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(remote).await
    };

    tokio::time::timeout(timeout, connect)
        .await
        .map_err(|_| DialError::Timeout(timeout))?
        .map_err(DialError::Dial)
}

/// TCP and UDP reachability checker
pub(crate) struct NetChecker;

#[async_trait::async_trait]
impl Checker for NetChecker {
    async fn check(&self, target: &Target, state: &mut EndpointState) -> Verdict {
        let config = &target.config;
        let kind = config.protocol.as_str().to_ascii_uppercase();
        state.last_response.clear();
        state.last_status_code = None;

        match dns::timed_lookup(&target.host).await {
            Ok((_ips, elapsed)) => state.dns_resolve = Latency::from_duration(elapsed),
            Err(e) => {
                state.dns_resolve = Latency::UNMEASURED;
                state.network_latency = Latency::UNMEASURED;
                return Verdict::failure(format!(
                    "Could not get IP address for {kind} service {}, {e}",
                    target.host
                ));
            }
        }

        let ping = ping_latency(&target.host, config.timeout).await;

        let address = dns::dial_address(&target.host, config.port);
        let started = Instant::now();
        let dialed = match config.protocol {
            Protocol::Udp => dial_udp(&address, config.timeout).await,
            _ => dial_tcp(&address, config.timeout).await,
        };
        let elapsed = Latency::from_duration(started.elapsed());

        match dialed {
            Ok(()) => {
                debug!(%address, %elapsed, %ping, "{} dial completed", kind);
                state.request_latency = elapsed;
                state.network_latency = if ping.is_measured() { ping } else { elapsed };
                Verdict::Success
            }
            Err(e @ DialError::Close(_)) => {
                state.network_latency = ping;
                Verdict::failure(format!("{kind} Socket Close Error: {e}"))
            }
            Err(e) => {
                state.network_latency = ping;
                Verdict::failure(format!("Dial Error: {e}"))
            }
        }
    }
}
