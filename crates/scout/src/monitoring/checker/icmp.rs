use std::io;
use std::net::IpAddr;
use std::time::Duration;

use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence, SurgeError};
use thiserror::Error;
use tracing::debug;

use super::{Checker, Verdict};
use crate::endpoint::{EndpointState, Target};
use crate::monitoring::dns;
use crate::monitoring::types::Latency;

pub(crate) const ICMP_IDLE_TIMEOUT: &str = "reached max ICMP idle timeout";

const PAYLOAD: [u8; 56] = [0; 56];

#[derive(Debug, Error)]
pub(crate) enum EchoError {
    #[error("could not open ICMP socket: {0}")]
    Socket(#[source] io::Error),

    #[error("no echo reply before timeout")]
    Timeout,

    #[error("{0}")]
    Transport(String),
}

/// Send a single echo request and wait at most `timeout` for the reply
pub(crate) async fn echo(ip: IpAddr, timeout: Duration) -> Result<Duration, EchoError> {
    let config = match ip {
        IpAddr::V4(_) => Config::default(),
        IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
    };
    let client = Client::new(&config).map_err(EchoError::Socket)?;

    let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
    pinger.timeout(timeout);

    match pinger.ping(PingSequence(0), &PAYLOAD).await {
        Ok((_packet, rtt)) => Ok(rtt),
        Err(SurgeError::Timeout { .. }) => Err(EchoError::Timeout),
        Err(e) => Err(EchoError::Transport(e.to_string())),
    }
}

/// Round trip to the first address of `host`, or the sentinel when it
/// cannot be measured. Never fails the check it is part of.
pub(crate) async fn ping_latency(host: &str, timeout: Duration) -> Latency {
    let ip = match dns::lookup(host).await {
        Ok(ips) => match ips.first() {
            Some(ip) => *ip,
            None => return Latency::UNMEASURED,
        },
        Err(e) => {
            debug!(host, "Could not resolve host for ping: {}", e);
            return Latency::UNMEASURED;
        }
    };

    match echo(ip, timeout).await {
        Ok(rtt) => Latency::from_duration(rtt),
        Err(e) => {
            debug!(%ip, "Ping for network latency failed: {}", e);
            Latency::UNMEASURED
        }
    }
}

/// Resolve the address to the family its spelling asks for
async fn resolve(address: &str) -> io::Result<IpAddr> {
    let want_v6 = dns::is_ipv6(address);
    dns::lookup(address).await?.into_iter().find(|ip| ip.is_ipv6() == want_v6).ok_or_else(|| {
        let family = if want_v6 { "IPv6" } else { "IPv4" };
        io::Error::new(io::ErrorKind::NotFound, format!("no {family} address for {address}"))
    })
}

fn record_echo(
    state: &mut EndpointState,
    address: &str,
    result: Result<Duration, EchoError>,
) -> Verdict {
    match result {
        Ok(rtt) => {
            state.network_latency = Latency::from_duration(rtt);
            state.request_latency = state.network_latency;
            Verdict::Success
        }
        Err(EchoError::Timeout) => {
            state.network_latency = Latency::UNMEASURED;
            Verdict::failure(ICMP_IDLE_TIMEOUT)
        }
        Err(e) => {
            state.network_latency = Latency::UNMEASURED;
            Verdict::failure(format!("Issue running ICMP to service {address}, {e}"))
        }
    }
}

/// ICMP echo checker
pub(crate) struct IcmpChecker;

#[async_trait::async_trait]
impl Checker for IcmpChecker {
    async fn check(&self, target: &Target, state: &mut EndpointState) -> Verdict {
        let address = target.config.address.as_str();
        state.last_response.clear();

        let ip = match resolve(address).await {
            Ok(ip) => ip,
            Err(e) => {
                debug!("Could not send ICMP to service {}, {}", address, e);
                state.network_latency = Latency::UNMEASURED;
                return Verdict::failure(format!("Could not send ICMP to service {address}, {e}"));
            }
        };

        record_echo(state, address, echo(ip, target.config.timeout).await)
    }
}
