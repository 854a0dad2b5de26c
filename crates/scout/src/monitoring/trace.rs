//! Best effort route tracing, run when a check fails on an endpoint that
//! asks for diagnostics.
//!
//! UDP probes are sent with an increasing TTL (hop limit for IPv6) and the
//! ICMP "time exceeded" / "port unreachable" answers are read from a raw
//! socket, which needs `CAP_NET_RAW` or root. Without it the trace is
//! skipped and the failure is published without trace data.

use std::io::{self, Read};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::{debug, warn};

use super::dns;
use super::types::Latency;

pub const DEFAULT_MAX_TTL: u8 = 64;
pub const DEFAULT_TRIES: u8 = 3;
pub const DEFAULT_PORT: u16 = 33434;

const PROBE_PAYLOAD: &[u8] = b"scout-trace";
const UDP: u8 = 17;

/// Answer to one probe at a given TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceHop {
    pub ttl: u8,

    /// Router (or destination) that answered; `None` when nothing did
    pub address: Option<IpAddr>,

    pub rtt: Latency,

    /// The destination itself answered
    pub reached: bool,
}

impl TraceHop {
    fn silent(ttl: u8) -> Self {
        Self { ttl, address: None, rtt: Latency::UNMEASURED, reached: false }
    }
}

/// Route towards one destination address; `hops[n]` holds every try at TTL `n + 1`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceData {
    pub dest: IpAddr,
    pub max_ttl: u8,
    pub tries: u8,
    pub port: u16,
    pub hops: Vec<Vec<TraceHop>>,
}

impl TraceData {
    pub fn reached(&self) -> bool {
        self.hops.last().is_some_and(|tries| tries.iter().any(|hop| hop.reached))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceOptions {
    pub max_ttl: u8,
    pub tries: u8,
    /// Base destination port, incremented by the TTL of each probe
    pub port: u16,
    pub probe_timeout: Duration,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            max_ttl: DEFAULT_MAX_TTL,
            tries: DEFAULT_TRIES,
            port: DEFAULT_PORT,
            probe_timeout: Duration::from_secs(1),
        }
    }
}

/// Trace every address `host` resolves to.
///
/// Runs on the blocking pool. Once `budget` is spent the running trace is
/// told to stop at its next probe and whatever is still pending is dropped.
pub(crate) async fn trace_host(host: &str, options: TraceOptions, budget: Duration) -> Vec<TraceData> {
    let ips = match dns::lookup(host).await {
        Ok(ips) => ips,
        Err(e) => {
            debug!(host, "Skipping route trace, lookup failed: {}", e);
            return Vec::new();
        }
    };

    let deadline = Instant::now() + budget;
    let mut traces = Vec::with_capacity(ips.len());

    for ip in ips {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            warn!(host, ?budget, "Route trace budget spent before tracing {}", ip);
            break;
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let task = tokio::task::spawn_blocking({
            let cancel = cancel.clone();
            move || trace(ip, &options, &cancel)
        });

        match tokio::time::timeout(remaining, task).await {
            Ok(Ok(Ok(data))) => traces.push(data),
            Ok(Ok(Err(e))) => debug!(%ip, "Route trace failed: {}", e),
            Ok(Err(e)) => warn!(%ip, "Route trace task failed: {}", e),
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                warn!(%ip, ?budget, "Route trace exceeded its budget");
                break;
            }
        }
    }

    traces
}

/// Blocking traceroute to `dest`, checking `cancel` before every probe
pub fn trace(dest: IpAddr, options: &TraceOptions, cancel: &AtomicBool) -> io::Result<TraceData> {
    let (domain, icmp) = match dest {
        IpAddr::V4(_) => (Domain::IPV4, Protocol::ICMPV4),
        IpAddr::V6(_) => (Domain::IPV6, Protocol::ICMPV6),
    };
    let recv = Socket::new(domain, Type::RAW, Some(icmp))?;
    let send = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    let mut data = TraceData {
        dest,
        max_ttl: options.max_ttl,
        tries: options.tries,
        port: options.port,
        hops: Vec::new(),
    };

    for ttl in 1..=options.max_ttl {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        match dest {
            IpAddr::V4(_) => send.set_ttl(u32::from(ttl))?,
            IpAddr::V6(_) => send.set_unicast_hops_v6(u32::from(ttl))?,
        }

        let port = options.port.wrapping_add(u16::from(ttl));
        let mut tries = Vec::with_capacity(usize::from(options.tries));
        for _ in 0..options.tries {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            tries.push(probe(&send, &recv, dest, port, ttl, options.probe_timeout)?);
        }

        let reached = tries.iter().any(|hop| hop.reached);
        data.hops.push(tries);
        if reached {
            break;
        }
    }

    Ok(data)
}

fn probe(
    send: &Socket,
    recv: &Socket,
    dest: IpAddr,
    port: u16,
    ttl: u8,
    timeout: Duration,
) -> io::Result<TraceHop> {
    let started = Instant::now();
    send.send_to(PROBE_PAYLOAD, &SockAddr::from(SocketAddr::new(dest, port)))?;

    let mut buf = [0u8; 1500];
    loop {
        let remaining = timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Ok(TraceHop::silent(ttl));
        }
        recv.set_read_timeout(Some(remaining))?;

        // sender first, then the datagram itself
        let received = recv.peek_sender().and_then(|from| Ok((from, (&*recv).read(&mut buf)?)));
        let (from, len) = match received {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Ok(TraceHop::silent(ttl));
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let packet = &buf[..len];

        let Some(reply) = parse_reply(packet, dest.is_ipv6()) else { continue };
        if reply.port != port {
            continue;
        }

        let address = from.as_socket().map(|addr| addr.ip());
        return Ok(TraceHop {
            ttl,
            address,
            rtt: Latency::from_duration(started.elapsed()),
            reached: reply.kind == ReplyKind::Unreachable || address == Some(dest),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyKind {
    TimeExceeded,
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Reply {
    kind: ReplyKind,
    /// Destination port of the quoted UDP probe
    port: u16,
}

/// Decode an ICMP error quoting one of our UDP probes.
///
/// IPv4 raw sockets deliver the IP header, IPv6 ones start at the ICMP header.
fn parse_reply(packet: &[u8], ipv6: bool) -> Option<Reply> {
    let icmp = if ipv6 {
        packet
    } else {
        let header_len = usize::from(packet.first()? & 0x0f) * 4;
        packet.get(header_len..)?
    };

    let kind = match (ipv6, *icmp.first()?) {
        (false, 11) | (true, 3) => ReplyKind::TimeExceeded,
        (false, 3) | (true, 1) => ReplyKind::Unreachable,
        _ => return None,
    };

    let quoted = icmp.get(8..)?;
    let (quoted_header_len, next_header) = if ipv6 {
        (40, *quoted.get(6)?)
    } else {
        (usize::from(quoted.first()? & 0x0f) * 4, *quoted.get(9)?)
    };
    if next_header != UDP {
        return None;
    }

    let udp = quoted.get(quoted_header_len..)?;
    let port = u16::from_be_bytes([*udp.get(2)?, *udp.get(3)?]);
    Some(Reply { kind, port })
}
