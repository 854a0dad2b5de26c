//! Host extraction and timed name resolution.

use std::io;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use url::{Host, Url};

use crate::endpoint::{EndpointConfig, Protocol};

/// Host name of the endpoint: the URL host for HTTP, the address otherwise
pub(crate) fn host_of(config: &EndpointConfig) -> String {
    match config.protocol {
        Protocol::Tcp | Protocol::Udp | Protocol::Icmp => config.address.clone(),
        Protocol::Http => Url::parse(&config.address)
            .ok()
            .and_then(|url| url_host(&url))
            .unwrap_or_else(|| config.address.clone()),
    }
}

/// URL host without the brackets around IPv6 literals
pub(crate) fn url_host(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) => Some(domain.to_string()),
        Host::Ipv4(ip) => Some(ip.to_string()),
        Host::Ipv6(ip) => Some(ip.to_string()),
    }
}

/// Resolve a host to its addresses; IP literals resolve to themselves
pub(crate) async fn lookup(host: &str) -> io::Result<Vec<IpAddr>> {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    let mut ips: Vec<IpAddr> = Vec::new();
    for addr in tokio::net::lookup_host((host, 0)).await? {
        if !ips.contains(&addr.ip()) {
            ips.push(addr.ip());
        }
    }

    if ips.is_empty() {
        return Err(io::Error::new(io::ErrorKind::NotFound, format!("no such host {host}")));
    }
    Ok(ips)
}

/// Resolve a host and report how long the lookup took
pub(crate) async fn timed_lookup(host: &str) -> io::Result<(Vec<IpAddr>, Duration)> {
    let started = Instant::now();
    let ips = lookup(host).await?;
    Ok((ips, started.elapsed()))
}

/// Two or more colons means an IPv6 literal
pub(crate) fn is_ipv6(address: &str) -> bool {
    address.matches(':').count() >= 2
}

/// `host:port` dial string, bracketing IPv6 literals; bare host without port
pub(crate) fn dial_address(host: &str, port: Option<u16>) -> String {
    match port {
        Some(port) if is_ipv6(host) => format!("[{host}]:{port}"),
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}
