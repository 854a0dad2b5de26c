//! Timing checkpoints captured while a request is in flight.

use std::time::{Duration, Instant};

use crate::monitoring::Latency;

/// Checkpoints of a single HTTP exchange.
///
/// `get_conn` is taken when the client starts acquiring a connection; every
/// other checkpoint is `None` when the exchange never reached that stage
/// (no DNS step with a resolve override, no TLS for plain HTTP, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestMetrics {
    pub get_conn: Instant,
    pub dns_start: Option<Instant>,
    pub dns_done: Option<Instant>,
    pub connect_start: Option<Instant>,
    pub connect_done: Option<Instant>,
    pub tls_handshake_start: Option<Instant>,
    pub tls_handshake_done: Option<Instant>,
    pub got_conn: Option<Instant>,
    pub wrote_request: Option<Instant>,
    pub got_first_response_byte: Option<Instant>,
    pub got_response: Option<Instant>,
}

impl RequestMetrics {
    pub fn start() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(get_conn: Instant) -> Self {
        Self {
            get_conn,
            dns_start: None,
            dns_done: None,
            connect_start: None,
            connect_done: None,
            tls_handshake_start: None,
            tls_handshake_done: None,
            got_conn: None,
            wrote_request: None,
            got_first_response_byte: None,
            got_response: None,
        }
    }

    /// Connection acquisition up to TCP connect completion
    pub fn network_latency_duration(&self) -> Option<Duration> {
        since(self.get_conn, self.connect_done)
    }

    /// Connection acquisition up to the last body byte
    pub fn request_latency_duration(&self) -> Option<Duration> {
        since(self.get_conn, self.got_response)
    }

    pub fn network_latency(&self) -> Latency {
        self.network_latency_duration().map_or(Latency::UNMEASURED, Latency::from_duration)
    }

    pub fn request_latency(&self) -> Latency {
        self.request_latency_duration().map_or(Latency::UNMEASURED, Latency::from_duration)
    }

    pub fn dns_duration(&self) -> Option<Duration> {
        between(self.dns_start, self.dns_done)
    }

    pub fn connect_duration(&self) -> Option<Duration> {
        between(self.connect_start, self.connect_done)
    }

    pub fn tls_handshake_duration(&self) -> Option<Duration> {
        between(self.tls_handshake_start, self.tls_handshake_done)
    }

    /// Request written up to the response head
    pub fn time_to_first_byte(&self) -> Option<Duration> {
        between(self.wrote_request, self.got_first_response_byte)
    }
}

fn since(start: Instant, end: Option<Instant>) -> Option<Duration> {
    end.map(|end| end.saturating_duration_since(start))
}

fn between(start: Option<Instant>, end: Option<Instant>) -> Option<Duration> {
    since(start?, end)
}
