use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::EndpointConfig;
use crate::monitoring::{Latency, TraceData};

/// Runtime state of an endpoint.
///
/// Only the endpoint's own monitoring loop writes it. Everybody else sees
/// copies taken through [`Endpoint::snapshot`](super::Endpoint::snapshot).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointState {
    pub online: bool,

    /// Time spent resolving the host on the last check
    pub dns_resolve: Latency,

    pub network_latency: Latency,

    pub request_latency: Latency,

    pub last_response: String,

    /// Issue reported by the last failure; cleared on success
    pub down_text: String,

    #[serde(rename = "statusCode")]
    pub last_status_code: Option<u16>,

    #[serde(rename = "lastSuccess")]
    pub last_online: Option<DateTime<Utc>>,

    /// Consecutive failures while retries are enabled
    pub retry_attempts: u32,

    #[serde(with = "crate::duration")]
    pub sleep_duration: Duration,

    /// Anchor of the drift free schedule
    #[serde(skip)]
    pub checkpoint: Option<Instant>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace_data: Vec<TraceData>,
}

/// Point in time copy of an endpoint, safe to hold across awaits
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSnapshot {
    #[serde(flatten)]
    pub config: EndpointConfig,

    #[serde(flatten)]
    pub state: EndpointState,

    pub running: bool,
}
