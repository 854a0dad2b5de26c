use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::trace::TraceData;

/// Latency in milliseconds, with `-1` meaning "could not be measured"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Latency(i64);

impl Latency {
    /// Sentinel for unreachable or unmeasured targets
    pub const UNMEASURED: Latency = Latency(-1);

    pub const ZERO: Latency = Latency(0);

    pub fn from_millis(millis: i64) -> Self {
        Self(millis.max(-1))
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self(i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
    }

    pub fn millis(self) -> i64 {
        self.0
    }

    pub fn is_measured(self) -> bool {
        self.0 >= 0
    }

    pub fn as_duration(self) -> Option<Duration> {
        u64::try_from(self.0).ok().map(Duration::from_millis)
    }
}

impl Default for Latency {
    fn default() -> Self {
        Self::UNMEASURED
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_measured() { write!(f, "{}ms", self.0) } else { f.write_str("unmeasured") }
    }
}

/// A check cycle that passed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Success {
    /// Endpoint that was checked
    pub endpoint: Uuid,

    /// Connection (HTTP) or ICMP round trip latency
    pub network_latency: Latency,

    /// Full request or dial latency
    pub request_latency: Latency,

    pub created_at: DateTime<Utc>,
}

/// A check cycle that failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    /// Endpoint that was checked
    pub endpoint: Uuid,

    /// Human readable description of what went wrong
    pub issue: String,

    pub network_latency: Latency,

    /// Set on the last failure before the endpoint stops for good
    #[serde(default)]
    pub retries_exhausted: bool,

    /// Route traces collected on failure, when enabled for the endpoint
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace_data: Vec<TraceData>,

    pub created_at: DateTime<Utc>,

    /// Last HTTP status code seen for the endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,
}

/// Result of one completed check cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Outcome {
    Success(Success),
    Failure(Failure),
}

impl Outcome {
    pub fn endpoint(&self) -> Uuid {
        match self {
            Outcome::Success(success) => success.endpoint,
            Outcome::Failure(failure) => failure.endpoint,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Outcome::Success(success) => success.created_at,
            Outcome::Failure(failure) => failure.created_at,
        }
    }

    pub fn network_latency(&self) -> Latency {
        match self {
            Outcome::Success(success) => success.network_latency,
            Outcome::Failure(failure) => failure.network_latency,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success(s) => write!(
                f,
                "SUCCESS {} network={} request={}",
                s.endpoint, s.network_latency, s.request_latency
            ),
            Outcome::Failure(e) => {
                write!(f, "FAILURE {} {} network={}", e.endpoint, e.issue, e.network_latency)?;
                if e.retries_exhausted {
                    f.write_str(" (retries exhausted)")?;
                }
                Ok(())
            }
        }
    }
}
