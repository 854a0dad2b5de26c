//! Static endpoint configuration.
//!
//! Field names follow the camelCase config format consumed by loaders
//! (`checkInterval`, `verifySSL`, `retryMax`, ...).

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default check interval when none is configured
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Timeout floor applied when the configured timeout is zero
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Protocol used to check an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Tcp,
    Udp,
    Icmp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP specific settings. Ignored for the other protocols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpOptions {
    /// `GET` unless set; only `POST` carries [`post_data`](Self::post_data)
    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default)]
    pub post_data: String,

    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,

    /// Regex the response body must match; empty matches everything
    #[serde(default)]
    pub expected: String,

    #[serde(default = "default_expected_status")]
    pub expected_status: u16,

    #[serde(rename = "verifySSL", default = "default_verify_ssl")]
    pub verify_ssl: bool,

    /// `ip` or `ip:port` to connect to instead of resolving the URL host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_to: Option<String>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            method: default_method(),
            post_data: String::new(),
            headers: BTreeMap::new(),
            expected: String::new(),
            expected_status: default_expected_status(),
            verify_ssl: default_verify_ssl(),
            resolve_to: None,
        }
    }
}

/// Linear jitter backoff settings applied while an endpoint is offline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(rename = "retry", default)]
    pub enabled: bool,

    #[serde(rename = "retryMinInterval", with = "crate::duration", default)]
    pub min_interval: Duration,

    #[serde(rename = "retryMaxInterval", with = "crate::duration", default)]
    pub max_interval: Duration,

    /// Consecutive failures after which the endpoint stops; 0 never stops
    #[serde(rename = "retryMax", default)]
    pub max_attempts: u32,
}

/// Static configuration of a monitored endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    pub id: Uuid,

    #[serde(default)]
    pub name: String,

    /// URL for HTTP, host name or IP literal otherwise
    pub address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(rename = "type")]
    pub protocol: Protocol,

    #[serde(rename = "checkInterval", with = "crate::duration", default = "default_interval")]
    pub interval: Duration,

    #[serde(with = "crate::duration", default)]
    pub timeout: Duration,

    #[serde(flatten)]
    pub http: HttpOptions,

    #[serde(flatten)]
    pub retry: RetryPolicy,

    /// Run a route trace towards the host whenever a check fails
    #[serde(default)]
    pub trace: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl EndpointConfig {
    /// Create a configuration with a fresh id and default settings
    pub fn new(protocol: Protocol, address: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            address: address.into(),
            port: None,
            protocol,
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            http: HttpOptions::default(),
            retry: RetryPolicy::default(),
            trace: false,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn http(url: impl Into<String>) -> Self {
        Self::new(Protocol::Http, url)
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::new(Protocol::Tcp, host).with_port(port)
    }

    pub fn udp(host: impl Into<String>, port: u16) -> Self {
        Self::new(Protocol::Udp, host).with_port(port)
    }

    pub fn icmp(host: impl Into<String>) -> Self {
        Self::new(Protocol::Icmp, host)
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.http.method = method.into();
        self
    }

    pub fn with_post_data(mut self, body: impl Into<String>) -> Self {
        self.http.post_data = body.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.http.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn with_expected(mut self, pattern: impl Into<String>) -> Self {
        self.http.expected = pattern.into();
        self
    }

    pub fn with_expected_status(mut self, status: u16) -> Self {
        self.http.expected_status = status;
        self
    }

    pub fn with_verify_ssl(mut self, verify: bool) -> Self {
        self.http.verify_ssl = verify;
        self
    }

    pub fn with_resolve_to(mut self, target: impl Into<String>) -> Self {
        self.http.resolve_to = Some(target.into());
        self
    }

    /// Enable retries with the given jitter bounds and attempt budget
    pub fn with_retry(mut self, min: Duration, max: Duration, max_attempts: u32) -> Self {
        self.retry = RetryPolicy { enabled: true, min_interval: min, max_interval: max, max_attempts };
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Name used in log lines; falls back to the address
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.address } else { &self.name }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_expected_status() -> u16 {
    200
}

fn default_verify_ssl() -> bool {
    true
}

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}
