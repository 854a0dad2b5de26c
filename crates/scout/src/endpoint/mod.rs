//! Monitored endpoints: static configuration, runtime state and the handle
//! that starts and stops an endpoint's monitoring loop.

mod config;
mod state;

pub use config::{
    DEFAULT_INTERVAL, DEFAULT_TIMEOUT, EndpointConfig, HttpOptions, Protocol, RetryPolicy,
};
pub use state::{EndpointSnapshot, EndpointState};

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use hyper::Method;
use regex::Regex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Dispatch;
use tracing::instrument::WithSubscriber;
use url::Url;
use uuid::Uuid;

use crate::client::ResolveTo;
use crate::error::{Error, Result};
use crate::monitoring::checker::Checker;
use crate::monitoring::dns;
use crate::monitoring::executor::CheckExecutor;
use crate::monitoring::scheduler::Monitor;
use crate::monitoring::stream::OutcomeSender;

/// Validated configuration with everything a check needs precomputed
#[derive(Debug)]
pub(crate) struct Target {
    pub config: EndpointConfig,
    /// Host name used for DNS timing, pings and traces
    pub host: String,
    pub method: Method,
    pub expected: Option<Regex>,
    pub resolve_to: Option<ResolveTo>,
}

impl Target {
    fn compile(mut config: EndpointConfig) -> Result<Self> {
        if config.id.is_nil() {
            return Err(Error::NilId);
        }
        config.address = config.address.trim().to_string();
        if config.address.is_empty() {
            return Err(Error::EmptyAddress);
        }
        if config.interval.is_zero() {
            return Err(Error::ZeroInterval);
        }
        if config.timeout.is_zero() {
            config.timeout = DEFAULT_TIMEOUT;
        }
        if config.port == Some(0) {
            config.port = None;
        }

        let created_at = *config.created_at.get_or_insert_with(Utc::now);
        config.updated_at.get_or_insert(created_at);

        let method = Method::from_bytes(config.http.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::InvalidMethod(config.http.method.clone()))?;
        config.http.method = method.to_string();

        let expected = match config.http.expected.as_str() {
            "" => None,
            pattern => Some(Regex::new(pattern).map_err(|source| Error::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?),
        };

        let resolve_to = match config.http.resolve_to.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => {
                Some(value.parse().map_err(|_| Error::InvalidResolveTo(value.to_string()))?)
            }
        };

        if config.protocol == Protocol::Http {
            Url::parse(&config.address)
                .map_err(|source| Error::InvalidUrl { url: config.address.clone(), source })?;
        }

        let host = dns::host_of(&config);
        Ok(Self { config, host, method, expected, resolve_to })
    }
}

struct RunHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RunHandle {
    fn is_active(&self) -> bool {
        !*self.cancel.borrow() && !self.task.is_finished()
    }
}

/// A monitored endpoint.
///
/// Cheap to share behind an [`Arc`]. The monitoring loop is the only writer
/// of the runtime state; readers get copies via [`state`](Self::state) and
/// [`snapshot`](Self::snapshot), or follow changes with
/// [`subscribe`](Self::subscribe).
pub struct Endpoint {
    target: Arc<Target>,
    state: watch::Sender<EndpointState>,
    run: Mutex<Option<RunHandle>>,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id())
            .field("protocol", &self.target.config.protocol)
            .field("address", &self.target.config.address)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Endpoint {
    /// Validate a configuration and fill in defaults.
    ///
    /// Missing timestamps are set to now and a zero timeout is raised to
    /// [`DEFAULT_TIMEOUT`]. Anything malformed is rejected.
    pub fn new(config: EndpointConfig) -> Result<Self> {
        let target = Target::compile(config)?;
        let (state, _) = watch::channel(EndpointState::default());
        Ok(Self { target: Arc::new(target), state, run: Mutex::new(None) })
    }

    pub fn id(&self) -> Uuid {
        self.target.config.id
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.target.config
    }

    /// Copy of the current runtime state
    pub fn state(&self) -> EndpointState {
        self.state.borrow().clone()
    }

    pub fn snapshot(&self) -> EndpointSnapshot {
        EndpointSnapshot {
            config: self.target.config.clone(),
            state: self.state(),
            running: self.is_running(),
        }
    }

    /// Watch state updates published after every check
    pub fn subscribe(&self) -> watch::Receiver<EndpointState> {
        self.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.run.lock().unwrap_or_else(PoisonError::into_inner).as_ref().is_some_and(RunHandle::is_active)
    }

    /// Spawn the monitoring loop on the current tokio runtime.
    ///
    /// Outcomes go to `outcomes`; everything the loop logs goes to `logger`.
    /// Returns `false` when the loop is already running. Restarting a stopped
    /// endpoint keeps its state but grants a fresh retry budget.
    pub fn start(self: &Arc<Self>, outcomes: OutcomeSender, logger: Dispatch) -> bool {
        self.start_with(Arc::new(CheckExecutor::new()), outcomes, logger)
    }

    pub(crate) fn start_with(
        self: &Arc<Self>,
        checker: Arc<dyn Checker>,
        outcomes: OutcomeSender,
        logger: Dispatch,
    ) -> bool {
        let mut run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        if run.as_ref().is_some_and(RunHandle::is_active) {
            return false;
        }

        let mut state = self.state();
        state.retry_attempts = 0;

        let (cancel, cancelled) = watch::channel(false);
        let monitor = Monitor::new(self.clone(), checker, outcomes, state);
        let task = tokio::spawn(monitor.run(cancelled).with_subscriber(logger));
        *run = Some(RunHandle { cancel, task });
        true
    }

    /// Signal the loop to stop at its next tick.
    ///
    /// A check already in flight completes and publishes first. Stopping an
    /// endpoint that is not running does nothing. Returns whether a running
    /// loop was signalled.
    pub fn stop(&self) -> bool {
        let run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        match run.as_ref() {
            Some(handle) if handle.is_active() => {
                handle.cancel.send_replace(true);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn target(&self) -> &Arc<Target> {
        &self.target
    }

    pub(crate) fn publish(&self, state: EndpointState) {
        self.state.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_fills_defaults() {
        let config = EndpointConfig::http("https://example.com").with_timeout(Duration::ZERO).with_method("post");
        let endpoint = Endpoint::new(config).unwrap();
        let config = endpoint.config();

        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.http.method, "POST");
        assert!(config.created_at.is_some());
        assert_eq!(config.created_at, config.updated_at);
        assert_eq!(endpoint.target().host, "example.com");
        assert!(endpoint.target().expected.is_none());
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let nil = EndpointConfig::http("https://example.com").with_id(Uuid::nil());
        assert!(matches!(Endpoint::new(nil), Err(Error::NilId)));

        let blank = EndpointConfig::tcp("  ", 80);
        assert!(matches!(Endpoint::new(blank), Err(Error::EmptyAddress)));

        let pattern = EndpointConfig::http("https://example.com").with_expected("(unclosed");
        assert!(matches!(Endpoint::new(pattern), Err(Error::InvalidPattern { .. })));

        let method = EndpointConfig::http("https://example.com").with_method("GE T");
        assert!(matches!(Endpoint::new(method), Err(Error::InvalidMethod(_))));

        let resolve = EndpointConfig::http("https://example.com").with_resolve_to("backend:80");
        assert!(matches!(Endpoint::new(resolve), Err(Error::InvalidResolveTo(_))));

        let url = EndpointConfig::http("not a url");
        assert!(matches!(Endpoint::new(url), Err(Error::InvalidUrl { .. })));

        let interval = EndpointConfig::icmp("example.com").with_interval(Duration::ZERO);
        assert!(matches!(Endpoint::new(interval), Err(Error::ZeroInterval)));
    }

    #[test]
    fn test_zero_port_means_none() {
        let endpoint = Endpoint::new(EndpointConfig::tcp("example.com", 0)).unwrap();
        assert_eq!(endpoint.config().port, None);
    }

    #[test]
    fn test_stop_when_not_running_is_noop() {
        let endpoint = Endpoint::new(EndpointConfig::icmp("192.0.2.1")).unwrap();
        assert!(!endpoint.is_running());
        assert!(!endpoint.stop());
        assert!(!endpoint.stop());
        assert!(!endpoint.snapshot().running);
    }
}
