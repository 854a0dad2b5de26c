//! Per endpoint monitoring loop.
//!
//! The loop checks once on start, then alternates between sleeping and
//! checking until it is cancelled or the retry budget runs out. Wake-ups are
//! anchored to a checkpoint that advances by one interval per check, so an
//! offline endpoint without retries keeps its cadence however long the
//! checks take.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::backoff::LinearJitterBackoff;
use super::checker::{Checker, Verdict};
use super::stream::OutcomeSender;
use super::trace::{TraceOptions, trace_host};
use super::types::{Failure, Outcome, Success};
use crate::endpoint::{Endpoint, EndpointState, Target};

pub(crate) struct Monitor {
    endpoint: Arc<Endpoint>,
    target: Arc<Target>,
    checker: Arc<dyn Checker>,
    backoff: LinearJitterBackoff,
    outcomes: OutcomeSender,
    state: EndpointState,
    exhausted: bool,
}

impl Monitor {
    pub(crate) fn new(
        endpoint: Arc<Endpoint>,
        checker: Arc<dyn Checker>,
        outcomes: OutcomeSender,
        state: EndpointState,
    ) -> Self {
        let target = endpoint.target().clone();
        let backoff = LinearJitterBackoff::from_policy(&target.config.retry);
        Self { endpoint, target, checker, backoff, outcomes, state, exhausted: false }
    }

    /// Run until `cancelled` flips to true or the retry budget is spent
    pub(crate) async fn run(self, cancelled: watch::Receiver<bool>) {
        let config = &self.target.config;
        let span = info_span!("endpoint", id = %config.id, name = %config.display_name());
        self.watch(cancelled).instrument(span).await
    }

    async fn watch(mut self, mut cancelled: watch::Receiver<bool>) {
        let config = &self.target.config;
        info!(
            protocol = %config.protocol,
            address = %config.address,
            interval = ?config.interval,
            "Monitoring started"
        );

        self.state.checkpoint = Some(Instant::now());
        let mut running = self.cycle(true).await;

        while running && !self.exhausted {
            let sleep = self.state.sleep_duration;
            let stop = tokio::select! {
                biased;
                _ = cancelled.wait_for(|stop| *stop) => true,
                _ = tokio::time::sleep(sleep) => false,
            };
            if stop {
                break;
            }

            debug!(protocol = %self.target.config.protocol, "Checking endpoint");
            running = self.cycle(false).await;
        }

        if self.exhausted {
            warn!(attempts = self.state.retry_attempts, "Retries exhausted, monitoring stopped");
        } else {
            info!("Monitoring stopped");
        }
    }

    /// One check: run it, reschedule, publish the state, then report.
    ///
    /// Returns `false` once nobody listens for outcomes anymore.
    async fn cycle(&mut self, first: bool) -> bool {
        let verdict = self.checker.check(&self.target, &mut self.state).await;
        let outcome = match verdict {
            Verdict::Success => self.success(),
            Verdict::Failure(issue) => self.failure(issue).await,
        };

        self.reschedule(first, Instant::now());
        self.endpoint.publish(self.state.clone());

        if let Err(e) = self.outcomes.send(outcome).await {
            error!("Outcome stream closed, stopping: {}", e);
            return false;
        }
        true
    }

    fn success(&mut self) -> Outcome {
        let now = Utc::now();
        self.state.online = true;
        self.state.retry_attempts = 0;
        self.state.last_online = Some(now);
        self.state.down_text.clear();
        self.state.trace_data.clear();
        debug!(latency = %self.state.request_latency, "Endpoint online");

        Outcome::Success(Success {
            endpoint: self.target.config.id,
            network_latency: self.state.network_latency,
            request_latency: self.state.request_latency,
            created_at: now,
        })
    }

    async fn failure(&mut self, issue: String) -> Outcome {
        let config = &self.target.config;
        if config.retry.enabled {
            self.state.retry_attempts = self.state.retry_attempts.saturating_add(1);
        }
        self.exhausted = self.backoff.is_exhausted(self.state.retry_attempts);

        if config.trace {
            let options = TraceOptions { probe_timeout: config.timeout, ..TraceOptions::default() };
            let budget = config.interval.max(config.timeout);
            self.state.trace_data = trace_host(&self.target.host, options, budget).await;
        }

        warn!(attempts = self.state.retry_attempts, "Endpoint offline: {}", issue);
        self.state.online = false;
        self.state.down_text.clone_from(&issue);

        Outcome::Failure(Failure {
            endpoint: config.id,
            issue,
            network_latency: self.state.network_latency,
            retries_exhausted: self.exhausted,
            trace_data: self.state.trace_data.clone(),
            created_at: Utc::now(),
            error_code: self.state.last_status_code,
        })
    }

    /// Advance the checkpoint by one interval and pick the next sleep.
    ///
    /// The first check and online endpoints sleep a full interval. Offline
    /// endpoints back off when retries are enabled, otherwise they wake at
    /// the checkpoint, immediately when it already passed.
    fn reschedule(&mut self, first: bool, now: Instant) {
        let interval = self.target.config.interval;
        let checkpoint = self.state.checkpoint.and_then(|at| at.checked_add(interval)).unwrap_or(now);
        self.state.checkpoint = Some(checkpoint);

        self.state.sleep_duration = if first || self.state.online {
            interval
        } else if self.target.config.retry.enabled {
            self.backoff.delay(self.state.retry_attempts)
        } else {
            checkpoint.saturating_duration_since(now)
        };
    }
}
