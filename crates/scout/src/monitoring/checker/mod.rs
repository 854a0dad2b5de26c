//! Protocol specific checks.
//!
//! A checker updates the endpoint's runtime fields and returns a
//! [`Verdict`]. The monitoring loop turns the verdict into exactly one
//! success or failure report.

mod http;
mod icmp;
mod net;

pub(crate) use http::HttpChecker;
pub(crate) use icmp::IcmpChecker;
pub(crate) use net::NetChecker;

use crate::endpoint::{EndpointState, Target};

/// Result of one check before it is reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    Success,
    Failure(String),
}

impl Verdict {
    pub(crate) fn failure(issue: impl Into<String>) -> Self {
        Verdict::Failure(issue.into())
    }
}

/// Checker trait for the different protocols
#[async_trait::async_trait]
pub(crate) trait Checker: Send + Sync {
    /// Run one check against `target`, recording measurements in `state`
    async fn check(&self, target: &Target, state: &mut EndpointState) -> Verdict;
}
