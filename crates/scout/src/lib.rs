//! Embeddable endpoint monitoring.
//!
//! Each [`Endpoint`] is checked on its own tokio task over HTTP, TCP, UDP
//! or ICMP. Every completed check produces one [`Outcome`] on a shared
//! [`OutcomeStream`]. A [`Registry`] owns a set of endpoints and the stream
//! they feed:
//!
//! ```no_run
//! # async fn demo() -> scout::Result<()> {
//! use scout::{EndpointConfig, Outcome, Registry};
//!
//! let registry = Registry::new(
//!     [EndpointConfig::http("https://example.com/health")],
//!     tracing::Dispatch::none(),
//! )?;
//! registry.start_all().await;
//!
//! let outcomes = registry.outcome_stream();
//! while let Some(outcome) = outcomes.recv().await {
//!     match outcome {
//!         Outcome::Success(success) => println!("{} up", success.endpoint),
//!         Outcome::Failure(failure) => println!("{} down: {}", failure.endpoint, failure.issue),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod duration;
pub mod endpoint;
pub mod error;
pub mod monitoring;
pub mod registry;

pub use endpoint::{Endpoint, EndpointConfig, EndpointSnapshot, EndpointState, Protocol, RetryPolicy};
pub use error::{Error, Result};
pub use monitoring::{Failure, Latency, Outcome, OutcomeStream, Success, TraceData};
pub use registry::Registry;
