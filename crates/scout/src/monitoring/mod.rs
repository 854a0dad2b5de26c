pub mod backoff;
pub(crate) mod checker;
pub(crate) mod dns;
pub(crate) mod executor;
pub(crate) mod scheduler;
pub mod stream;
pub mod trace;
pub mod types;

pub use backoff::LinearJitterBackoff;
pub use stream::{DEFAULT_OUTCOME_BUFFER, OutcomeSender, OutcomeStream, outcome_channel};
pub use trace::{TraceData, TraceHop, TraceOptions};
pub use types::{Failure, Latency, Outcome, Success};
