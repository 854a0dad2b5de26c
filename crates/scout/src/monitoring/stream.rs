//! Shared outcome stream fed by every endpoint loop.
//!
//! Producers block once the channel is full, so a stalled consumer stalls
//! every loop. With the default capacity of one this is close to a
//! rendezvous; larger capacities decouple producers from consumers. Each
//! endpoint has a single producing task, so its outcomes stay in order.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use super::types::Outcome;

/// Default capacity, keeping producers in lock step with consumers
pub const DEFAULT_OUTCOME_BUFFER: usize = 1;

/// Sending half handed to endpoint loops
pub type OutcomeSender = mpsc::Sender<Outcome>;

/// Create an outcome channel. A capacity of zero is raised to one.
pub fn outcome_channel(capacity: usize) -> (OutcomeSender, OutcomeStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, OutcomeStream { rx: Arc::new(Mutex::new(rx)) })
}

/// Receiving half of the outcome channel.
///
/// Clones share the same queue; every outcome is delivered to exactly one
/// of them.
#[derive(Debug, Clone)]
pub struct OutcomeStream {
    rx: Arc<Mutex<mpsc::Receiver<Outcome>>>,
}

impl OutcomeStream {
    /// Wait for the next outcome. `None` once every sender is gone.
    pub async fn recv(&self) -> Option<Outcome> {
        self.rx.lock().await.recv().await
    }

    /// Take an outcome if one is ready without waiting
    pub fn try_recv(&self) -> Option<Outcome> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}
