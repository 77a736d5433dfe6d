use std::sync::Arc;
use tokio::sync::watch;

/// Global backpressure gate in front of request dispatch
///
/// While paused no new request is dispatched; requests already in flight
/// finish normally. Clones share the same gate.
#[derive(Debug, Clone)]
pub struct IssuanceGate {
    paused: Arc<watch::Sender<bool>>,
}

impl IssuanceGate {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            paused: Arc::new(paused),
        }
    }

    /// Stops dispatch; returns false if the gate was already paused
    pub fn pause(&self) -> bool {
        !self.paused.send_replace(true)
    }

    /// Reopens the gate and wakes every waiter
    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Waits until the gate is open; returns at once if it already is
    pub async fn wait_until_open(&self) {
        let mut rx = self.paused.subscribe();
        // the sender lives as long as `self`, so the channel cannot close here
        let _ = rx.wait_for(|paused| !*paused).await;
    }
}

impl Default for IssuanceGate {
    fn default() -> Self {
        Self::new()
    }
}
