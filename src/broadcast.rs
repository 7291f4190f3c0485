//! # broadcast
//!
//! Fan-out of [`OutboundMessage`]s to every connected observer.
//!
//! Each observer owns a bounded `mpsc` receiver.  `publish` serializes once,
//! copies the sender list out of the lock, then `try_send`s to each:
//!
//! | Outcome | Effect |
//! |---------|--------|
//! | delivered | - |
//! | channel full | message dropped for that observer only |
//! | channel closed | observer deregistered |
//!
//! Nothing here ever reports back to the state machine.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;
use uuid::Uuid;

use crate::events::OutboundMessage;

pub type ObserverId = Uuid;
pub type Frame = Arc<str>;

pub struct Broadcaster {
    observers: RwLock<HashMap<ObserverId, mpsc::Sender<Frame>>>,
    capacity:  usize,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            capacity:  capacity.max(1),
        }
    }

    /// Register a new observer with an empty channel.
    #[cfg(test)]
    pub fn subscribe(&self) -> (ObserverId, mpsc::Receiver<Frame>) {
        self.subscribe_with(None)
    }

    /// Register a new observer whose channel already holds `initial`.
    /// Called from the strategy actor so nothing published later can
    /// overtake it.
    pub fn subscribe_with(&self, initial: Option<&OutboundMessage>) -> (ObserverId, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        if let Some(message) = initial {
            // Fresh channel with capacity >= 1: cannot be full.
            let _ = tx.try_send(Arc::from(message.to_json()));
        }
        let id = Uuid::new_v4();
        self.observers.write().insert(id, tx);
        debug!(%id, "Observer registered");
        (id, rx)
    }

    pub fn unsubscribe(&self, id: ObserverId) {
        if self.observers.write().remove(&id).is_some() {
            debug!(%id, "Observer removed");
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Deliver `message` to every observer.  Returns how many accepted it.
    pub fn publish(&self, message: &OutboundMessage) -> usize {
        let frame: Frame = Arc::from(message.to_json());

        let targets: Vec<(ObserverId, mpsc::Sender<Frame>)> = self
            .observers
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, tx) in targets {
            match tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => debug!(%id, "Observer lagging — message dropped"),
                Err(TrySendError::Closed(_)) => closed.push(id),
            }
        }

        if !closed.is_empty() {
            let mut observers = self.observers.write();
            for id in closed {
                observers.remove(&id);
                debug!(%id, "Observer closed — deregistered");
            }
        }

        delivered
    }
}
