//! Single-slot gain listener
//!
//! At most one subscriber receives gain updates. Pushing never blocks the
//! caller: a full or closed queue is reported and the update dropped.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::error::DeckError;
use crate::gain::StereoGain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct ListenerSlot {
    capacity: usize,
    current: Mutex<Option<(ListenerId, mpsc::Sender<StereoGain>)>>,
}

impl ListenerSlot {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            current: Mutex::new(None),
        }
    }

    /// Install a new listener, replacing any previous one.
    pub fn attach(&self) -> (ListenerId, mpsc::Receiver<StereoGain>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = ListenerId::new();
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace((id, tx));
        if let Some((old, _)) = previous {
            tracing::debug!(%old, new = %id, "listener replaced");
        }
        (id, rx)
    }

    /// Remove the listener if `id` is still the current one.
    pub fn detach(&self, id: ListenerId) -> bool {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        match current.as_ref() {
            Some((current_id, _)) if *current_id == id => {
                *current = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Hand `gain` to the listener, if there is one.
    pub fn push(&self, gain: StereoGain) -> Result<(), DeckError> {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let Some((id, tx)) = current.as_ref() else {
            return Ok(());
        };

        match tx.try_send(gain) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                Err(DeckError::Delivery(format!("listener {id} queue full")))
            }
            Err(TrySendError::Closed(_)) => {
                Err(DeckError::Delivery(format!("listener {id} closed")))
            }
        }
    }
}
