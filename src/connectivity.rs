//! Connectivity Signal
//!
//! Two-state Online/Offline signal fed by platform network events.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_online(self) -> bool {
        self == Connectivity::Online
    }
}

// == Connectivity Monitor ==
/// Holds the current connectivity state and broadcasts transitions.
///
/// Cloning shares the same underlying signal.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    sender: Arc<watch::Sender<Connectivity>>,
}

impl ConnectivityMonitor {
    pub fn new(initial: Connectivity) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn online() -> Self {
        Self::new(Connectivity::Online)
    }

    pub fn offline() -> Self {
        Self::new(Connectivity::Offline)
    }

    pub fn current(&self) -> Connectivity {
        *self.sender.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.current().is_online()
    }

    /// Platform reported "became online".
    pub fn set_online(&self) -> bool {
        self.set(Connectivity::Online)
    }

    /// Platform reported "became offline".
    pub fn set_offline(&self) -> bool {
        self.set(Connectivity::Offline)
    }

    /// Applies a new state. Returns `true` if the state changed.
    pub fn set(&self, state: Connectivity) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            info!(?state, "Connectivity changed");
        }
        changed
    }

    /// Subscribes to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.sender.subscribe()
    }
}
