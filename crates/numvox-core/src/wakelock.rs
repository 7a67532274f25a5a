//! Display wake lock bound to application state and visibility
//!
//! Best-effort by contract: not every environment grants the capability,
//! so acquisition failures are swallowed and simply leave the lock unheld.
//! Playing acquires, any other state releases, losing visibility releases,
//! and regaining visibility while playing re-requests (the underlying
//! capability is typically revoked while hidden).

use std::sync::Arc;

use async_trait::async_trait;
use numvox_foundation::AppState;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::events::{Event, EventBus, EventKind, Subscription};

/// Platform capability boundary. `acquire` returns whether the lock is
/// actually held afterwards.
#[async_trait]
pub trait WakeLockBackend: Send + Sync {
    async fn acquire(&self) -> bool;
    async fn release(&self);
}

/// Backend for platforms without a wake-lock capability.
pub struct NoopBackend;

#[async_trait]
impl WakeLockBackend for NoopBackend {
    async fn acquire(&self) -> bool {
        false
    }

    async fn release(&self) {}
}

enum WakeSignal {
    State(AppState),
    Visibility(bool),
}

pub struct WakeLock {
    _subscriptions: Vec<Subscription>,
    worker: JoinHandle<()>,
}

impl WakeLock {
    /// Bind a backend to the bus. The worker task owns the held/unheld
    /// bookkeeping; bus handlers only forward signals into its channel.
    pub fn spawn(bus: &Arc<EventBus>, backend: Arc<dyn WakeLockBackend>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let state_tx = tx.clone();
        let sub_state = bus.subscribe(EventKind::StateChanged, move |event| {
            if let Event::StateChanged(state) = event {
                let _ = state_tx.send(WakeSignal::State(*state));
            }
        });
        let vis_tx = tx;
        let sub_visibility = bus.subscribe(EventKind::VisibilityChanged, move |event| {
            if let Event::VisibilityChanged { visible } = event {
                let _ = vis_tx.send(WakeSignal::Visibility(*visible));
            }
        });

        let worker = tokio::spawn(Self::run(rx, backend));
        Self {
            _subscriptions: vec![sub_state, sub_visibility],
            worker,
        }
    }

    async fn run(mut rx: mpsc::UnboundedReceiver<WakeSignal>, backend: Arc<dyn WakeLockBackend>) {
        let mut held = false;
        let mut state = AppState::Ready;
        let mut visible = true;

        while let Some(signal) = rx.recv().await {
            match signal {
                WakeSignal::State(s) => state = s,
                WakeSignal::Visibility(v) => visible = v,
            }

            let wanted = state == AppState::Playing && visible;
            if wanted && !held {
                held = backend.acquire().await;
                debug!(held, "wake lock requested");
            } else if !wanted && held {
                backend.release().await;
                held = false;
                debug!("wake lock released");
            }
        }

        if held {
            backend.release().await;
        }
    }

    pub fn shutdown(self) {
        self.worker.abort();
    }
}
