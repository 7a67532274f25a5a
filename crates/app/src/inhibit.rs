//! Wake-lock backend backed by `systemd-inhibit`
//!
//! Holds an idle/sleep inhibitor for as long as a helper child process
//! lives; releasing kills the child. Best-effort per the wake-lock
//! contract: environments without systemd simply never hold the lock.

use std::sync::Arc;

use async_trait::async_trait;
use numvox_core::WakeLockBackend;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct InhibitBackend {
    child: Mutex<Option<Child>>,
}

impl InhibitBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            child: Mutex::new(None),
        })
    }
}

#[async_trait]
impl WakeLockBackend for InhibitBackend {
    async fn acquire(&self) -> bool {
        let mut guard = self.child.lock().await;
        if guard.is_some() {
            return true;
        }
        let spawned = Command::new("systemd-inhibit")
            .args([
                "--what=idle:sleep",
                "--who=numvox",
                "--why=number drill playback",
                "sleep",
                "infinity",
            ])
            .spawn();
        match spawned {
            Ok(child) => {
                debug!("wake inhibitor acquired");
                *guard = Some(child);
                true
            }
            Err(e) => {
                // Capability not granted on this platform; stay unheld
                warn!("wake inhibitor unavailable: {}", e);
                false
            }
        }
    }

    async fn release(&self) {
        let mut guard = self.child.lock().await;
        if let Some(mut child) = guard.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
            debug!("wake inhibitor released");
        }
    }
}
