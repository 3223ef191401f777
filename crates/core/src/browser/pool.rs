//! Fixed-size pool of exclusively-owned browser sessions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::config::BrowserConfig;
use crate::metrics;

use super::session::{BrowserSession, SessionError, SessionFactory};

type SlotCell = Arc<Mutex<Option<Box<dyn BrowserSession>>>>;

/// A handle to one pool slot.
///
/// Locking the slot gives exclusive use of its session. Waiters are served
/// in FIFO order.
#[derive(Clone)]
pub struct SessionSlot {
    index: usize,
    cell: SlotCell,
}

impl SessionSlot {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Wait for exclusive access to the slot's session.
    ///
    /// The guard holds `None` once the pool has been released.
    pub async fn lock(&self) -> MutexGuard<'_, Option<Box<dyn BrowserSession>>> {
        self.cell.lock().await
    }
}

/// Sessions for one run, created up front and released together.
pub struct SessionPool {
    slots: Vec<SlotCell>,
    released: AtomicBool,
}

impl SessionPool {
    /// Create `size` sessions. If any creation fails, the sessions created so
    /// far are closed before the error is returned.
    pub async fn start(
        factory: &dyn SessionFactory,
        config: &BrowserConfig,
        size: usize,
    ) -> Result<Self, SessionError> {
        let size = size.max(1);
        let mut sessions: Vec<Box<dyn BrowserSession>> = Vec::with_capacity(size);

        for slot in 0..size {
            match factory.create(config, slot).await {
                Ok(session) => {
                    metrics::SESSION_STARTUPS.with_label_values(&["success"]).inc();
                    debug!(slot, "Browser session started");
                    sessions.push(session);
                }
                Err(e) => {
                    metrics::SESSION_STARTUPS.with_label_values(&["failed"]).inc();
                    error!(slot, error = %e, "Browser session startup failed");
                    for mut session in sessions {
                        if let Err(close_err) = session.close().await {
                            warn!(slot = session.slot(), error = %close_err, "Failed to close session after startup failure");
                        }
                    }
                    return Err(match e {
                        SessionError::Startup(_) => e,
                        other => SessionError::Startup(other.to_string()),
                    });
                }
            }
        }

        info!(size, "Session pool started");

        Ok(Self {
            slots: sessions
                .into_iter()
                .map(|s| Arc::new(Mutex::new(Some(s))))
                .collect(),
            released: AtomicBool::new(false),
        })
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Slot for the item at submission `index` (round-robin).
    pub fn slot_for(&self, index: usize) -> SessionSlot {
        let slot = index % self.slots.len();
        SessionSlot {
            index: slot,
            cell: Arc::clone(&self.slots[slot]),
        }
    }

    /// Close every session exactly once. Later calls are no-ops.
    ///
    /// Waits for any in-flight operation on a slot to finish first.
    pub async fn release_all(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            debug!("Session pool already released");
            return;
        }

        let closes = self.slots.iter().enumerate().map(|(slot, cell)| async move {
            let session = cell.lock().await.take();
            if let Some(mut session) = session {
                if let Err(e) = session.close().await {
                    warn!(slot, error = %e, "Failed to close browser session");
                }
            }
        });
        join_all(closes).await;

        info!(size = self.slots.len(), "Session pool released");
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}
