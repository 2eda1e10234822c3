//! Cooperative Ctrl+C handling for long stream reads
//!
//! Consumers either check [`ShutdownCoordinator::is_shutdown_requested`]
//! between items or race [`ShutdownCoordinator::wait_for_shutdown`] against
//! the next item, then stop cleanly with whatever they already produced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Shared handle to a coordinator
pub type SharedShutdown = Arc<ShutdownCoordinator>;

/// Stop flag plus a wake-up for tasks waiting on it
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    requested: AtomicBool,
    notify: Notify,
}

impl ShutdownCoordinator {
    /// New coordinator behind an [`Arc`]
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::default())
    }

    /// Ask every consumer to stop; waiters are woken once
    pub fn request_shutdown(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether a stop was requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolve once a stop is requested
    pub async fn wait_for_shutdown(&self) {
        let notified = self.notify.notified();
        if self.is_shutdown_requested() {
            return;
        }
        notified.await;
    }

    /// Spawn a task turning the first Ctrl+C into a stop request
    pub fn listen_for_ctrl_c(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl+C received, finishing the current item");
                    coordinator.request_shutdown();
                }
                Err(e) => warn!(error = %e, "Cannot listen for Ctrl+C"),
            }
        });
    }
}
