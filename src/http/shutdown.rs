//! Graceful shutdown and signal handling.
//!
//! SIGTERM and SIGINT move the process from `Running` to `ShuttingDown`.
//! That transition happens once; signals arriving afterwards are logged and
//! ignored. Releasing the data store is guarded separately so it also runs
//! at most once, however many times shutdown is requested.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::STORE_RELEASE_TIMEOUT_SECS;
use crate::store::DataStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    /// Terminal.
    ShuttingDown,
}

struct Inner {
    shutting_down: watch::Sender<bool>,
    released: AtomicBool,
    release_timeout: Duration,
}

/// Cloneable handle to the process shutdown state machine.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::with_release_timeout(Duration::from_secs(STORE_RELEASE_TIMEOUT_SECS))
    }

    /// Coordinator that abandons a hanging store release after `release_timeout`.
    pub fn with_release_timeout(release_timeout: Duration) -> Self {
        let (shutting_down, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                shutting_down,
                released: AtomicBool::new(false),
                release_timeout,
            }),
        }
    }

    pub fn phase(&self) -> Phase {
        if *self.inner.shutting_down.borrow() {
            Phase::ShuttingDown
        } else {
            Phase::Running
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.phase() == Phase::ShuttingDown
    }

    /// Request shutdown.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn trigger(&self, reason: &str) -> bool {
        let started = self.inner.shutting_down.send_if_modified(|shutting_down| {
            if *shutting_down {
                false
            } else {
                *shutting_down = true;
                true
            }
        });

        if started {
            tracing::info!(reason, "Shutdown requested, stopping server");
        } else {
            tracing::warn!(reason, "Shutdown already in progress, ignoring");
        }
        started
    }

    /// Resolves once shutdown has been triggered (immediately if it already has).
    pub async fn triggered(&self) {
        let mut rx = self.inner.shutting_down.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|shutting_down| *shutting_down).await;
    }

    /// Release the data store. Only the first call does anything.
    ///
    /// A release that hangs is abandoned after a bounded wait so the process
    /// can still exit.
    pub async fn release(&self, store: &dyn DataStore) -> bool {
        if self.inner.released.swap(true, Ordering::SeqCst) {
            tracing::debug!("Data store already released");
            return false;
        }

        let limit = self.inner.release_timeout;
        match tokio::time::timeout(limit, store.close()).await {
            Ok(()) => tracing::info!("Data store released"),
            Err(_) => tracing::error!(
                timeout_secs = limit.as_secs_f64(),
                "Timed out releasing data store, exiting anyway"
            ),
        }
        true
    }

    /// Spawn a task that triggers shutdown on SIGTERM and SIGINT.
    ///
    /// The task keeps listening after the first signal so later deliveries
    /// are absorbed by `trigger` instead of killing the process mid-release.
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            if let Err(e) = signal_loop(&coordinator).await {
                tracing::error!(error = %e, "Failed to install signal handlers");
            }
        })
    }
}

#[cfg(unix)]
async fn signal_loop(coordinator: &ShutdownCoordinator) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    loop {
        let reason = tokio::select! {
            Some(()) = interrupt.recv() => "SIGINT",
            Some(()) = terminate.recv() => "SIGTERM",
            else => break,
        };
        coordinator.trigger(reason);
    }
    Ok(())
}

#[cfg(not(unix))]
async fn signal_loop(coordinator: &ShutdownCoordinator) -> std::io::Result<()> {
    loop {
        tokio::signal::ctrl_c().await?;
        coordinator.trigger("Ctrl+C");
    }
}
