//! Process-level shutdown coordination
//!
//! The module framework itself runs on plain OS threads; this is the piece of
//! the binary that turns Ctrl-C / SIGTERM (or an optional run duration) into a
//! single shutdown signal, after which the runtime calls `stop_all` on the
//! coordinator.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Why the runtime was asked to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal,
    DurationElapsed,
    Requested,
}

/// Coordinates graceful shutdown across the application
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    shutdown_requested: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new() -> (Self, broadcast::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(8);
        let coordinator = Self {
            shutdown_tx,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        };
        (coordinator, shutdown_rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Install signal handlers that trigger this coordinator
    ///
    /// A second signal while shutdown is in progress exits the process.
    pub fn install_signal_handlers(&self) {
        setup_signal_handlers(self.shutdown_tx.clone(), self.shutdown_requested.clone());
    }

    /// Wait for a shutdown signal, or for `duration` to elapse when given
    pub async fn wait(
        &self,
        mut shutdown_rx: broadcast::Receiver<()>,
        duration: Option<Duration>,
    ) -> ShutdownReason {
        if self.is_shutdown_requested() {
            return ShutdownReason::Requested;
        }

        match duration {
            Some(duration) => tokio::select! {
                _ = shutdown_rx.recv() => ShutdownReason::Signal,
                _ = tokio::time::sleep(duration) => ShutdownReason::DurationElapsed,
            },
            None => {
                // Lagged or closed receivers are treated as a shutdown request
                let _ = shutdown_rx.recv().await;
                ShutdownReason::Signal
            }
        }
    }
}

fn setup_signal_handlers(shutdown_tx: broadcast::Sender<()>, shutdown_requested: Arc<AtomicBool>) {
    let signal_count = Arc::new(AtomicUsize::new(0));

    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }

        use tokio::signal::unix::{signal, SignalKind};
        let signals = [
            SignalKind::interrupt(),
            SignalKind::terminate(),
            SignalKind::hangup(),
        ];

        for kind in signals {
            let tx = shutdown_tx.clone();
            let requested = shutdown_requested.clone();
            let sig_ctr = signal_count.clone();

            tokio::spawn(async move {
                if let Ok(mut sig) = signal(kind) {
                    while sig.recv().await.is_some() {
                        let prev = sig_ctr.fetch_add(1, Ordering::AcqRel);
                        requested.store(true, Ordering::Release);
                        let _ = tx.send(());
                        if prev >= 1 {
                            log::warn!("Second shutdown signal received; exiting immediately");
                            std::process::exit(130);
                        }
                    }
                }
            });
        }
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                let prev = signal_count.fetch_add(1, Ordering::AcqRel);
                shutdown_requested.store(true, Ordering::Release);
                let _ = shutdown_tx.send(());
                if prev >= 1 {
                    std::process::exit(130);
                }
            }
        });
    }
}
