//! Periodic fleet refresh.
//!
//! Runs [`SyncService::refresh_all`] on a fixed interval in a background
//! thread, and on demand through a broadcast trigger channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::broadcast;

use super::model::SyncMode;
use super::service::SyncService;
use crate::config::RefreshConfig;

/// Periodic refresh scheduler.
pub struct RefreshScheduler {
    service: Arc<SyncService>,
    interval: Duration,
    mode: SyncMode,
    shutdown: Arc<AtomicBool>,
}

impl RefreshScheduler {
    pub fn new(service: Arc<SyncService>, interval: Duration, mode: SyncMode) -> Self {
        Self {
            service,
            interval,
            mode,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(service: Arc<SyncService>, config: &RefreshConfig) -> Self {
        Self::new(service, Duration::from_secs(config.interval_secs), config.mode)
    }

    /// Start the refresh loop in a background thread.
    /// Accepts a trigger receiver for manual refresh requests.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let service = Arc::clone(&self.service);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;
        let mode = self.mode;

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("Failed to start refresh scheduler runtime: {}", e);
                    return;
                }
            };

            rt.block_on(async {
                let mut interval_timer = tokio::time::interval(interval);
                interval_timer.tick().await; // skip immediate first tick

                loop {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    tokio::select! {
                        _ = interval_timer.tick() => {},
                        Ok(()) = trigger_rx.recv() => {
                            log::info!("Manual API refresh triggered");
                        },
                    }

                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    match service.refresh_all(mode).await {
                        Ok(summary) => {
                            log::info!(
                                "Scheduled refresh: {} of {} APIs synced",
                                summary.succeeded,
                                summary.total_apis
                            );
                            for failure in &summary.failures {
                                log::warn!(
                                    "Scheduled refresh of '{}' ({}) failed: {}",
                                    failure.api_name,
                                    failure.api_id,
                                    failure.reason
                                );
                            }
                        }
                        Err(e) => log::error!("Scheduled refresh failed: {}", e),
                    }
                }
            });
        })
    }

    /// Signals the scheduler to stop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
