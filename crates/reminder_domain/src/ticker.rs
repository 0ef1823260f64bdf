//! Recurring due-check driving [`ReminderService::tick`].
//!
//! The ticker is a tokio task bound to a [`CancellationToken`]. Dropping the
//! handle cancels the task, so periodic work cannot outlive its owner.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{scheduler::DEFAULT_TICK_SECS, service::ReminderService};

#[derive(Debug, Clone, Copy)]
pub struct TickerConfig {
    pub period: Duration,
    /// Run one pass right away instead of waiting a full period.
    pub tick_immediately: bool,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(DEFAULT_TICK_SECS),
            tick_immediately: false,
        }
    }
}

pub struct ReminderTicker {
    cancellation: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ReminderTicker {
    /// Spawns the ticker on the current tokio runtime.
    pub fn spawn(service: Arc<ReminderService>, config: TickerConfig) -> Self {
        let cancellation = CancellationToken::new();
        let cancel = cancellation.clone();
        let handle = tokio::spawn(async move {
            run(service, config, cancel).await;
        });
        info!(period_secs = config.period.as_secs_f64(), "reminder ticker started");
        Self {
            cancellation,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancels the task and waits for it to finish.
    pub async fn shutdown(mut self) {
        self.cancellation.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "reminder ticker task ended abnormally");
            }
        }
        info!("reminder ticker stopped");
    }
}

impl Drop for ReminderTicker {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

async fn run(service: Arc<ReminderService>, config: TickerConfig, cancel: CancellationToken) {
    let period = config.period.max(Duration::from_millis(1));
    let start = if config.tick_immediately {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let report = service.tick();
                if !report.is_idle() {
                    debug!(
                        delivered = report.delivered.len(),
                        awaiting_permission = report.awaiting_permission.len(),
                        failed = report.failed.len(),
                        "reminder pass finished"
                    );
                }
            }
        }
    }
}
