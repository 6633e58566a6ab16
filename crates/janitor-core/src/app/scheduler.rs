//! Scheduler - runs cleanup cycles and verification runs periodically.
//!
//! Each job is its own task with its own interval. The first run happens right
//! away. A run in progress is never interrupted: shutdown is observed between
//! runs only.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::cleanup::CleanupDriver;
use crate::config::JanitorConfig;
use crate::verify::VerificationEngine;

/// 実行中ジョブのハンドル
/// - `shutdown_and_join` を呼ばずに drop してもジョブは止まらない
/// - `shutdown_and_join` は実行中の 1 回分が終わるまで待つ
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn spawn(
        cleanup: Arc<CleanupDriver>,
        verification: Arc<VerificationEngine>,
        config: &JanitorConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let cleanup_job = tokio::spawn(run_periodically(
            "cleanup",
            config.cleanup_interval(),
            shutdown_rx.clone(),
            move || {
                let cleanup = Arc::clone(&cleanup);
                async move {
                    cleanup.cleanup_expired().await;
                }
            },
        ));
        let verification_job = tokio::spawn(run_periodically(
            "verification",
            config.verification_interval(),
            shutdown_rx,
            move || {
                let verification = Arc::clone(&verification);
                async move {
                    verification.verify_unflagged_builds().await;
                }
            },
        ));

        Self {
            shutdown_tx,
            joins: vec![cleanup_job, verification_job],
        }
    }

    /// Ask every job to stop after its current run.
    pub fn request_shutdown(&self) {
        // receiver はすでに drop されていることがある
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
    }
}

async fn run_periodically<F, Fut>(
    job: &'static str,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    mut run: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(job, period_secs = period.as_secs(), "Scheduled job started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                // sender の drop も shutdown とみなす
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        debug!(job, "Scheduled job run");
        run().await;
    }

    info!(job, "Scheduled job stopped");
}
