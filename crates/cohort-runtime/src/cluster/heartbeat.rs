use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cohort_core::cluster::MemberId;
use tokio::sync::watch;

/// Keeps the local member's `last_heartbeat` fresh so others count it as live.
pub struct HeartbeatLoop {
    pool: sqlx::PgPool,
    member_id: MemberId,
    interval: Duration,
    running: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl HeartbeatLoop {
    /// Create a new heartbeat loop.
    pub fn new(pool: sqlx::PgPool, member_id: MemberId, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            pool,
            member_id,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Check if the loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the heartbeat loop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        self.running.store(false, Ordering::SeqCst);
    }

    /// Run the heartbeat loop until stopped.
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        let mut shutdown_rx = self.shutdown_rx.clone();

        // A stop issued before the loop started must still be honored.
        if *shutdown_rx.borrow() {
            self.running.store(false, Ordering::SeqCst);
            return;
        }

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.send_heartbeat().await {
                        tracing::warn!("Failed to send heartbeat: {}", e);
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::debug!("Heartbeat loop shutting down");
                        break;
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
    }

    async fn send_heartbeat(&self) -> cohort_core::Result<()> {
        sqlx::query("UPDATE cohort_members SET last_heartbeat = NOW() WHERE id = $1")
            .bind(self.member_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| cohort_core::CohortError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_before_run_returns_immediately() {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/test").unwrap();
        let heartbeat = HeartbeatLoop::new(pool, MemberId::new(), Duration::from_secs(5));

        heartbeat.stop();
        heartbeat.run().await;
        assert!(!heartbeat.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_running_loop() {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/test").unwrap();
        let heartbeat = Arc::new(HeartbeatLoop::new(
            pool,
            MemberId::new(),
            Duration::from_secs(3600),
        ));

        let runner = heartbeat.clone();
        let handle = tokio::spawn(async move { runner.run().await });
        tokio::task::yield_now().await;
        assert!(heartbeat.is_running());

        heartbeat.stop();
        handle.await.unwrap();
        assert!(!heartbeat.is_running());
    }
}
