use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};

use cohort_core::cluster::{Invocation, MemberId};
use cohort_core::error::{CohortError, Result};

/// Capacity of the in-process invocation fan-out.
const BUFFER_SIZE: usize = 64;

/// Receives broadcast invocations via PostgreSQL LISTEN/NOTIFY and keeps the
/// ones addressed to the local member.
pub struct InvocationListener {
    pool: sqlx::PgPool,
    channel: String,
    local_id: MemberId,
    services: Vec<String>,
    running: Arc<AtomicBool>,
    invocation_tx: broadcast::Sender<Invocation>,
    ready_tx: watch::Sender<bool>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl InvocationListener {
    /// Create a new invocation listener.
    pub fn new(
        pool: sqlx::PgPool,
        channel: impl Into<String>,
        local_id: MemberId,
        services: Vec<String>,
    ) -> Self {
        let (invocation_tx, _) = broadcast::channel(BUFFER_SIZE);
        let (ready_tx, _) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            pool,
            channel: channel.into(),
            local_id,
            services,
            running: Arc::new(AtomicBool::new(false)),
            invocation_tx,
            ready_tx,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Subscribe to invocations accepted by this member.
    pub fn subscribe(&self) -> broadcast::Receiver<Invocation> {
        self.invocation_tx.subscribe()
    }

    /// Receiver that flips to `true` once `LISTEN` is in place.
    pub fn ready(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    /// Check if the listener is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the listener.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        self.running.store(false, Ordering::SeqCst);
    }

    /// Run the listener loop until stopped.
    pub async fn run(&self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);

        let mut listener = sqlx::postgres::PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| CohortError::Database(e.to_string()))?;

        listener
            .listen(&self.channel)
            .await
            .map_err(|e| CohortError::Database(e.to_string()))?;

        tracing::info!("Listening for invocations on channel: {}", self.channel);
        self.ready_tx.send_replace(true);

        let mut shutdown_rx = self.shutdown_rx.clone();
        if *shutdown_rx.borrow() {
            self.running.store(false, Ordering::SeqCst);
            return Ok(());
        }

        loop {
            tokio::select! {
                notification = listener.recv() => {
                    match notification {
                        Ok(notification) => {
                            if let Some(invocation) = self.accept(notification.payload()) {
                                let _ = self.invocation_tx.send(invocation);
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Error receiving invocation: {}", e);
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::debug!("Invocation listener shutting down");
                        break;
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Decode a payload and keep it only if it is meant for this member.
    fn accept(&self, payload: &str) -> Option<Invocation> {
        let invocation = match Invocation::decode(payload) {
            Ok(invocation) => invocation,
            Err(e) => {
                tracing::warn!("Ignoring malformed invocation: {}", e);
                return None;
            }
        };

        if !invocation.targets_member(&self.local_id) {
            return None;
        }

        if !self.services.iter().any(|s| s == &invocation.service) {
            tracing::debug!(
                invocation = %invocation.id,
                service = %invocation.service,
                "Ignoring invocation for a service this member does not run"
            );
            return None;
        }

        Some(invocation)
    }
}
