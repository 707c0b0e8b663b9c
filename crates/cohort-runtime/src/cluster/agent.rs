use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinError;

use cohort_core::cluster::{ClusterProvider, MemberCapabilities, MemberRole};
use cohort_core::config::ClusterConfig;
use cohort_core::error::{CohortError, Result};

use super::listener::InvocationListener;
use super::provider::PgClusterProvider;
use crate::db::Database;

/// How long to wait for the listener task after asking it to stop.
const LISTENER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Local process lifecycle, driven by remote commands or signals.
#[derive(Clone)]
pub struct ProcessControl {
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl ProcessControl {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Receiver that flips to `true` once shutdown is requested.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Request shutdown now.
    pub fn request_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        *self.shutdown_tx.borrow()
    }
}

impl Default for ProcessControl {
    fn default() -> Self {
        Self::new()
    }
}

impl MemberCapabilities for ProcessControl {
    fn terminate_after(&self, delay: Duration) {
        tracing::info!("Terminating in {:?}", delay);
        let control = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            control.request_shutdown();
        });
    }
}

/// A long-running cluster member that executes invocations addressed to it.
pub struct MemberAgent {
    provider: Arc<PgClusterProvider>,
    listener: Arc<InvocationListener>,
    control: ProcessControl,
}

impl MemberAgent {
    /// Join the cluster as a member advertising `services`.
    pub async fn start(
        db: Database,
        config: ClusterConfig,
        services: Vec<String>,
    ) -> Result<Self> {
        let provider =
            PgClusterProvider::join(db, config, MemberRole::Member, services.clone()).await?;

        let listener = InvocationListener::new(
            provider.database().pool().clone(),
            provider.channel(),
            provider.local_member().id,
            services,
        );

        Ok(Self {
            provider: Arc::new(provider),
            listener: Arc::new(listener),
            control: ProcessControl::new(),
        })
    }

    /// Cluster view of this member.
    pub fn provider(&self) -> Arc<PgClusterProvider> {
        self.provider.clone()
    }

    /// Serve invocations until terminated, then leave the cluster.
    ///
    /// The member becomes active only once its listener is subscribed, so a
    /// stop issued while it starts up never counts it.
    pub async fn run(self) -> Result<()> {
        let mut invocations = self.listener.subscribe();
        let mut shutdown_rx = self.control.subscribe();
        let mut ready_rx = self.listener.ready();

        let listener = self.listener.clone();
        let mut listener_task = tokio::spawn(async move { listener.run().await });
        let mut listener_done = false;

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let startup = tokio::select! {
            ready = ready_rx.wait_for(|ready| *ready) => match ready {
                Ok(_) => Ok(()),
                Err(_) => Err(CohortError::Internal("Listener dropped".to_string())),
            },
            joined = &mut listener_task => {
                listener_done = true;
                Err(listener_failure(joined))
            }
        };
        let startup = match startup {
            Ok(()) => self.provider.activate().await,
            Err(e) => Err(e),
        };

        let result = match startup {
            Err(e) => Err(e),
            Ok(()) => {
                tracing::info!(
                    member = %self.provider.local_member().id,
                    services = ?self.provider.local_member().services,
                    "Member agent running"
                );

                loop {
                    tokio::select! {
                        received = invocations.recv() => match received {
                            Ok(invocation) => {
                                tracing::info!(
                                    invocation = %invocation.id,
                                    sender = %invocation.sender,
                                    command = invocation.command.kind(),
                                    "Executing invocation"
                                );
                                invocation.command.execute(&self.control);
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                tracing::warn!("Dropped {} invocations", skipped);
                            }
                            Err(RecvError::Closed) => break Ok(()),
                        },
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                tracing::info!("Shutdown requested");
                                break Ok(());
                            }
                        }
                        _ = &mut ctrl_c => {
                            tracing::info!("Interrupted");
                            break Ok(());
                        }
                        joined = &mut listener_task => {
                            listener_done = true;
                            break Err(listener_failure(joined));
                        }
                    }
                }
            }
        };

        self.listener.stop();
        if !listener_done
            && tokio::time::timeout(LISTENER_STOP_TIMEOUT, &mut listener_task)
                .await
                .is_err()
        {
            listener_task.abort();
        }

        self.provider.shutdown().await;
        result
    }
}

/// Error for a listener task that ended while the agent still needed it.
fn listener_failure(joined: std::result::Result<Result<()>, JoinError>) -> CohortError {
    match joined {
        Ok(Ok(())) => CohortError::Internal("Listener stopped unexpectedly".to_string()),
        Ok(Err(e)) => e,
        Err(e) => CohortError::Internal(format!("Listener task failed: {}", e)),
    }
}
