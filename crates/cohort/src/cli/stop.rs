use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use console::style;

use cohort_core::cluster::ClusterProvider;
use cohort_core::config::CohortConfig;
use cohort_runtime::{ShutdownConfig, ShutdownCoordinator, ShutdownReport};

use super::join_as_control;

/// Tell every other cluster member to terminate.
#[derive(Parser)]
pub struct StopCommand {}

impl StopCommand {
    pub async fn execute(self, config: &CohortConfig) -> Result<ExitCode> {
        let provider = join_as_control(config).await?;
        run(provider, ShutdownConfig::from(&config.control)).await
    }
}

/// Stop the other members through `provider`, then leave the cluster.
///
/// The provider is shut down exactly once, whatever the outcome.
pub async fn run(provider: Arc<dyn ClusterProvider>, config: ShutdownConfig) -> Result<ExitCode> {
    let coordinator = ShutdownCoordinator::new(provider.clone(), config);
    let result = coordinator.run().await;
    provider.shutdown().await;

    match result? {
        ShutdownReport::AlreadyStopped => {
            println!("  {} Cluster is not running", style("ℹ").blue());
        }
        ShutdownReport::Requested {
            targets,
            residual_members,
            ..
        } => {
            println!(
                "  {} Shutdown requested for {} member(s)",
                style("✓").green(),
                targets
            );
            if let Some(count) = residual_members {
                println!(
                    "  {} {} member(s) still visible, this process included",
                    style("→").dim(),
                    count
                );
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
