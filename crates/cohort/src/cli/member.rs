use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use console::style;

use cohort_core::cluster::ClusterProvider;
use cohort_core::config::CohortConfig;
use cohort_runtime::{Database, MemberAgent};

/// Run a cluster member until told to stop.
#[derive(Parser)]
pub struct MemberCommand {
    /// Service to advertise. Repeatable; defaults to `member.services`.
    #[arg(short, long = "service")]
    pub services: Vec<String>,
}

impl MemberCommand {
    pub async fn execute(self, config: &CohortConfig) -> Result<ExitCode> {
        let services = if self.services.is_empty() {
            config.member.services.clone()
        } else {
            self.services
        };

        let db = Database::from_config(&config.database).await?;
        let agent = MemberAgent::start(db, config.cluster.clone(), services).await?;

        println!(
            "  {} Member {} joined cluster {}",
            style("✓").green(),
            style(agent.provider().local_member().id).cyan(),
            style(&config.cluster.name).cyan()
        );

        agent.run().await?;

        println!("  {} Member stopped", style("✓").green());
        Ok(ExitCode::SUCCESS)
    }
}
