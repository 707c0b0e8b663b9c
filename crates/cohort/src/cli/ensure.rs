use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use console::style;

use cohort_core::cluster::ClusterProvider;
use cohort_core::config::CohortConfig;
use cohort_core::control::ConvergenceTarget;
use cohort_runtime::{ConvergencePoller, MembershipProbe, PollOutcome};

use super::join_as_control;

/// Wait until COUNT other members and the required service are up.
#[derive(Parser)]
pub struct EnsureCommand {
    /// Number of members to wait for, not counting this process.
    #[arg(default_value_t = 1)]
    pub count: usize,
}

impl EnsureCommand {
    pub async fn execute(self, config: &CohortConfig) -> Result<ExitCode> {
        let target = ConvergenceTarget::for_other_members(self.count, &config.control)?;
        let provider = join_as_control(config).await?;
        run(provider, target).await
    }
}

/// Poll `provider` until `target` is met, then leave the cluster.
///
/// The provider is shut down exactly once, whatever the outcome.
pub async fn run(
    provider: Arc<dyn ClusterProvider>,
    target: ConvergenceTarget,
) -> Result<ExitCode> {
    let expected = target.expected_members;
    let service = target.required_service.clone();

    let poller = ConvergencePoller::new(MembershipProbe::new(provider.clone()), target);
    let result = poller.run().await;
    provider.shutdown().await;

    match result? {
        PollOutcome::Converged { attempts, last } => {
            println!(
                "  {} Cluster ready: {} member(s) after {} attempt(s)",
                style("✓").green(),
                last.member_count,
                attempts
            );
            Ok(ExitCode::SUCCESS)
        }
        PollOutcome::TimedOut { attempts, last } => {
            println!(
                "  {} Cluster not ready after {} attempt(s): {} of {} member(s), {} {}",
                style("✗").red(),
                attempts,
                last.member_count,
                expected,
                service,
                if last.service_found { "found" } else { "not found" }
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use cohort_core::testing::MockClusterProvider;
    use cohort_core::CohortError;

    use crate::cli::exit_code;

    fn target(others: usize) -> ConvergenceTarget {
        ConvergenceTarget::new(others + 1, "DistributedCache", 5, Duration::from_millis(10))
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_converged_exits_successfully() {
        let provider = Arc::new(
            MockClusterProvider::new()
                .with_member_counts([1, 1, 2, 2])
                .with_service("DistributedCache", [false, true]),
        );

        let code = run(provider.clone(), target(1)).await.unwrap();

        assert_eq!(code, ExitCode::SUCCESS);
        provider.assert_shutdown_once();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_exits_with_failure() {
        let provider = Arc::new(
            MockClusterProvider::new()
                .with_member_counts([1, 2, 3])
                .with_service("DistributedCache", [true]),
        );

        let code = run(provider.clone(), target(3)).await.unwrap();

        assert_eq!(code, ExitCode::FAILURE);
        assert_eq!(provider.members_calls(), 5);
        provider.assert_shutdown_once();
    }

    #[tokio::test(start_paused = true)]
    async fn test_enumeration_fault_exits_with_failure() {
        let provider = Arc::new(
            MockClusterProvider::new()
                .with_member_counts([1])
                .with_members_fault("connection reset"),
        );

        let result = run(provider.clone(), target(1)).await;

        let err = result.as_ref().err().unwrap();
        assert!(matches!(
            err.downcast_ref::<CohortError>(),
            Some(CohortError::Cluster(_))
        ));
        assert_eq!(exit_code(result, true), ExitCode::FAILURE);
        provider.assert_shutdown_once();
    }

    #[tokio::test]
    async fn test_oversized_count_is_rejected_before_joining() {
        let config = CohortConfig::default();
        let cmd = EnsureCommand { count: usize::MAX };

        let err = cmd.execute(&config).await.err().unwrap();
        assert!(matches!(
            err.downcast_ref::<CohortError>(),
            Some(CohortError::InvalidArgument(_))
        ));
    }
}
