mod ensure;
mod member;
mod stop;

pub use ensure::EnsureCommand;
pub use member::MemberCommand;
pub use stop::StopCommand;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};

use cohort_core::cluster::{ClusterProvider, MemberRole};
use cohort_core::config::CohortConfig;
use cohort_runtime::{Database, PgClusterProvider};

use crate::logging;

/// COHORT - cluster control tool
#[derive(Parser)]
#[command(name = "cohort")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, default_value = "cohort.toml", global = true)]
    pub config: String,

    /// Log level or filter directive (overridden by RUST_LOG).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Tell every other cluster member to terminate.
    Stop(StopCommand),

    /// Wait until COUNT other members and the required service are up.
    Ensure(EnsureCommand),

    /// Run a cluster member until told to stop.
    Member(MemberCommand),
}

impl Commands {
    /// Whether a failed run should end with a nonzero exit code.
    ///
    /// `stop` only logs its failures.
    pub fn fails_on_error(&self) -> bool {
        !matches!(self, Commands::Stop(_))
    }

    async fn run(self, config: &CohortConfig) -> Result<ExitCode> {
        match self {
            Commands::Stop(cmd) => cmd.execute(config).await,
            Commands::Ensure(cmd) => cmd.execute(config).await,
            Commands::Member(cmd) => cmd.execute(config).await,
        }
    }
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> ExitCode {
        dotenvy::dotenv().ok();

        let loaded = CohortConfig::load(&self.config);
        match &loaded {
            Ok(config) => logging::init(self.log_level.as_deref(), &config.logging),
            Err(_) => logging::init(self.log_level.as_deref(), &Default::default()),
        }

        let fails_on_error = self.command.fails_on_error();
        let result = match loaded {
            Ok(config) => self.command.run(&config).await,
            Err(e) => Err(e.into()),
        };

        exit_code(result, fails_on_error)
    }
}

/// Map a command result to the process exit code, logging any failure.
fn exit_code(result: Result<ExitCode>, fails_on_error: bool) -> ExitCode {
    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            if fails_on_error {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}

/// Handle a command line clap rejected.
///
/// Help and version behave as usual. Anything else prints usage to stdout
/// and still exits successfully.
pub fn print_usage(error: clap::Error) -> ExitCode {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
        }
        _ => {
            let _ = Cli::command().print_help();
            println!();
        }
    }
    ExitCode::SUCCESS
}

/// Join the cluster as a control process with no services.
async fn join_as_control(config: &CohortConfig) -> Result<Arc<dyn ClusterProvider>> {
    let db = Database::from_config(&config.database).await?;
    let provider =
        PgClusterProvider::join(db, config.cluster.clone(), MemberRole::Control, vec![]).await?;
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ensure_defaults_to_one_other_member() {
        let cli = Cli::try_parse_from(["cohort", "ensure"]).unwrap();
        match cli.command {
            Commands::Ensure(cmd) => assert_eq!(cmd.count, 1),
            _ => panic!("expected ensure"),
        }
    }

    #[test]
    fn test_ensure_with_count() {
        let cli = Cli::try_parse_from(["cohort", "ensure", "3"]).unwrap();
        match cli.command {
            Commands::Ensure(cmd) => assert_eq!(cmd.count, 3),
            _ => panic!("expected ensure"),
        }
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "cohort",
            "stop",
            "--config",
            "other.toml",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.config, "other.toml");
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Commands::Stop(_)));
    }

    #[test]
    fn test_member_services_repeat() {
        let cli = Cli::try_parse_from([
            "cohort",
            "member",
            "--service",
            "InvocationService",
            "--service",
            "DistributedCache",
        ])
        .unwrap();
        match cli.command {
            Commands::Member(cmd) => {
                assert_eq!(cmd.services, vec!["InvocationService", "DistributedCache"])
            }
            _ => panic!("expected member"),
        }
    }

    #[test]
    fn test_unknown_arguments_are_rejected_by_parser() {
        assert!(Cli::try_parse_from(["cohort", "restart"]).is_err());
        assert!(Cli::try_parse_from(["cohort", "ensure", "many"]).is_err());
        assert!(Cli::try_parse_from(["cohort"]).is_err());
    }

    #[test]
    fn test_only_stop_swallows_failures() {
        let stop = Cli::try_parse_from(["cohort", "stop"]).unwrap();
        let ensure = Cli::try_parse_from(["cohort", "ensure"]).unwrap();
        let member = Cli::try_parse_from(["cohort", "member"]).unwrap();

        assert!(!stop.command.fails_on_error());
        assert!(ensure.command.fails_on_error());
        assert!(member.command.fails_on_error());
    }
}
