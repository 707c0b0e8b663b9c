pub mod cluster;
pub mod control;
pub mod db;

pub use cluster::{InvocationListener, MemberAgent, PgClusterProvider, ProcessControl};
pub use control::{
    ConvergencePoller, FanoutInvoker, FanoutReceipt, MembershipProbe, PollOutcome,
    ShutdownConfig, ShutdownCoordinator, ShutdownReport,
};
pub use db::Database;
