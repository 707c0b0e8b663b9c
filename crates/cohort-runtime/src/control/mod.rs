//! Cluster control: probing membership, fanning out commands, waiting for
//! convergence and stopping the cluster.
//!
//! Everything here is written against `Arc<dyn ClusterProvider>` and runs
//! sequentially on the caller's task.

mod fanout;
mod poller;
mod probe;
mod shutdown;

pub use fanout::{target_set, FanoutInvoker, FanoutReceipt};
pub use poller::{ConvergencePoller, PollOutcome};
pub use probe::MembershipProbe;
pub use shutdown::{ShutdownConfig, ShutdownCoordinator, ShutdownReport};
