//! Core types for the cohort cluster control tool.
//!
//! Holds the cluster data model, the remote command protocol, the
//! `ClusterProvider` seam the coordinator is written against, configuration
//! and the shared error type.

pub mod cluster;
pub mod config;
pub mod control;
pub mod error;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cluster::{
    ClusterProvider, Invocation, MemberCapabilities, MemberId, MemberInfo, MemberRole,
    MemberStatus, RemoteCommand, ServiceHandle,
};
pub use config::CohortConfig;
pub use control::{ConvergenceTarget, ProbeResult};
pub use error::{CohortError, Result};
