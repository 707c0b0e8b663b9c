//! Testing utilities for code written against [`ClusterProvider`].
//!
//! [`MockClusterProvider`] replays scripted membership snapshots and service
//! lookups and records every broadcast and shutdown, so coordinator logic can
//! be exercised without a running cluster.
//!
//! # Example
//!
//! ```ignore
//! let provider = MockClusterProvider::new()
//!     .with_member_counts([1, 2, 3])
//!     .with_service("DistributedCache", [false, true]);
//!
//! let probe = MembershipProbe::new(Arc::new(provider));
//! ```
//!
//! [`ClusterProvider`]: crate::cluster::ClusterProvider

pub mod mock_cluster;

pub use mock_cluster::{MockClusterProvider, RecordedBroadcast};
