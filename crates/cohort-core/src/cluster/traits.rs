use std::future::Future;
use std::pin::Pin;

use uuid::Uuid;

use super::command::RemoteCommand;
use super::member::{MemberId, MemberInfo};
use crate::error::Result;

/// A resolved, reachable service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    /// Service name.
    pub name: String,
    /// Live members currently advertising the service.
    pub members: Vec<MemberId>,
}

impl ServiceHandle {
    pub fn new(name: impl Into<String>, members: Vec<MemberId>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }
}

/// Access to a running cluster.
///
/// Coordinator components hold this as `Arc<dyn ClusterProvider>` so that a
/// real cluster and a test double are interchangeable.
pub trait ClusterProvider: Send + Sync {
    /// The member this process joined as.
    fn local_member(&self) -> &MemberInfo;

    /// Enumerate the current live members, including the local one.
    fn members(&self) -> Pin<Box<dyn Future<Output = Result<Vec<MemberInfo>>> + Send + '_>>;

    /// Look up a service by name.
    ///
    /// A service nobody advertises yields `CohortError::ServiceNotFound`.
    fn resolve_service<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ServiceHandle>> + Send + 'a>>;

    /// Send `command` to `targets` through `service` in one call.
    ///
    /// Returns the invocation id once the transport accepted the send. Nothing
    /// is known about remote execution.
    fn broadcast<'a>(
        &'a self,
        service: &'a ServiceHandle,
        command: &'a RemoteCommand,
        targets: &'a [MemberId],
    ) -> Pin<Box<dyn Future<Output = Result<Uuid>> + Send + 'a>>;

    /// Leave the cluster and release the connection. Safe to call twice.
    fn shutdown(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
