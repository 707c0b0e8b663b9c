use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use chrono::Utc;
use uuid::Uuid;

use crate::cluster::{
    ClusterProvider, MemberId, MemberInfo, MemberRole, MemberStatus, RemoteCommand, ServiceHandle,
};
use crate::error::{CohortError, Result};

/// Record of a broadcast accepted by the mock.
#[derive(Debug, Clone)]
pub struct RecordedBroadcast {
    pub id: Uuid,
    pub service: String,
    pub command: RemoteCommand,
    pub targets: Vec<MemberId>,
}

/// One scripted answer to `members()`.
#[derive(Debug, Clone)]
enum MembersStep {
    Count(usize),
    Fault(String),
}

/// Scripted cluster double.
///
/// Every call to `members()` consumes the next scripted step; once the
/// script runs out the last step repeats. Service lookups work the same way,
/// per service name. A service with no script is never found.
pub struct MockClusterProvider {
    local: MemberInfo,
    remote_ids: Mutex<Vec<MemberId>>,
    member_script: Mutex<VecDeque<MembersStep>>,
    last_members: Mutex<MembersStep>,
    service_scripts: Mutex<HashMap<String, (VecDeque<bool>, bool)>>,
    broadcast_fault: Mutex<Option<String>>,
    broadcasts: RwLock<Vec<RecordedBroadcast>>,
    members_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
    shutdown_calls: AtomicUsize,
}

impl MockClusterProvider {
    /// A cluster containing only the local (control) member.
    pub fn new() -> Self {
        Self {
            local: MemberInfo::new_local("mock-control".to_string(), MemberRole::Control, vec![]),
            remote_ids: Mutex::new(Vec::new()),
            member_script: Mutex::new(VecDeque::new()),
            last_members: Mutex::new(MembersStep::Count(1)),
            service_scripts: Mutex::new(HashMap::new()),
            broadcast_fault: Mutex::new(None),
            broadcasts: RwLock::new(Vec::new()),
            members_calls: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
            shutdown_calls: AtomicUsize::new(0),
        }
    }

    /// Script successive member counts (the local member included).
    pub fn with_member_counts(self, counts: impl IntoIterator<Item = usize>) -> Self {
        self.member_script
            .lock()
            .unwrap()
            .extend(counts.into_iter().map(MembersStep::Count));
        self
    }

    /// Append a one-shot enumeration fault to the member script.
    pub fn with_members_fault(self, message: impl Into<String>) -> Self {
        self.member_script
            .lock()
            .unwrap()
            .push_back(MembersStep::Fault(message.into()));
        self
    }

    /// Script successive lookup results for a service.
    pub fn with_service(self, name: &str, found: impl IntoIterator<Item = bool>) -> Self {
        let found: VecDeque<bool> = found.into_iter().collect();
        let last = found.back().copied().unwrap_or(false);
        self.service_scripts
            .lock()
            .unwrap()
            .insert(name.to_string(), (found, last));
        self
    }

    /// Make every broadcast fail with a transport fault.
    pub fn with_broadcast_fault(self, message: impl Into<String>) -> Self {
        *self.broadcast_fault.lock().unwrap() = Some(message.into());
        self
    }

    /// ID of the local member.
    pub fn local_id(&self) -> MemberId {
        self.local.id
    }

    /// All broadcasts accepted so far.
    pub fn broadcasts(&self) -> Vec<RecordedBroadcast> {
        self.broadcasts.read().unwrap().clone()
    }

    /// Number of `members()` calls.
    pub fn members_calls(&self) -> usize {
        self.members_calls.load(Ordering::SeqCst)
    }

    /// Number of `resolve_service()` calls.
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    /// Number of `shutdown()` calls.
    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }

    /// Assert that a specific number of broadcasts were sent.
    pub fn assert_broadcast_count(&self, expected: usize) {
        let count = self.broadcasts.read().unwrap().len();
        assert_eq!(
            count, expected,
            "Expected {} broadcasts, but found {}",
            expected, count
        );
    }

    /// Assert that no broadcast ever addressed the local member.
    pub fn assert_local_never_targeted(&self) {
        let local = self.local.id;
        let broadcasts = self.broadcasts.read().unwrap();
        assert!(
            broadcasts.iter().all(|b| !b.targets.contains(&local)),
            "Local member {} was targeted by a broadcast",
            local
        );
    }

    /// Assert that the provider was shut down exactly once.
    pub fn assert_shutdown_once(&self) {
        let calls = self.shutdown_calls();
        assert_eq!(calls, 1, "Expected exactly one shutdown, found {}", calls);
    }

    fn next_members_step(&self) -> MembersStep {
        let mut script = self.member_script.lock().unwrap();
        let mut last = self.last_members.lock().unwrap();
        if let Some(step) = script.pop_front() {
            // Faults are one-shot; only counts become the repeating tail.
            if let MembersStep::Count(_) = step {
                *last = step.clone();
            }
            step
        } else {
            last.clone()
        }
    }

    fn snapshot(&self, count: usize) -> Vec<MemberInfo> {
        let mut remote_ids = self.remote_ids.lock().unwrap();
        let others = count.saturating_sub(1);
        while remote_ids.len() < others {
            remote_ids.push(MemberId::new());
        }

        let mut members = Vec::with_capacity(count);
        if count > 0 {
            members.push(self.local.clone());
        }
        for id in remote_ids.iter().take(others) {
            members.push(MemberInfo {
                id: *id,
                hostname: "mock-member".to_string(),
                pid: 0,
                role: MemberRole::Member,
                services: vec![],
                status: MemberStatus::Active,
                started_at: Utc::now(),
                last_heartbeat: Utc::now(),
            });
        }
        members
    }

    fn lookup(&self, name: &str) -> bool {
        let mut scripts = self.service_scripts.lock().unwrap();
        match scripts.get_mut(name) {
            Some((script, last)) => match script.pop_front() {
                Some(found) => {
                    *last = found;
                    found
                }
                None => *last,
            },
            None => false,
        }
    }
}

impl Default for MockClusterProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterProvider for MockClusterProvider {
    fn local_member(&self) -> &MemberInfo {
        &self.local
    }

    fn members(&self) -> Pin<Box<dyn Future<Output = Result<Vec<MemberInfo>>> + Send + '_>> {
        self.members_calls.fetch_add(1, Ordering::SeqCst);
        let result = match self.next_members_step() {
            MembersStep::Count(count) => Ok(self.snapshot(count)),
            MembersStep::Fault(message) => Err(CohortError::Cluster(message)),
        };
        Box::pin(async move { result })
    }

    fn resolve_service<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ServiceHandle>> + Send + 'a>> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.lookup(name) {
            Ok(ServiceHandle::new(name, vec![]))
        } else {
            Err(CohortError::ServiceNotFound(name.to_string()))
        };
        Box::pin(async move { result })
    }

    fn broadcast<'a>(
        &'a self,
        service: &'a ServiceHandle,
        command: &'a RemoteCommand,
        targets: &'a [MemberId],
    ) -> Pin<Box<dyn Future<Output = Result<Uuid>> + Send + 'a>> {
        let result = match self.broadcast_fault.lock().unwrap().clone() {
            Some(message) => Err(CohortError::Cluster(message)),
            None => {
                let id = Uuid::new_v4();
                self.broadcasts.write().unwrap().push(RecordedBroadcast {
                    id,
                    service: service.name.clone(),
                    command: *command,
                    targets: targets.to_vec(),
                });
                Ok(id)
            }
        };
        Box::pin(async move { result })
    }

    fn shutdown(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_member_script_repeats_last_count() {
        let provider = MockClusterProvider::new().with_member_counts([1, 3]);

        assert_eq!(provider.members().await.unwrap().len(), 1);
        assert_eq!(provider.members().await.unwrap().len(), 3);
        assert_eq!(provider.members().await.unwrap().len(), 3);
        assert_eq!(provider.members_calls(), 3);
    }

    #[tokio::test]
    async fn test_snapshot_contains_local_member_and_stable_ids() {
        let provider = MockClusterProvider::new().with_member_counts([3, 3]);

        let first = provider.members().await.unwrap();
        let second = provider.members().await.unwrap();
        assert_eq!(first[0].id, provider.local_id());
        let ids = |m: &[MemberInfo]| m.iter().map(|i| i.id).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[tokio::test]
    async fn test_members_fault_is_one_shot() {
        let provider = MockClusterProvider::new()
            .with_member_counts([2])
            .with_members_fault("connection reset");

        assert!(provider.members().await.is_ok());
        assert!(matches!(
            provider.members().await,
            Err(CohortError::Cluster(_))
        ));
        assert_eq!(provider.members().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_service_script() {
        let provider = MockClusterProvider::new().with_service("cache", [false, true]);

        assert!(provider.resolve_service("cache").await.is_err());
        assert!(provider.resolve_service("cache").await.is_ok());
        assert!(provider.resolve_service("cache").await.is_ok());
        let err = provider.resolve_service("other").await.unwrap_err();
        assert!(err.is_service_not_found());
    }

    #[tokio::test]
    async fn test_records_broadcasts_and_shutdowns() {
        let provider = MockClusterProvider::new();
        let handle = ServiceHandle::new("InvocationService", vec![]);
        let target = MemberId::new();
        let command = RemoteCommand::TerminateSelf { delay_ms: 10 };

        provider.broadcast(&handle, &command, &[target]).await.unwrap();
        provider.shutdown().await;

        provider.assert_broadcast_count(1);
        provider.assert_local_never_targeted();
        provider.assert_shutdown_once();
        assert_eq!(provider.broadcasts()[0].targets, vec![target]);
    }

    #[test]
    fn test_unscripted_provider_is_lone_member() {
        let provider = MockClusterProvider::new();

        let members = tokio_test::block_on(provider.members()).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, provider.local_id());
        tokio_test::assert_err!(tokio_test::block_on(provider.resolve_service("cache")));
    }

    #[tokio::test]
    async fn test_broadcast_fault() {
        let provider = MockClusterProvider::new().with_broadcast_fault("channel closed");
        let handle = ServiceHandle::new("InvocationService", vec![]);
        let command = RemoteCommand::TerminateSelf { delay_ms: 10 };

        assert!(provider.broadcast(&handle, &command, &[]).await.is_err());
        provider.assert_broadcast_count(0);
    }
}
