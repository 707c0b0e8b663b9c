use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique member identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub Uuid);

impl MemberId {
    /// Generate a new random member ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Member status in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    /// Member is starting up.
    Joining,
    /// Member is healthy and counted in the membership.
    Active,
    /// Member is leaving.
    Leaving,
}

impl MemberStatus {
    /// Convert to string for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Joining => "joining",
            Self::Active => "active",
            Self::Leaving => "leaving",
        }
    }

    /// Parse from string. Unknown values count as leaving.
    pub fn from_str(s: &str) -> Self {
        match s {
            "joining" => Self::Joining,
            "active" => Self::Active,
            _ => Self::Leaving,
        }
    }
}

/// What a process joined the cluster to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRole {
    /// A regular member that runs services and accepts remote commands.
    Member,
    /// A short-lived control process (the `stop`/`ensure` tool itself).
    Control,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Control => "control",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "member" => Some(Self::Member),
            "control" => Some(Self::Control),
            _ => None,
        }
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Information about a member of the cluster.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    /// Unique member ID.
    pub id: MemberId,
    /// Hostname.
    pub hostname: String,
    /// OS process id.
    pub pid: u32,
    /// Why this process joined.
    pub role: MemberRole,
    /// Services this member advertises.
    pub services: Vec<String>,
    /// Current status.
    pub status: MemberStatus,
    /// When the member started.
    pub started_at: DateTime<Utc>,
    /// Last heartbeat time.
    pub last_heartbeat: DateTime<Utc>,
}

impl MemberInfo {
    /// Create member info for the local process.
    pub fn new_local(hostname: String, role: MemberRole, services: Vec<String>) -> Self {
        Self {
            id: MemberId::new(),
            hostname,
            pid: std::process::id(),
            role,
            services,
            status: MemberStatus::Joining,
            started_at: Utc::now(),
            last_heartbeat: Utc::now(),
        }
    }
}
