use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::member::MemberId;
use crate::error::{CohortError, Result};

/// A unit of work shipped to remote members.
///
/// The set of commands is closed. Each variant travels as data with a
/// `kind` tag and is executed on the receiving side by [`RemoteCommand::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteCommand {
    /// Terminate the receiving process once `delay_ms` has elapsed.
    TerminateSelf { delay_ms: u64 },
}

impl RemoteCommand {
    /// Build a terminate command with the given grace delay.
    pub fn terminate_after(delay: Duration) -> Self {
        Self::TerminateSelf {
            delay_ms: delay.as_millis() as u64,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TerminateSelf { .. } => "terminate_self",
        }
    }

    /// Run the command against the capabilities of the local member.
    pub fn execute(&self, capabilities: &dyn MemberCapabilities) {
        match self {
            Self::TerminateSelf { delay_ms } => {
                capabilities.terminate_after(Duration::from_millis(*delay_ms))
            }
        }
    }
}

/// What a member process can do when told to by a remote command.
pub trait MemberCapabilities: Send + Sync {
    /// Schedule termination of the local process after `delay`.
    ///
    /// Must return immediately; the termination runs on its own task.
    fn terminate_after(&self, delay: Duration);
}

/// Wire envelope for a broadcast command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub id: Uuid,
    /// Service the sender resolved; only members running it act on the command.
    pub service: String,
    pub sender: MemberId,
    pub targets: Vec<MemberId>,
    pub command: RemoteCommand,
    pub sent_at: DateTime<Utc>,
}

impl Invocation {
    pub fn new(
        service: impl Into<String>,
        sender: MemberId,
        targets: Vec<MemberId>,
        command: RemoteCommand,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            service: service.into(),
            sender,
            targets,
            command,
            sent_at: Utc::now(),
        }
    }

    /// Whether `member` is one of the addressed targets.
    pub fn targets_member(&self, member: &MemberId) -> bool {
        self.targets.contains(member)
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| CohortError::Deserialization(e.to_string()))
    }
}
