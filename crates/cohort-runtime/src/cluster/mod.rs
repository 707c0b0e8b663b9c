mod agent;
mod heartbeat;
mod listener;
mod provider;
mod registry;

pub use agent::{MemberAgent, ProcessControl};
pub use heartbeat::HeartbeatLoop;
pub use listener::InvocationListener;
pub use provider::{encode_invocation, PgClusterProvider, MAX_NOTIFY_PAYLOAD};
pub use registry::MemberRegistry;
