mod command;
mod member;
mod traits;

pub use command::{Invocation, MemberCapabilities, RemoteCommand};
pub use member::{MemberId, MemberInfo, MemberRole, MemberStatus};
pub use traits::{ClusterProvider, ServiceHandle};
