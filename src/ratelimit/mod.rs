//! Rate limiting logic and state management.

mod counter;
mod identity;
mod reclaim;
mod store;

pub use counter::{Decision, WindowCounter};
pub use identity::ClientIdentity;
pub use reclaim::ReclaimTask;
pub use store::{LimitConfig, WindowCounterStore};
