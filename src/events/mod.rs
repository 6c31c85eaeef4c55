pub mod publisher;
pub mod types;

// Re-export key types for convenience
pub use publisher::{BroadcasterStats, EventBroadcaster, PublishError, Subscription};
pub use types::{BroadcastEvent, EventType};
