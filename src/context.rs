//! Caller context for every core operation.
//!
//! Built by the transport layer from the identity provider's output and
//! trusted verbatim.

use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub restaurant_id: Uuid,
    /// Authenticated staff member; `None` for public or system callers
    pub actor: Option<Uuid>,
    /// Overrides the configured transaction timeout
    pub deadline: Option<Duration>,
}

impl RequestContext {
    pub fn staff(restaurant_id: Uuid, actor: Uuid) -> Self {
        Self {
            restaurant_id,
            actor: Some(actor),
            deadline: None,
        }
    }

    pub fn public(restaurant_id: Uuid) -> Self {
        Self {
            restaurant_id,
            actor: None,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let restaurant_id = Uuid::new_v4();
        let actor = Uuid::new_v4();

        let staff = RequestContext::staff(restaurant_id, actor);
        assert_eq!(staff.actor, Some(actor));
        assert_eq!(staff.deadline, None);

        let public = RequestContext::public(restaurant_id).with_deadline(Duration::from_secs(2));
        assert_eq!(public.actor, None);
        assert_eq!(public.deadline, Some(Duration::from_secs(2)));
    }
}
