use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// who is performing an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Option<UserId>,
    pub username: String,
}

impl Actor {
    pub fn user(user_id: UserId, username: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            username: username.into(),
        }
    }

    /// unauthenticated actor, e.g. the repayment scheduler
    pub fn system(name: impl Into<String>) -> Self {
        Self {
            user_id: None,
            username: name.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.user_id.is_none()
    }
}

/// resolves the authenticated actor for the transport layer
pub trait ActorProvider {
    fn current_actor(&self) -> Option<Actor>;

    /// falls back to the system actor when nobody is authenticated
    fn resolve(&self, system_name: &str) -> Actor {
        self.current_actor().unwrap_or_else(|| Actor::system(system_name))
    }
}

/// provider returning a fixed actor
#[derive(Debug, Clone, Default)]
pub struct FixedActor(pub Option<Actor>);

impl ActorProvider for FixedActor {
    fn current_actor(&self) -> Option<Actor> {
        self.0.clone()
    }
}
