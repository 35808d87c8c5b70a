//! Instance group roles.
//!
//! The role is the only key hooks are filtered by. A hook without roles is
//! universal; otherwise it applies to exactly the roles it lists.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(alias = "ControlPlane")]
    Master,
    Node,
    Bastion,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Master => "Master",
            Role::Node => "Node",
            Role::Bastion => "Bastion",
        }
    }

    /// Bastions are bare jump hosts and never run nodeup.
    pub fn runs_nodeup(self) -> bool {
        match self {
            Role::Master | Role::Node => true,
            Role::Bastion => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True when something scoped to `roles` applies to `target`.
pub fn applies(roles: &[Role], target: Role) -> bool {
    roles.is_empty() || roles.contains(&target)
}
