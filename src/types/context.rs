//! Request-scoped caller identity

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Who is asking. Passed explicitly into every store call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub user_id: String,
    pub role: Role,
}

impl RequestContext {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::User,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this caller may see or write records owned by `owner`.
    pub fn can_access(&self, owner: &str) -> bool {
        self.is_admin() || self.user_id == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_rules() {
        let alice = RequestContext::user("alice");
        let admin = RequestContext::admin("root");

        assert!(alice.can_access("alice"));
        assert!(!alice.can_access("bob"));
        assert!(admin.can_access("bob"));
        assert!(admin.is_admin());
        assert!(!alice.is_admin());
    }
}
