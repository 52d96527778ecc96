use serde::{Deserialize, Serialize};

use gatehouse_core::UserId;

use crate::UserRole;

/// The authenticated identity making a request.
///
/// Immutable once constructed; built only from a verified credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    id: UserId,
    email: String,
    role: UserRole,
}

impl Principal {
    pub fn new(id: UserId, email: impl Into<String>, role: UserRole) -> Self {
        Self {
            id,
            email: email.into(),
            role,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> UserRole {
        self.role
    }
}

/// A user account as returned by a [`crate::PrincipalDirectory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
}

impl UserRecord {
    pub fn to_principal(&self) -> Principal {
        Principal::new(self.id, self.email.clone(), self.role)
    }
}
