//! Read-only collaborator contracts.
//!
//! The authorization pipeline never owns user or membership data; it consumes
//! it through these narrow lookups. Every method is expected to be a single
//! indexed point lookup (or, for listings, a single indexed range scan).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gatehouse_core::{TenantId, UserId};

use crate::{MembershipRole, UserRecord};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    #[error("duplicate membership for user {user_id} in workspace {tenant_id}")]
    DuplicateMembership { user_id: UserId, tenant_id: TenantId },

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// One of a user's workspace memberships, with the workspace's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub workspace_id: TenantId,
    pub workspace_name: String,
    pub role: MembershipRole,
}

/// Lookup of user accounts.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    async fn find_principal_by_id(&self, id: UserId) -> Result<Option<UserRecord>, DirectoryError>;

    /// Emails are matched case-insensitively.
    async fn find_principal_by_email(&self, email: &str)
    -> Result<Option<UserRecord>, DirectoryError>;

    /// The first (oldest) active account holding the `ADMIN` role.
    async fn find_first_active_admin(&self) -> Result<Option<UserRecord>, DirectoryError>;
}

/// Lookup of (user, workspace) memberships.
///
/// Implementations must be backed by a uniqueness constraint on
/// `(user_id, workspace_id)`: at most one membership exists per pair, and
/// `find_membership` is the sole source of truth for tenant access.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn find_membership(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
    ) -> Result<Option<MembershipRole>, DirectoryError>;

    async fn list_memberships(&self, user_id: UserId)
    -> Result<Vec<MembershipRecord>, DirectoryError>;
}
