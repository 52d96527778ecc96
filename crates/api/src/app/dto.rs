use serde::Serialize;

use gatehouse_auth::{MembershipRecord, MembershipRole, UserRecord, UserRole};
use gatehouse_core::{TenantId, UserId};

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: UserId,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipDto {
    pub workspace_id: TenantId,
    pub workspace_name: String,
    pub role: MembershipRole,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserDto,
    pub memberships: Vec<MembershipDto>,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceListItem {
    pub id: TenantId,
    pub name: String,
    pub role: MembershipRole,
}

// -------------------------
// Mapping helpers
// -------------------------

impl From<&UserRecord> for UserDto {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

impl From<MembershipRecord> for MembershipDto {
    fn from(m: MembershipRecord) -> Self {
        Self {
            workspace_id: m.workspace_id,
            workspace_name: m.workspace_name,
            role: m.role,
        }
    }
}

impl From<MembershipRecord> for WorkspaceListItem {
    fn from(m: MembershipRecord) -> Self {
        Self {
            id: m.workspace_id,
            name: m.workspace_name,
            role: m.role,
        }
    }
}
