//! Postgres-backed directory.
//!
//! Reads the `users`, `workspaces` and `memberships` tables. Nothing here
//! writes; schema and seed data are owned by the migration tooling.
//!
//! ## Required schema invariants
//!
//! - `users.email` is unique and compared lower-cased.
//! - `memberships` carries `UNIQUE (user_id, workspace_id)`. The tenant check
//!   is a single point lookup on that index and relies on at most one row per
//!   pair; without the constraint the lookup result is not well defined.
//!
//! ## Error Mapping
//!
//! | SQLx Error | DirectoryError |
//! |------------|----------------|
//! | Database, code `23505` (unique violation) | `Corrupt` |
//! | Database (other) | `Unavailable` |
//! | PoolClosed / Io / Tls / timeouts | `Unavailable` |
//! | Decode / ColumnNotFound | `Corrupt` |

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;
use uuid::Uuid;

use gatehouse_auth::{
    DirectoryError, MembershipRecord, MembershipRole, MembershipStore, PrincipalDirectory,
    UserRecord,
};
use gatehouse_core::{TenantId, UserId};

#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: Arc<PgPool>,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect lazily; the first query opens the connection.
    pub fn connect_lazy(url: &str) -> Result<Self, DirectoryError> {
        let pool = PgPool::connect_lazy(url).map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl PrincipalDirectory for PgDirectory {
    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_principal_by_id(&self, id: UserId) -> Result<Option<UserRecord>, DirectoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, role, is_active
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_principal_by_id", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self, email), err)]
    async fn find_principal_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, role, is_active
            FROM users
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_principal_by_email", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_first_active_admin(&self) -> Result<Option<UserRecord>, DirectoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, role, is_active
            FROM users
            WHERE role = 'ADMIN' AND is_active = true
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_first_active_admin", e))?;

        row.as_ref().map(user_from_row).transpose()
    }
}

#[async_trait]
impl MembershipStore for PgDirectory {
    #[instrument(skip(self), fields(user_id = %user_id, tenant_id = %tenant_id), err)]
    async fn find_membership(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
    ) -> Result<Option<MembershipRole>, DirectoryError> {
        let row = sqlx::query(
            r#"
            SELECT role
            FROM memberships
            WHERE user_id = $1 AND workspace_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(tenant_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_membership", e))?;

        row.as_ref()
            .map(|r| {
                let role: String = r
                    .try_get("role")
                    .map_err(|e| map_sqlx_error("find_membership", e))?;
                parse_membership_role(&role)
            })
            .transpose()
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn list_memberships(
        &self,
        user_id: UserId,
    ) -> Result<Vec<MembershipRecord>, DirectoryError> {
        let rows = sqlx::query(
            r#"
            SELECT w.id AS workspace_id, w.name AS workspace_name, m.role
            FROM memberships m
            JOIN workspaces w ON w.id = m.workspace_id
            WHERE m.user_id = $1
            ORDER BY w.name ASC, w.id ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_memberships", e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let workspace_id: Uuid = row
                .try_get("workspace_id")
                .map_err(|e| map_sqlx_error("list_memberships", e))?;
            let workspace_name: String = row
                .try_get("workspace_name")
                .map_err(|e| map_sqlx_error("list_memberships", e))?;
            let role: String = row
                .try_get("role")
                .map_err(|e| map_sqlx_error("list_memberships", e))?;
            out.push(MembershipRecord {
                workspace_id: TenantId::from_uuid(workspace_id),
                workspace_name,
                role: parse_membership_role(&role)?,
            });
        }
        Ok(out)
    }
}

fn user_from_row(row: &PgRow) -> Result<UserRecord, DirectoryError> {
    let id: Uuid = row.try_get("id").map_err(|e| map_sqlx_error("decode user", e))?;
    let email: String = row.try_get("email").map_err(|e| map_sqlx_error("decode user", e))?;
    let role: String = row.try_get("role").map_err(|e| map_sqlx_error("decode user", e))?;
    let is_active: bool = row
        .try_get("is_active")
        .map_err(|e| map_sqlx_error("decode user", e))?;

    Ok(UserRecord {
        id: UserId::from_uuid(id),
        email,
        role: role
            .parse()
            .map_err(|e| DirectoryError::Corrupt(format!("users.role: {e}")))?,
        is_active,
    })
}

fn parse_membership_role(raw: &str) -> Result<MembershipRole, DirectoryError> {
    raw.parse()
        .map_err(|e| DirectoryError::Corrupt(format!("memberships.role: {e}")))
}

/// Map SQLx errors to DirectoryError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DirectoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation on a read path means the schema is off.
                Some("23505") => DirectoryError::Corrupt(msg),
                _ => DirectoryError::Unavailable(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_) => {
            DirectoryError::Corrupt(format!("failed to decode row in {}: {}", operation, err))
        }
        sqlx::Error::PoolClosed => {
            DirectoryError::Unavailable(format!("connection pool closed in {}", operation))
        }
        _ => DirectoryError::Unavailable(format!("sqlx error in {}: {}", operation, err)),
    }
}
