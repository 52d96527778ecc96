use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use gatehouse_auth::{
    DirectoryError, MembershipRecord, MembershipRole, MembershipStore, PrincipalDirectory,
    UserRecord, UserRole,
};
use gatehouse_core::{TenantId, UserId};

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, UserRecord>,
    /// Insertion order; "first admin" means first inserted.
    user_order: Vec<UserId>,
    workspaces: HashMap<TenantId, String>,
    memberships: HashMap<(UserId, TenantId), MembershipRole>,
}

/// In-memory user/workspace/membership directory.
///
/// Intended for tests/dev. The `(user, workspace)` key of the membership map
/// plays the role of the uniqueness constraint a real store carries.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: RwLock<State>,
    failing: AtomicBool,
    membership_lookups: AtomicUsize,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user. Emails are stored lower-cased.
    pub fn insert_user(&self, mut user: UserRecord) -> Result<(), DirectoryError> {
        user.email = user.email.to_lowercase();
        let mut state = self.write()?;
        if state.users.insert(user.id, user.clone()).is_none() {
            state.user_order.push(user.id);
        }
        Ok(())
    }

    pub fn insert_workspace(
        &self,
        id: TenantId,
        name: impl Into<String>,
    ) -> Result<(), DirectoryError> {
        self.write()?.workspaces.insert(id, name.into());
        Ok(())
    }

    /// Rejects a second membership for the same pair.
    pub fn add_membership(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
        role: MembershipRole,
    ) -> Result<(), DirectoryError> {
        let mut state = self.write()?;
        if state.memberships.contains_key(&(user_id, tenant_id)) {
            return Err(DirectoryError::DuplicateMembership { user_id, tenant_id });
        }
        state.memberships.insert((user_id, tenant_id), role);
        Ok(())
    }

    /// While set, every lookup fails with [`DirectoryError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `find_membership` calls served so far.
    pub fn membership_lookups(&self) -> usize {
        self.membership_lookups.load(Ordering::SeqCst)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, DirectoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("in-memory directory offline".to_string()));
        }
        self.state
            .read()
            .map_err(|_| DirectoryError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, DirectoryError> {
        self.state
            .write()
            .map_err(|_| DirectoryError::Unavailable("lock poisoned".to_string()))
    }
}

#[async_trait]
impl PrincipalDirectory for InMemoryDirectory {
    async fn find_principal_by_id(&self, id: UserId) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_principal_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        let email = email.to_lowercase();
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_first_active_admin(&self) -> Result<Option<UserRecord>, DirectoryError> {
        let state = self.read()?;
        Ok(state
            .user_order
            .iter()
            .filter_map(|id| state.users.get(id))
            .find(|u| u.is_active && u.role == UserRole::Admin)
            .cloned())
    }
}

#[async_trait]
impl MembershipStore for InMemoryDirectory {
    async fn find_membership(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
    ) -> Result<Option<MembershipRole>, DirectoryError> {
        self.membership_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.read()?.memberships.get(&(user_id, tenant_id)).copied())
    }

    async fn list_memberships(
        &self,
        user_id: UserId,
    ) -> Result<Vec<MembershipRecord>, DirectoryError> {
        let state = self.read()?;
        let mut out = Vec::new();
        for ((member, workspace_id), role) in &state.memberships {
            if *member != user_id {
                continue;
            }
            let workspace_name = state.workspaces.get(workspace_id).cloned().ok_or_else(|| {
                DirectoryError::Corrupt(format!(
                    "membership references unknown workspace {workspace_id}"
                ))
            })?;
            out.push(MembershipRecord {
                workspace_id: *workspace_id,
                workspace_name,
                role: *role,
            });
        }
        out.sort_by(|a, b| {
            a.workspace_name
                .cmp(&b.workspace_name)
                .then_with(|| a.workspace_id.as_uuid().cmp(b.workspace_id.as_uuid()))
        });
        Ok(out)
    }
}
