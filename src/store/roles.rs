use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::model::{Group, Role};

/// Backs the role/group definitions the translator maps claims onto and
/// the authorization evaluator expands at request time.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn put_role(&self, role: Role) -> Result<()>;
    async fn put_group(&self, group: Group) -> Result<()>;
    async fn all_roles(&self) -> Result<Vec<Role>>;
    async fn all_groups(&self) -> Result<Vec<Group>>;
}

#[derive(Default)]
pub struct InMemoryRoleStore {
    roles: DashMap<String, Role>,
    groups: DashMap<String, Group>,
}

impl InMemoryRoleStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn put_role(&self, role: Role) -> Result<()> {
        self.roles.insert(role.id.clone(), role);
        Ok(())
    }

    async fn put_group(&self, group: Group) -> Result<()> {
        self.groups.insert(group.id.clone(), group);
        Ok(())
    }

    async fn all_roles(&self) -> Result<Vec<Role>> {
        Ok(self.roles.iter().map(|e| e.value().clone()).collect())
    }

    async fn all_groups(&self) -> Result<Vec<Group>> {
        Ok(self.groups.iter().map(|e| e.value().clone()).collect())
    }
}
