// C3 + C6: translation config store and translator (spec §4.4).

mod cache;

pub use cache::{CacheFingerprint, TranslationCache};

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::model::{ConfigSchema, ExternalClaims, GroupMapping, RoleMapping, TranslationConfigVersion, TranslationResult};
use crate::store::{RoleStore, TranslationStore};

pub struct Translator {
    store: Arc<dyn TranslationStore>,
    roles: Arc<dyn RoleStore>,
    cache: TranslationCache,
}

impl Translator {
    pub fn new(store: Arc<dyn TranslationStore>, roles: Arc<dyn RoleStore>, cache_max_entries: usize, cache_ttl_secs: u64) -> Self {
        Self { store, roles, cache: TranslationCache::new(cache_max_entries, cache_ttl_secs) }
    }

    pub async fn upload(&self, config_schema: ConfigSchema, created_by: String, comment: Option<String>) -> Result<TranslationConfigVersion> {
        self.store.upload(config_schema, created_by, comment).await
    }

    /// Validates a candidate config schema without persisting it. A schema
    /// is valid if every role/group it references can be resolved — an
    /// unknown name isn't an error (it simply contributes no permissions),
    /// but an empty schema is rejected as likely a mistake.
    pub fn validate(&self, config_schema: &ConfigSchema) -> Result<()> {
        if config_schema.role_rules.is_empty() && config_schema.group_rules.is_empty() {
            return Err(crate::error::GatewayError::InvalidInput("translation config has no mapping rules".into()));
        }
        Ok(())
    }

    /// Activates `version_id` and invalidates the cache in full (spec
    /// §4.4 Activation).
    pub async fn activate(&self, version_id: &str) -> Result<()> {
        self.store.set_active(version_id).await?;
        self.cache.invalidate_all();
        Ok(())
    }

    /// Rolls back to a prior version number, reusing `activate` so the
    /// cache invalidation happens identically (spec §4.4 `rollback`).
    pub async fn rollback(&self, version_number: u64) -> Result<TranslationConfigVersion> {
        let target = self
            .store
            .find_by_version(version_number)
            .await?
            .ok_or_else(|| crate::error::GatewayError::NotFound(format!("translation config version {version_number}")))?;
        self.activate(&target.id).await?;
        Ok(target)
    }

    pub async fn delete(&self, version_id: &str) -> Result<()> {
        self.store.delete(version_id).await
    }

    pub async fn list(&self) -> Result<Vec<TranslationConfigVersion>> {
        self.store.list().await
    }

    pub async fn get_active(&self) -> Result<Option<TranslationConfigVersion>> {
        self.store.get_active().await
    }

    pub async fn find_by_version(&self, version: u64) -> Result<Option<TranslationConfigVersion>> {
        self.store.find_by_version(version).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<TranslationConfigVersion>> {
        self.store.find_by_id(id).await
    }

    pub fn cache_invalidate(&self) {
        self.cache.invalidate_all();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// `translate(issuer, subject, claims) -> {roles, permissions}` against
    /// the active config (spec §4.4). Pure with respect to the active
    /// config, so cacheable; cache hits and misses produce identical
    /// results (spec §8 property 4).
    pub async fn translate(&self, external: &ExternalClaims) -> Result<TranslationResult> {
        let active = self
            .store
            .get_active()
            .await?
            .ok_or_else(|| crate::error::GatewayError::Unavailable("no active translation config".into()))?;

        let fingerprint = CacheFingerprint::compute(&active.id, &external.issuer, &external.subject, &external.claims);
        if let Some(cached) = self.cache.get(&fingerprint) {
            debug!(issuer = %external.issuer, "translation cache hit");
            return Ok(cached);
        }

        let result = self.evaluate(&active.config_schema, external).await?;
        self.cache.put(fingerprint, result.clone());
        Ok(result)
    }

    /// Preview what a candidate config (or, if omitted, the active one)
    /// would produce for the given claims, without activating it or
    /// touching the cache (spec §4.4 `test`).
    pub async fn test(&self, external: &ExternalClaims, ad_hoc_config: Option<&ConfigSchema>) -> Result<TranslationResult> {
        match ad_hoc_config {
            Some(schema) => self.evaluate(schema, external).await,
            None => {
                let active = self.store.get_active().await?.ok_or_else(|| crate::error::GatewayError::Unavailable("no active translation config".into()))?;
                self.evaluate(&active.config_schema, external).await
            }
        }
    }

    async fn evaluate(&self, schema: &ConfigSchema, external: &ExternalClaims) -> Result<TranslationResult> {
        let mut role_names = HashSet::new();
        let mut group_names = HashSet::new();
        for rule in &schema.role_rules {
            if external.claims.get(&rule.claim_key).is_some_and(|values| values.contains(&rule.claim_value)) {
                role_names.extend(rule.grants.iter().cloned());
            }
        }
        for rule in &schema.group_rules {
            if external.claims.get(&rule.claim_key).is_some_and(|values| values.contains(&rule.claim_value)) {
                group_names.extend(rule.grants.iter().cloned());
            }
        }

        let role_mapping = RoleMapping::from_roles(self.roles.all_roles().await?);
        let group_mapping = GroupMapping::from_groups(self.roles.all_groups().await?);
        let mut permissions = role_mapping.expand(&role_names);
        permissions.extend(group_mapping.expand(&group_names));

        Ok(TranslationResult { roles: role_names.into_iter().collect(), permissions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MappingRule, Role};
    use crate::store::{InMemoryRoleStore, InMemoryTranslationStore};
    use std::collections::HashMap;

    async fn fixture() -> (Translator, Arc<InMemoryTranslationStore>) {
        let store = InMemoryTranslationStore::new();
        let roles = InMemoryRoleStore::new();
        roles.put_role(Role { id: "admin".into(), display_name: None, description: None, permissions: ["payments.admin".to_string()].into() }).await.unwrap();
        let translator = Translator::new(store.clone(), roles, 100, 300);
        (translator, store)
    }

    fn claims(groups: &[&str]) -> ExternalClaims {
        let mut claims = HashMap::new();
        claims.insert("groups".to_string(), groups.iter().map(|s| s.to_string()).collect());
        ExternalClaims { issuer: "idp".into(), subject: "alice".into(), claims }
    }

    #[tokio::test]
    async fn cache_hit_and_miss_agree() {
        let (translator, store) = fixture().await;
        let schema = ConfigSchema { role_rules: vec![MappingRule { claim_key: "groups".into(), claim_value: "admin".into(), grants: vec!["admin".into()] }], group_rules: vec![] };
        let v1 = store.upload(schema, "tester".into(), None).await.unwrap();
        store.set_active(&v1.id).await.unwrap();

        let input = claims(&["admin"]);
        let miss = translator.translate(&input).await.unwrap();
        let hit = translator.translate(&input).await.unwrap();
        assert_eq!(miss, hit);
        assert!(miss.permissions.contains("payments.admin"));
    }

    #[tokio::test]
    async fn rollback_changes_future_results_after_cache_invalidation() {
        let (translator, store) = fixture().await;
        let schema_v1 = ConfigSchema { role_rules: vec![MappingRule { claim_key: "groups".into(), claim_value: "admin".into(), grants: vec!["admin".into()] }], group_rules: vec![] };
        let v1 = store.upload(schema_v1, "tester".into(), None).await.unwrap();
        store.set_active(&v1.id).await.unwrap();

        let empty_schema = ConfigSchema::default();
        let v2 = store.upload(empty_schema, "tester".into(), None).await.unwrap();
        store.set_active(&v2.id).await.unwrap();

        let input = claims(&["admin"]);
        let under_v2 = translator.translate(&input).await.unwrap();
        assert!(under_v2.permissions.is_empty());

        translator.rollback(v1.version).await.unwrap();
        let under_v1_again = translator.translate(&input).await.unwrap();
        assert!(under_v1_again.permissions.contains("payments.admin"));
    }
}
