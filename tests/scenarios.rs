// Cross-module end-to-end scenarios, one per named scenario in the trust
// plane's operational spec: routine key rotation, emergency key retirement,
// translation config rollback, auth-failure lockout, permission-policy
// enforcement, and optimistic-concurrency service updates.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use trustgate::auth::token::{self, TokenClaims, TokenHeader};
use trustgate::auth::Authenticator;
use trustgate::authz::AuthorizationEvaluator;
use trustgate::config::{KeyPolicyConfig, LockoutConfig, TokenPolicyConfig};
use trustgate::keys::{InMemorySigningKeyStore, KeyManager};
use trustgate::model::{AnyOfPermissions, ConfigSchema, ExternalClaims, MappingRule, PermissionPolicy, ServiceRegistration};
use trustgate::registry::Registry;
use trustgate::revocation::RevocationLockoutGate;
use trustgate::store::{InMemoryCredentialStore, InMemoryRoleStore, InMemoryServiceStore, InMemoryTranslationStore, RoleStore, ServicePatch, ServiceStore, TranslationStore};
use trustgate::translate::Translator;

fn issue_token(claims: TokenClaims, key: &trustgate::model::SigningKey) -> String {
    let header = TokenHeader { alg: key.algorithm, kid: Some(key.key_id.clone()) };
    token::encode(&header, &claims, key).unwrap()
}

fn base_claims(jti: &str) -> TokenClaims {
    let now = chrono::Utc::now().timestamp();
    TokenClaims {
        iss: "idp".into(),
        sub: "alice".into(),
        jti: jti.into(),
        exp: now + 3600,
        nbf: None,
        iat: now,
        permissions: vec!["payments.reader".into()],
        roles: vec![],
        groups: vec![],
        extra: HashMap::new(),
    }
}

/// S1 Routine rotation: a token signed under the active key still verifies
/// after a scheduled rotation promotes a new active key and demotes the old
/// one to deprecated; a freshly issued token uses the new key.
#[tokio::test]
async fn s1_routine_rotation_keeps_old_tokens_valid() {
    let store = InMemorySigningKeyStore::new();
    let key_manager = Arc::new(KeyManager::new(store, KeyPolicyConfig::default()));
    key_manager.bootstrap().await.unwrap();

    let k1 = key_manager.active_signing_key().await.unwrap();
    let token_under_k1 = issue_token(base_claims("jti-1"), &k1);

    let credentials = InMemoryCredentialStore::new();
    let gate = Arc::new(RevocationLockoutGate::new(credentials.clone(), LockoutConfig::default(), 0.01));
    let authenticator = Authenticator::new(key_manager.clone(), credentials, gate, TokenPolicyConfig::default());
    let ip: IpAddr = "10.0.0.5".parse().unwrap();

    assert!(authenticator.authenticate(&token_under_k1, ip).await.is_ok());

    let k3 = key_manager.rotate("quarterly").await.unwrap();
    assert_ne!(k3.key_id, k1.key_id);

    // the old token still verifies: k1 is now deprecated, not retired.
    assert!(authenticator.authenticate(&token_under_k1, ip).await.is_ok());

    let token_under_k3 = issue_token(base_claims("jti-2"), &key_manager.active_signing_key().await.unwrap());
    assert_eq!(key_manager.active_signing_key().await.unwrap().key_id, k3.key_id);
    assert!(authenticator.authenticate(&token_under_k3, ip).await.is_ok());
}

/// S2 Emergency retire: force-retiring the active key immediately
/// invalidates every token it signed, even unexpired ones.
#[tokio::test]
async fn s2_emergency_retire_invalidates_outstanding_tokens() {
    let store = InMemorySigningKeyStore::new();
    let key_manager = Arc::new(KeyManager::new(store, KeyPolicyConfig::default()));
    key_manager.bootstrap().await.unwrap();

    let k1 = key_manager.active_signing_key().await.unwrap();
    let token_under_k1 = issue_token(base_claims("jti-3"), &k1);

    let credentials = InMemoryCredentialStore::new();
    let gate = Arc::new(RevocationLockoutGate::new(credentials.clone(), LockoutConfig::default(), 0.01));
    let authenticator = Authenticator::new(key_manager.clone(), credentials, gate, TokenPolicyConfig::default());
    let ip: IpAddr = "10.0.0.5".parse().unwrap();

    assert!(authenticator.authenticate(&token_under_k1, ip).await.is_ok());

    key_manager.retire(&k1.key_id, true).await.unwrap();

    assert!(authenticator.authenticate(&token_under_k1, ip).await.is_err());
}

/// S3 Config rollback: v1 -> v2 -> v3, each activated in turn; the same
/// claims yield different permission sets under each version, and a
/// rollback to v1 is visible on the next translate call once the cache is
/// invalidated.
#[tokio::test]
async fn s3_config_rollback_changes_translated_permissions() {
    let translation_store = InMemoryTranslationStore::new();
    let roles = InMemoryRoleStore::new();
    roles
        .put_role(trustgate::model::Role { id: "p1-role".into(), display_name: None, description: None, permissions: ["perm.p1".to_string()].into() })
        .await
        .unwrap();
    roles
        .put_role(trustgate::model::Role { id: "p3-role".into(), display_name: None, description: None, permissions: ["perm.p3".to_string()].into() })
        .await
        .unwrap();
    let translator = Translator::new(translation_store.clone(), roles, 100, 300);

    let schema_v1 = ConfigSchema {
        role_rules: vec![MappingRule { claim_key: "groups".into(), claim_value: "admin".into(), grants: vec!["p1-role".into()] }],
        group_rules: vec![],
    };
    let v1 = translation_store.upload(schema_v1, "tester".into(), None).await.unwrap();
    translator.activate(&v1.id).await.unwrap();

    let mut claims = HashMap::new();
    claims.insert("groups".to_string(), vec!["admin".to_string()]);
    let external = ExternalClaims { issuer: "idp".into(), subject: "alice".into(), claims: claims.clone() };
    let under_v1 = translator.translate(&external).await.unwrap();
    assert!(under_v1.permissions.contains("perm.p1"));

    // v2 maps nothing for this claim value.
    let v2 = translation_store.upload(ConfigSchema::default(), "tester".into(), None).await.unwrap();
    translator.activate(&v2.id).await.unwrap();
    let under_v2 = translator.translate(&external).await.unwrap();
    assert!(under_v2.permissions.is_empty());

    let schema_v3 = ConfigSchema {
        role_rules: vec![MappingRule { claim_key: "groups".into(), claim_value: "admin".into(), grants: vec!["p3-role".into()] }],
        group_rules: vec![],
    };
    let v3 = translation_store.upload(schema_v3, "tester".into(), None).await.unwrap();
    translator.activate(&v3.id).await.unwrap();
    let under_v3 = translator.translate(&external).await.unwrap();
    assert!(under_v3.permissions.contains("perm.p3"));
    assert!(!under_v3.permissions.contains("perm.p1"));

    translator.rollback(v1.version).await.unwrap();
    let under_rollback = translator.translate(&external).await.unwrap();
    assert!(under_rollback.permissions.contains("perm.p1"));
    assert!(!under_rollback.permissions.contains("perm.p3"));
}

/// S4 Lockout: 5 failing auth attempts from one IP within the lockout
/// window trip the threshold; the 6th request is rejected as locked out
/// through the full `Gateway::handle` pipeline regardless of whether the
/// credential presented is actually valid, and further failures past the
/// threshold neither extend the lockout nor bump its count.
#[tokio::test]
async fn s4_sixth_attempt_locked_out_even_with_a_valid_credential() {
    let key_store = InMemorySigningKeyStore::new();
    let key_manager = Arc::new(KeyManager::new(key_store, KeyPolicyConfig::default()));
    key_manager.bootstrap().await.unwrap();

    let credentials = InMemoryCredentialStore::new();
    let gate = Arc::new(RevocationLockoutGate::new(credentials.clone(), LockoutConfig::default(), 0.01));
    let authenticator = Arc::new(Authenticator::new(key_manager.clone(), credentials, gate.clone(), TokenPolicyConfig::default()));
    let ip: IpAddr = "10.0.0.1".parse().unwrap();

    for _ in 0..5 {
        let result = authenticator.authenticate("not-a-real-credential", ip).await;
        assert!(result.is_err());
    }

    let scope = trustgate::model::LockoutScope::Ip(ip.to_string());
    assert!(gate.check_lockout(std::slice::from_ref(&scope)).await.is_err());
    let locked = gate.get_lockout(&scope).await.unwrap().unwrap();

    // a 6th failure past the threshold must not extend the lockout window
    // or bump its count — the lockout, once installed, is left untouched.
    authenticator.authenticate("still-not-a-real-credential", ip).await.ok();
    let still_locked = gate.get_lockout(&scope).await.unwrap().unwrap();
    assert_eq!(still_locked.expires_at, locked.expires_at);
    assert_eq!(still_locked.lockout_count, locked.lockout_count);

    let service_store = InMemoryServiceStore::new();
    let mut service = ServiceRegistration::new("svc", "Svc", "gw.local");
    service.default_auth_required = false;
    service_store.create(service).await.unwrap();
    let registry = Arc::new(Registry::new(service_store));
    let roles = InMemoryRoleStore::new();
    let authorizer = Arc::new(AuthorizationEvaluator::new(roles.clone()));
    let translation_store = InMemoryTranslationStore::new();
    let translator = Arc::new(Translator::new(translation_store, roles, 100, 300));
    let rate_limiter = Arc::new(trustgate::ratelimit::RateLimiter::new());

    let gateway = trustgate::gateway::Gateway {
        registry,
        authenticator: authenticator.clone(),
        translator,
        revocation_gate: gate,
        authorizer,
        rate_limiter,
        default_rate_limit: trustgate::model::RateLimitConfig { requests_per_window: 1000, window_secs: 60, burst_capacity: 1000 },
    };

    // the valid token would authenticate fine on its own (S1-style check),
    // but the IP is locked out, so the pipeline must reject it before ever
    // reaching a point where authentication's own verdict would matter.
    let valid_token = issue_token(base_claims("jti-4"), &key_manager.active_signing_key().await.unwrap());
    assert!(authenticator.authenticate(&valid_token, ip).await.is_ok());

    let request = trustgate::gateway::IngressRequest {
        host_and_prefix: "gw.local".into(),
        method: "GET".into(),
        path: "/anything".into(),
        client_ip: ip,
        bearer_credential: Some(valid_token),
        operation: None,
    };
    let result = gateway.handle(request).await;
    assert!(matches!(result, Err(trustgate::error::GatewayError::LockedOut(_))));
}

/// S5 Permission policy: a caller without the required permission is
/// forbidden; granting the missing permission (directly, as the admin API
/// would after an access review) turns the same request into a success.
#[tokio::test]
async fn s5_permission_policy_grants_after_adding_required_permission() {
    let roles = InMemoryRoleStore::new();
    let evaluator = AuthorizationEvaluator::new(roles);

    let mut service = ServiceRegistration::new("payments", "Payments", "gw.local");
    let mut rules = HashMap::new();
    rules.insert("service.config.update".to_string(), AnyOfPermissions { any_of_permissions: ["payments.admin".to_string()].into() });
    service.permission_policy = Some(PermissionPolicy { rules });

    let reader = trustgate::model::Principal {
        subject: "bob".into(),
        issuer: "idp".into(),
        effective_permissions: ["payments.reader".to_string()].into(),
        token_id: None,
        expires_at: None,
        source: trustgate::model::PrincipalSource::Token,
        issued_at: None,
    };
    let forbidden = evaluator.evaluate(Some(&reader), &service, None, true, Some("service.config.update")).await;
    assert!(matches!(forbidden, Err(trustgate::error::GatewayError::Forbidden(_))));

    let mut admin = reader.clone();
    admin.effective_permissions.insert("payments.admin".to_string());
    assert!(evaluator.evaluate(Some(&admin), &service, None, true, Some("service.config.update")).await.is_ok());
}

/// S6 Service update conflict: two admins read the same version, both
/// attempt a conditional update with that version as If-Match; exactly one
/// succeeds (advancing the version), the other is rejected as a conflict.
#[tokio::test]
async fn s6_concurrent_conditional_updates_yield_one_conflict() {
    let store = InMemoryServiceStore::new();
    let registry = Arc::new(Registry::new(store));

    let mut service = ServiceRegistration::new("s1", "Svc", "https://backend");
    service.version = 1;
    registry.create(service).await.unwrap();
    // advance to version 7, as if six prior updates had already landed.
    for i in 0..6 {
        registry
            .update("s1", i + 1, ServicePatch { display_name: Some(format!("Svc v{}", i + 2)), ..Default::default() })
            .await
            .unwrap();
    }
    assert_eq!(registry.get("s1").await.unwrap().unwrap().version, 7);

    let (a, b) = tokio::join!(
        registry.update("s1", 7, ServicePatch { display_name: Some("Admin A".into()), ..Default::default() }),
        registry.update("s1", 7, ServicePatch { display_name: Some("Admin B".into()), ..Default::default() }),
    );

    let results = [a, b];
    let ok_count = results.iter().filter(|r| r.is_ok()).count();
    let conflict_count = results.iter().filter(|r| matches!(r, Err(trustgate::error::GatewayError::VersionConflict { .. }))).count();
    assert_eq!(ok_count, 1);
    assert_eq!(conflict_count, 1);
    assert_eq!(registry.get("s1").await.unwrap().unwrap().version, 8);
}
