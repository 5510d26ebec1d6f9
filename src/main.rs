// Binary entry point: wires the trust-plane core to an axum server and
// starts the background periodic tasks the design calls for (spec §5
// "background tasks (cleanup sweeps, bloom-filter rebuilds, key rotation
// schedules) run on independent periodic tasks").

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use trustgate::admin::{self, AppState};
use trustgate::auth::Authenticator;
use trustgate::authz::AuthorizationEvaluator;
use trustgate::config::GatewayConfig;
use trustgate::keys::{InMemorySigningKeyStore, KeyManager};
use trustgate::registry::Registry;
use trustgate::revocation::RevocationLockoutGate;
use trustgate::store::{InMemoryCredentialStore, InMemoryRoleStore, InMemoryServiceStore, InMemoryTranslationStore};
use trustgate::translate::Translator;

#[derive(Parser, Debug)]
#[command(name = "trustgate-server", about = "API gateway trust plane")]
struct Cli {
    /// Path to a TOML config file; defaults are used for anything absent.
    #[arg(long)]
    config: Option<String>,

    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => GatewayConfig::from_toml_str(&std::fs::read_to_string(path)?)?,
        None => GatewayConfig::default(),
    };

    let credentials = InMemoryCredentialStore::new();
    let services = InMemoryServiceStore::new();
    let translations = InMemoryTranslationStore::new();
    let roles = InMemoryRoleStore::new();
    let signing_keys = InMemorySigningKeyStore::new();

    let key_manager = Arc::new(KeyManager::new(signing_keys, config.key_policy.clone()));
    key_manager.bootstrap().await?;

    let revocation_gate = Arc::new(RevocationLockoutGate::new(credentials.clone(), config.lockout.clone(), config.cache.bloom_target_fpr));
    revocation_gate.rebuild_bloom().await?;

    let authenticator = Arc::new(Authenticator::new(key_manager.clone(), credentials.clone(), revocation_gate.clone(), config.token_policy.clone()));
    let authorizer = Arc::new(AuthorizationEvaluator::new(roles.clone()));
    let translator = Arc::new(Translator::new(translations, roles.clone(), config.cache.translation_cache_max_entries, config.cache.translation_cache_ttl_secs));
    let registry = Arc::new(Registry::new(services));
    let rate_limiter = Arc::new(trustgate::ratelimit::RateLimiter::new());

    spawn_background_tasks(revocation_gate.clone(), key_manager.clone(), &config);

    let state = AppState {
        registry,
        authenticator,
        authorizer,
        translator,
        revocation_gate,
        key_manager,
        rate_limiter,
        credentials,
        roles,
    };

    let app = admin::router(state);
    let addr: SocketAddr = cli.listen.parse()?;
    info!(%addr, "trustgate listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_background_tasks(revocation_gate: Arc<RevocationLockoutGate>, key_manager: Arc<KeyManager>, config: &GatewayConfig) {
    let sweep_interval = Duration::from_secs(config.lockout.sweep_interval_secs.max(60));
    let gate_for_sweep = revocation_gate.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = gate_for_sweep.sweep().await {
                tracing::warn!(error = %e, "lockout sweep failed");
            }
        }
    });

    let bloom_interval = Duration::from_secs(config.cache.bloom_rebuild_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(bloom_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = revocation_gate.rebuild_bloom().await {
                tracing::warn!(error = %e, "bloom filter rebuild failed");
            }
        }
    });

    let rotation_interval = Duration::from_secs(config.key_policy.rotation_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(rotation_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = key_manager.rotate("scheduled rotation").await {
                tracing::warn!(error = %e, "scheduled key rotation failed");
            }
        }
    });
}
