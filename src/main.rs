//! Admission guard server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!          │
//!          ▼
//!   ┌─────────────┐   request id, trace, timeout, body limit
//!   │ http server │
//!   └──────┬──────┘
//!          ▼
//!   ┌─────────────┐   bearer token → TokenEngine (signature, claims, revocation)
//!   │authenticate │
//!   └──────┬──────┘
//!          ▼
//!   ┌─────────────┐   trusted proxies → client ip
//!   │  client ip  │
//!   └──────┬──────┘
//!          ▼
//!   ┌─────────────┐   per-ip sliding window
//!   │  ip limit   │
//!   └──────┬──────┘
//!          ▼
//!   ┌─────────────┐   per-user category window + penalty ladder
//!   │ user limit  │
//!   └──────┬──────┘
//!          ▼
//!      handlers      login (lockout), otp (phone/ip limits), refresh, logout
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use admission_guard::config::{load_config, watcher::ConfigWatcher, GuardConfig};
use admission_guard::http::{AppState, Collaborators, HttpServer, LogOtpProvider};
use admission_guard::lifecycle::{signals::spawn_signal_listener, startup::connect_shared_store, Shutdown};
use admission_guard::observability::{logging, metrics};
use admission_guard::store::MemoryPersistence;

#[derive(Parser)]
#[command(name = "admission-guard")]
#[command(about = "Token validation and rate limiting in front of an HTTP API", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "guard.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "admission-guard starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.listener.request_timeout_secs,
        shared_store = config.store.redis_url.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = connect_shared_store(&config.store).await;
    let persistence = Arc::new(seed_persistence(&config));
    let state = AppState::new(
        &config,
        Collaborators {
            persistence: persistence.clone(),
            credentials: persistence,
            otp_provider: Arc::new(LogOtpProvider::new()),
            store,
        },
    )?;

    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_listener(shutdown.clone());
    let _sweepers = state.spawn_sweepers(Duration::from_secs(config.cleanup_interval_secs), &shutdown);
    let _watcher = spawn_config_reload(&args.config, state.clone());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    HttpServer::new(config.listener.clone(), state)
        .run(listener, shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// In-process account table seeded from `dev_accounts`.
fn seed_persistence(config: &GuardConfig) -> MemoryPersistence {
    let persistence = MemoryPersistence::new();
    for account in &config.dev_accounts {
        persistence.insert_account(&account.id, &account.role, account.active, &account.password);
    }
    if !config.dev_accounts.is_empty() {
        tracing::warn!(
            accounts = config.dev_accounts.len(),
            "Serving development accounts from configuration"
        );
    }
    persistence
}

/// Watch the config file and apply limit changes. Returns the watcher,
/// which must stay alive for reloads to continue.
fn spawn_config_reload(path: &std::path::Path, state: AppState) -> Option<notify::RecommendedWatcher> {
    let (watcher, mut updates) = ConfigWatcher::new(path);
    let watcher = match watcher.run() {
        Ok(watcher) => watcher,
        Err(e) => {
            tracing::warn!(error = %e, "Config watcher unavailable; hot reload disabled");
            return None;
        }
    };

    tokio::spawn(async move {
        while let Some(config) = updates.recv().await {
            logging::set_log_level(&config.observability.log_level);
            state.reload(&config);
        }
    });
    Some(watcher)
}
