//! Looplly session guard service
//!
//! Local development backend for the session lifecycle:
//! - Mock OTP auth (login, session lookup, token rotation, sign-out)
//! - Session thresholds served to clients, reloaded on SIGHUP
//! - Health probes

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use api::{router, AppState, MockAuthConfig};
use session_core::{ConfigService, SourceLoader};
use telemetry::{health, init_tracing_from_env, metrics};

/// Environment prefix for session thresholds, e.g.
/// `SESSION_GUARD_SESSION__TIMEOUTS__TEAM__SESSION_MS`.
const SESSION_ENV_PREFIX: &str = "SESSION_GUARD_SESSION";

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    /// TOML file with session thresholds
    #[serde(default = "default_session_config_file")]
    session_config_file: String,

    #[serde(default)]
    mock_auth: MockAuthConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_session_config_file() -> String {
    "config/session.toml".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_config_file: default_session_config_file(),
            mock_auth: MockAuthConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting session guard v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    config
        .mock_auth
        .rate_limit
        .validate()
        .context("Invalid mock auth rate limit")?;

    let session_config = Arc::new(
        ConfigService::new(SourceLoader::new(
            Some(PathBuf::from(&config.session_config_file)),
            SESSION_ENV_PREFIX,
        ))
        .context("Failed to load session configuration")?,
    );

    let current = session_config.current();
    info!(
        team_session_ms = current.timeouts.team.session_ms,
        team_inactivity_ms = current.timeouts.team.inactivity_ms,
        regular_session_ms = current.timeouts.regular.session_ms,
        regular_inactivity_ms = current.timeouts.regular.inactivity_ms,
        activity_debounce_secs = current.activity_debounce_secs,
        validation_interval_secs = current.validation_interval_secs,
        "Loaded session configuration"
    );

    if !config.mock_auth.mock_login_enabled {
        warn!("Mock login is disabled, /auth/mock-login will answer 403");
    }

    let state = AppState::new(config.mock_auth.clone(), session_config.clone());

    let _rate_limiter_cleanup = state.start_rate_limiter_cleanup();
    info!("Started rate limiter cleanup task (every 5 minutes)");

    let _config_reload = spawn_config_reload(session_config);

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // This process is the auth provider.
    health().auth_provider.set_healthy();
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let snapshot = metrics().snapshot();
    info!(
        mock_logins = snapshot.mock_logins,
        mock_login_failures = snapshot.mock_login_failures,
        rate_limited_requests = snapshot.rate_limited_requests,
        active_tokens = snapshot.active_tokens,
        "Shutdown complete"
    );
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("SESSION_GUARD")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Re-reads session thresholds whenever the process receives SIGHUP.
#[cfg(unix)]
fn spawn_config_reload(service: Arc<ConfigService>) -> Option<tokio::task::JoinHandle<()>> {
    let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!(error = %e, "Could not install SIGHUP handler, config reload disabled");
            return None;
        }
    };

    Some(tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("Received SIGHUP, reloading session configuration");
            // Failures keep the previous configuration and are logged by the service.
            let _ = service.refresh();
        }
    }))
}

#[cfg(not(unix))]
fn spawn_config_reload(_service: Arc<ConfigService>) -> Option<tokio::task::JoinHandle<()>> {
    None
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
