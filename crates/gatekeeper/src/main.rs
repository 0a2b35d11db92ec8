//! Gatekeeper - bearer token authentication and role gating for user APIs

use anyhow::Result;
use axum::{Json, Router, middleware::from_fn_with_state, routing::get};
use clap::Parser;
use gatekeeper_auth::{AuthGate, AuthUser, JwtVerifier, authenticate, authorize, require_role};
use gatekeeper_db::{Database, Role, User};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::path::Path;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, LoggingConfig};

/// Gatekeeper - JWT authentication gate backed by a user store
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "GATEKEEPER_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "GATEKEEPER_PORT")]
    port: Option<u16>,

    /// Token verification secret
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    init_logging(&config.logging);

    info!("Starting Gatekeeper v{}", env!("CARGO_PKG_VERSION"));

    if let Some(parent) = Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let db = Database::new(&config.database.url()).await?;

    let verifier = match config.auth.effective_secret(args.jwt_secret) {
        Some(secret) => JwtVerifier::new(&secret),
        None => {
            warn!("No JWT secret configured; every bearer token will be rejected");
            JwtVerifier::unconfigured()
        }
    };

    let gate = AuthGate::new(verifier, db);
    let app = create_router(gate).layer(TraceLayer::new_for_http());

    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Public health route plus the protected user routes
fn create_router(gate: AuthGate) -> Router {
    let staff = Router::new()
        .route("/me", get(current_user))
        .route_layer(from_fn_with_state(
            authorize([Role::Employee, Role::Admin]),
            require_role,
        ));

    let api = Router::new()
        .route("/me", get(current_user))
        .nest("/staff", staff)
        .route_layer(from_fn_with_state(gate, authenticate));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn current_user(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

/// Initialize logging
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
    }
}
