use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use wisp_api::auth::{self, AppState, AppStateInner};
use wisp_api::messages;
use wisp_api::middleware::require_auth;
use wisp_api::view;

mod purge;

const PURGE_INTERVAL_SECS: u64 = 900;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wisp=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("WISP_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let kdf_salt =
        std::env::var("WISP_KDF_SALT").unwrap_or_else(|_| "wisp-dev-salt-change-me".into());
    anyhow::ensure!(kdf_salt.len() >= 8, "WISP_KDF_SALT must be at least 8 bytes");
    let db_path = std::env::var("WISP_DB_PATH").unwrap_or_else(|_| "wisp.db".into());
    let host = std::env::var("WISP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("WISP_PORT")
        .unwrap_or_else(|_| "3005".into())
        .parse()?;

    // Init database
    let db = wisp_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        kdf_salt: kdf_salt.into_bytes(),
    });

    // Expired messages are invisible the moment they lapse; the purge loop
    // just keeps dead rows from piling up.
    tokio::spawn(purge::run_purge_loop(state.clone(), PURGE_INTERVAL_SECS));

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/extend", post(auth::extend))
        .route("/view/{vtoken}", get(view::view_message))
        .route("/view/{vtoken}/response", post(view::respond))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route(
            "/messages",
            get(messages::list_messages).post(messages::create_message),
        )
        .route(
            "/messages/{id}",
            get(messages::get_message)
                .put(messages::update_message)
                .delete(messages::delete_message),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Wisp server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
