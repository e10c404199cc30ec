use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use dishwatch_api::auth::{self, AppState, AppStateInner};
use dishwatch_api::menu;
use dishwatch_api::middleware::require_auth;
use dishwatch_api::reports;
use dishwatch_api::session::{self, SessionStore};
use dishwatch_auth::OAuthConfig;
use dishwatch_menu::MenuClient;
use dishwatch_sync::{SyncClient, SyncConfig};

const DEFAULT_MENU_BASE_URL: &str = "https://dish.avifoodsystems.com";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dishwatch=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("DISHWATCH_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = PathBuf::from(
        std::env::var("DISHWATCH_DB_PATH").unwrap_or_else(|_| "missing_menu.db".into()),
    );
    let host = std::env::var("DISHWATCH_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("DISHWATCH_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let menu_base_url = std::env::var("DISHWATCH_MENU_BASE_URL")
        .unwrap_or_else(|_| DEFAULT_MENU_BASE_URL.into());

    let oauth = OAuthConfig {
        client_id: std::env::var("DISHWATCH_OAUTH_CLIENT_ID").unwrap_or_default(),
        client_secret: std::env::var("DISHWATCH_OAUTH_CLIENT_SECRET").unwrap_or_default(),
        redirect_uri: std::env::var("DISHWATCH_OAUTH_REDIRECT_URI").unwrap_or_default(),
        auth_url: std::env::var("DISHWATCH_OAUTH_AUTH_URL")
            .unwrap_or_else(|_| "https://accounts.google.com/o/oauth2/v2/auth".into()),
        token_url: std::env::var("DISHWATCH_OAUTH_TOKEN_URL")
            .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".into()),
    };

    // Shared HTTP client (menu provider, OAuth token endpoint, sync API)
    let http = reqwest::Client::builder()
        .user_agent(concat!("dishwatch/", env!("CARGO_PKG_VERSION")))
        .build()?;

    // Remote snapshot sync is optional: without a token and repo the
    // service runs purely locally.
    let sync = sync_config_from_env()
        .map(|cfg| SyncClient::new(http.clone(), cfg));

    // Restore the latest snapshot before opening the database
    if let Some(client) = &sync {
        match client.download_snapshot(&db_path).await {
            Ok(true) => info!("Restored database snapshot from remote store"),
            Ok(false) => info!("No remote snapshot found, starting with a fresh database"),
            Err(e) => warn!("Snapshot download failed, continuing locally: {:#}", e),
        }
    }

    // Init database
    let db = dishwatch_db::Database::open(&db_path)?;

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        db_path,
        menu: MenuClient::new(http.clone(), menu_base_url),
        oauth,
        sync,
        sessions: SessionStore::new(),
        jwt_secret,
        http,
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/login", get(auth::login_url))
        .route("/auth/callback", get(auth::callback))
        .route("/health", get(health))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/halls", get(menu::list_halls))
        .route("/meals", get(menu::list_meals))
        .route("/session", get(session::get_session))
        .route("/session/hall", post(session::select_hall))
        .route("/session/meal", post(session::select_meal))
        .route("/menu", get(menu::get_menu))
        .route("/menu/check", post(menu::check_dish))
        .route("/reports", post(reports::submit_report))
        .route("/reports", get(reports::list_reports))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ))
        .with_state(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Dishwatch server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

fn sync_config_from_env() -> Option<SyncConfig> {
    let token = std::env::var("DISHWATCH_SYNC_TOKEN").ok()?;
    let repo = std::env::var("DISHWATCH_SYNC_REPO").ok()?;
    Some(SyncConfig {
        api_base: std::env::var("DISHWATCH_SYNC_API_BASE")
            .unwrap_or_else(|_| "https://api.github.com".into()),
        repo,
        path: std::env::var("DISHWATCH_SYNC_PATH").unwrap_or_else(|_| "missing_menu.db".into()),
        token,
    })
}
