use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use murmur_api::middleware::require_auth;
use murmur_api::{AppState, AppStateInner, notifications, posts, profile};
use murmur_gateway::connection;
use murmur_gateway::dispatcher::Dispatcher;

#[derive(Clone)]
struct ServerState {
    app: AppState,
    presence_interval: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("MURMUR_DB_PATH").unwrap_or_else(|_| "murmur.db".into());
    let host = std::env::var("MURMUR_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("MURMUR_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let presence_interval_secs: u64 = std::env::var("MURMUR_PRESENCE_INTERVAL_SECS")
        .unwrap_or_else(|_| "10".into())
        .parse()?;
    let presence_interval = Duration::from_secs(presence_interval_secs);

    // Init database
    let db = Arc::new(murmur_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        dispatcher: dispatcher.clone(),
    });

    let state = ServerState {
        app: app_state.clone(),
        presence_interval,
    };

    // Routes
    let protected_routes = Router::new()
        .route("/posts", post(posts::create_post))
        .route("/posts", get(posts::get_feed))
        .route("/posts/{post_id}", get(posts::get_post))
        .route("/posts/{post_id}", axum::routing::delete(posts::delete_post))
        .route("/posts/like/{post_id}", post(posts::like_post))
        .route("/posts/like/{post_id}", get(posts::get_likes))
        .route("/posts/unlike/{post_id}", put(posts::unlike_post))
        .route("/posts/comment/{post_id}", post(posts::create_comment))
        .route(
            "/posts/{post_id}/{comment_id}",
            axum::routing::delete(posts::delete_comment),
        )
        .route("/profile/follow/{user_id}", post(profile::follow_user))
        .route("/profile/unfollow/{user_id}", put(profile::unfollow_user))
        .route("/profile/followers/{user_id}", get(profile::get_followers))
        .route("/profile/following/{user_id}", get(profile::get_following))
        .route("/profile/stats/{username}", get(profile::get_follow_stats))
        .route("/notifications", get(notifications::get_notifications))
        .route("/notifications", post(notifications::mark_read))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Murmur server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(
            socket,
            state.app.db.clone(),
            state.app.dispatcher.clone(),
            state.presence_interval,
        )
    })
}
