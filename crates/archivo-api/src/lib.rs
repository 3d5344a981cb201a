pub mod albums;
pub mod auth;
pub mod convert;
pub mod error;
pub mod family;
pub mod media;
pub mod middleware;
pub mod users;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};
use tracing::error;

use archivo_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_days: i64,
    pub media_dir: PathBuf,
    pub max_upload_bytes: usize,
}

/// Run blocking database work off the async runtime.
pub(crate) async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Storage(anyhow::anyhow!("blocking task failed"))
        })?
}

/// All API routes. The server adds CORS, tracing and static files on top.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    let protected_routes = Router::new()
        .route("/api/user", get(users::get_me).patch(users::update_me).delete(users::delete_me))
        .route("/api/users", get(users::search_users))
        .route("/api/users/{user_id}", get(users::get_user))
        .route("/api/family", get(family::list_relations).post(family::add_relation))
        .route("/api/family/tree", get(family::get_tree))
        .route("/api/family/{relation_id}", delete(family::delete_relation))
        .route(
            "/api/media",
            get(media::list_media).post(media::upload_media).layer(upload_limit),
        )
        .route("/api/media/{media_id}", get(media::get_media).delete(media::delete_media))
        .route("/api/media/{media_id}/content", get(media::download_media))
        .route("/api/media/{media_id}/album", put(media::set_album))
        .route("/api/media/{media_id}/tags", post(media::tag_user))
        .route("/api/media/{media_id}/tags/{user_id}", delete(media::untag_user))
        .route("/api/albums", get(albums::list_albums).post(albums::create_album))
        .route("/api/albums/{album_id}", get(albums::get_album).delete(albums::delete_album))
        .route("/api/albums/{album_id}/members", post(albums::add_member))
        .route("/api/albums/{album_id}/members/{user_id}", delete(albums::remove_member))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
