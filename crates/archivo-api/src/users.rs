use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::{info, warn};
use uuid::Uuid;

use archivo_types::api::{Claims, UpdateProfileRequest, UserSearchQuery};

use crate::auth::normalize_email;
use crate::convert::{user_profile, user_summary};
use crate::error::ApiError;
use crate::{AppState, run_db};

const SEARCH_LIMIT: u32 = 50;

/// GET /api/user
pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let profile = run_db(&state, move |db| {
        let row = db.get_user_by_id(&uid)?.ok_or(ApiError::NotAuthenticated)?;
        user_profile(&row)
    })
    .await?;

    Ok(Json(profile))
}

/// PATCH /api/user
pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateProfileRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let display_name = match req.display_name.as_deref().map(str::trim) {
        Some("") => return Err(ApiError::validation("display name cannot be empty")),
        other => other.map(str::to_string),
    };
    // An empty email field is left as is rather than cleared
    let email = normalize_email(req.email.as_deref())?;
    let date_of_birth = req.date_of_birth.map(|d| d.to_string());

    let uid = claims.sub.to_string();
    let profile = run_db(&state, move |db| {
        db.update_profile(&uid, display_name.as_deref(), email.as_deref(), date_of_birth.as_deref())?;
        let row = db.get_user_by_id(&uid)?.ok_or(ApiError::NotAuthenticated)?;
        user_profile(&row)
    })
    .await?;

    Ok(Json(profile))
}

/// DELETE /api/user — removes the account and the content files it owned.
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let owned_media = run_db(&state, move |db| {
        let owned: Vec<String> = db
            .list_media_for_user(&uid)?
            .into_iter()
            .filter(|m| m.owner_id == uid)
            .map(|m| m.id)
            .collect();
        db.delete_user(&uid)?;
        Ok(owned)
    })
    .await?;

    for media_id in owned_media {
        let path = state.media_dir.join(&media_id);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }

    info!("Account {} ({}) deleted", claims.username, claims.sub);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/users?search=
pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<UserSearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let needle = query.search.trim().to_string();
    let users = run_db(&state, move |db| {
        db.search_users(&needle, SEARCH_LIMIT)?
            .iter()
            .map(user_summary)
            .collect::<Result<Vec<_>, _>>()
    })
    .await?;

    Ok(Json(users))
}

/// GET /api/users/{user_id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = run_db(&state, move |db| {
        let row = db
            .get_user_by_id(&user_id.to_string())?
            .ok_or_else(|| ApiError::not_found("user not found"))?;
        user_summary(&row)
    })
    .await?;

    Ok(Json(summary))
}
