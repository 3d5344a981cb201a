use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use archivo_db::models::{AlbumRow, parse_id};
use archivo_types::api::{AddMemberRequest, AlbumDetailResponse, Claims, CreateAlbumRequest};

use crate::convert::{album_responses, directory, media_responses, summary_of};
use crate::error::ApiError;
use crate::media::require_album_member;
use crate::{AppState, run_db};

const MAX_ALBUM_NAME: usize = 100;

/// POST /api/albums
pub async fn create_album(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<CreateAlbumRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() || name.chars().count() > MAX_ALBUM_NAME {
        return Err(ApiError::validation("album name must be 1 to 100 characters"));
    }

    let row = AlbumRow {
        id: Uuid::new_v4().to_string(),
        owner_id: claims.sub.to_string(),
        name,
        description: req.description.filter(|d| !d.trim().is_empty()),
        created_at: String::new(),
    };

    let album = run_db(&state, move |db| {
        db.create_album(&row)?;
        let stored = db
            .get_album(&row.id)?
            .ok_or_else(|| ApiError::Storage(anyhow::anyhow!("album {} vanished after insert", row.id)))?;
        album_responses(db, std::slice::from_ref(&stored))?
            .pop()
            .ok_or_else(|| ApiError::Storage(anyhow::anyhow!("empty album response")))
    })
    .await?;

    info!("{} created album {} ({})", claims.username, album.name, album.id);
    Ok((StatusCode::CREATED, Json(album)))
}

/// GET /api/albums — albums the caller owns or belongs to.
pub async fn list_albums(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let albums = run_db(&state, move |db| {
        let rows = db.list_albums_for_user(&uid)?;
        album_responses(db, &rows)
    })
    .await?;

    Ok(Json(albums))
}

/// GET /api/albums/{album_id} — album with members and media.
pub async fn get_album(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(album_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let detail = run_db(&state, move |db| {
        let aid = album_id.to_string();
        require_album_member(db, &aid, &uid)?;

        let row = db
            .get_album(&aid)?
            .ok_or_else(|| ApiError::not_found("album not found"))?;
        let album = album_responses(db, std::slice::from_ref(&row))?
            .pop()
            .ok_or_else(|| ApiError::Storage(anyhow::anyhow!("empty album response")))?;

        let member_ids = db
            .get_album_member_ids(&aid)?
            .iter()
            .map(|id| parse_id(id))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let dir = directory(db, member_ids.iter().copied())?;
        let members = member_ids.iter().map(|id| summary_of(&dir, *id)).collect();

        let media = media_responses(db, &db.list_album_media(&aid)?)?;

        Ok(AlbumDetailResponse { album, members, media })
    })
    .await?;

    Ok(Json(detail))
}

/// DELETE /api/albums/{album_id} — owner only; media stays, unfiled.
pub async fn delete_album(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(album_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    run_db(&state, move |db| {
        let aid = album_id.to_string();
        require_owner(db, &aid, &uid)?;
        db.delete_album(&aid)?;
        Ok(())
    })
    .await?;

    info!("{} deleted album {}", claims.username, album_id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/albums/{album_id}/members — owner only.
pub async fn add_member(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(album_id): Path<Uuid>,
    WithRejection(Json(req), _): WithRejection<Json<AddMemberRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let added = run_db(&state, move |db| {
        let aid = album_id.to_string();
        require_owner(db, &aid, &uid)?;
        let member = req.user_id.to_string();
        if member == uid {
            return Err(ApiError::validation("the owner is always a member"));
        }
        if db.get_user_by_id(&member)?.is_none() {
            return Err(ApiError::validation("user does not exist"));
        }
        Ok(db.add_album_member(&aid, &member)?)
    })
    .await?;

    Ok(if added { StatusCode::CREATED } else { StatusCode::OK })
}

/// DELETE /api/albums/{album_id}/members/{user_id} — the owner, or a
/// member leaving.
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((album_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    run_db(&state, move |db| {
        let aid = album_id.to_string();
        let album = db
            .get_album(&aid)?
            .ok_or_else(|| ApiError::not_found("album not found"))?;
        let member = user_id.to_string();
        if album.owner_id != uid && member != uid {
            return Err(ApiError::forbidden("only the owner can remove other members"));
        }
        if !db.remove_album_member(&aid, &member)? {
            return Err(ApiError::not_found("not a member of this album"));
        }
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

fn require_owner(db: &archivo_db::Database, album_id: &str, user_id: &str) -> Result<(), ApiError> {
    let album = db
        .get_album(album_id)?
        .ok_or_else(|| ApiError::not_found("album not found"))?;
    if album.owner_id != user_id {
        return Err(ApiError::forbidden("only the owner can change this album"));
    }
    Ok(())
}
