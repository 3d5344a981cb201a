use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use archivo_db::Database;
use archivo_db::models::MediaRow;
use archivo_types::api::{Claims, SetAlbumRequest, TagUserRequest, UploadMediaQuery};
use archivo_types::models::MediaKind;

use crate::convert::media_responses;
use crate::error::ApiError;
use crate::{AppState, run_db};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// POST /api/media?title=&kind=&album_id= — raw body upload. The request
/// Content-Type is stored and replayed on download.
pub async fn upload_media(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<UploadMediaQuery>,
    headers: HeaderMap,
    WithRejection(bytes, _): WithRejection<Bytes, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    if bytes.is_empty() {
        return Err(ApiError::validation("empty upload"));
    }
    let title = query.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::validation("title is required"));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    let kind = query
        .kind
        .unwrap_or_else(|| MediaKind::from_content_type(&content_type));

    let owner = claims.sub.to_string();
    if let Some(album_id) = query.album_id {
        let (aid, uid) = (album_id.to_string(), owner.clone());
        run_db(&state, move |db| require_album_member(db, &aid, &uid)).await?;
    }

    let media_id = Uuid::new_v4().to_string();
    let sha256 = hex::encode(Sha256::digest(&bytes));

    tokio::fs::create_dir_all(&state.media_dir).await.map_err(|e| {
        error!("Failed to create media directory {}: {}", state.media_dir.display(), e);
        ApiError::Storage(e.into())
    })?;

    let path = state.media_dir.join(&media_id);
    let mut file = tokio::fs::File::create(&path).await.map_err(|e| {
        error!("Failed to create file {}: {}", path.display(), e);
        ApiError::Storage(e.into())
    })?;
    let written = match file.write_all(&bytes).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    drop(file);
    if let Err(e) = written {
        error!("Failed to write file {}: {}", path.display(), e);
        if let Err(rm) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove partial upload {}: {}", path.display(), rm);
        }
        return Err(ApiError::Storage(e.into()));
    }

    let row = MediaRow {
        id: media_id.clone(),
        owner_id: owner,
        kind: kind.as_str().to_string(),
        title,
        description: query.description.filter(|d| !d.trim().is_empty()),
        content_type,
        size: bytes.len() as i64,
        sha256,
        album_id: query.album_id.map(|id| id.to_string()),
        created_at: String::new(),
    };

    let inserted = run_db(&state, move |db| {
        db.insert_media(&row)?;
        let stored = db
            .get_media(&row.id)?
            .ok_or_else(|| ApiError::Storage(anyhow::anyhow!("media {} vanished after insert", row.id)))?;
        let mut responses = media_responses(db, std::slice::from_ref(&stored))?;
        responses
            .pop()
            .ok_or_else(|| ApiError::Storage(anyhow::anyhow!("empty media response")))
    })
    .await;

    let response = match inserted {
        Ok(response) => response,
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(&path).await {
                warn!("Failed to remove {} after insert error: {}", path.display(), rm);
            }
            return Err(e);
        }
    };

    info!("{} uploaded {} ({} bytes)", claims.username, media_id, bytes.len());
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/media — media the caller owns or is tagged in.
pub async fn list_media(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let media = run_db(&state, move |db| {
        let rows = db.list_media_for_user(&uid)?;
        media_responses(db, &rows)
    })
    .await?;

    Ok(Json(media))
}

/// GET /api/media/{media_id}
pub async fn get_media(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(media_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let media = run_db(&state, move |db| {
        let row = visible_media(db, &media_id.to_string(), &uid)?;
        let mut responses = media_responses(db, std::slice::from_ref(&row))?;
        responses
            .pop()
            .ok_or_else(|| ApiError::Storage(anyhow::anyhow!("empty media response")))
    })
    .await?;

    Ok(Json(media))
}

/// GET /api/media/{media_id}/content — the stored bytes.
pub async fn download_media(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(media_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let mid = media_id.to_string();
    let row = run_db(&state, move |db| visible_media(db, &mid, &uid)).await?;

    // Path is built from a parsed UUID, so no traversal is possible
    let path = state.media_dir.join(media_id.to_string());
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        error!("Failed to read file {}: {}", path.display(), e);
        ApiError::not_found("media content missing")
    })?;

    Ok(([(header::CONTENT_TYPE, row.content_type)], bytes))
}

/// DELETE /api/media/{media_id} — owner only.
pub async fn delete_media(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(media_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let mid = media_id.to_string();
    run_db(&state, move |db| {
        let row = visible_media(db, &mid, &uid)?;
        if row.owner_id != uid {
            return Err(ApiError::forbidden("only the owner can delete media"));
        }
        db.delete_media(&mid)?;
        Ok(())
    })
    .await?;

    let path = state.media_dir.join(media_id.to_string());
    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!("Failed to remove {}: {}", path.display(), e);
    }

    info!("{} deleted media {}", claims.username, media_id);
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/media/{media_id}/album — move into an album, or out with `null`.
pub async fn set_album(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(media_id): Path<Uuid>,
    WithRejection(Json(req), _): WithRejection<Json<SetAlbumRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    run_db(&state, move |db| {
        let mid = media_id.to_string();
        let row = visible_media(db, &mid, &uid)?;
        if row.owner_id != uid {
            return Err(ApiError::forbidden("only the owner can move media"));
        }
        let album_id = req.album_id.map(|id| id.to_string());
        if let Some(aid) = album_id.as_deref() {
            require_album_member(db, aid, &uid)?;
        }
        db.set_media_album(&mid, album_id.as_deref())?;
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/media/{media_id}/tags — anyone who can see the media may tag.
pub async fn tag_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(media_id): Path<Uuid>,
    WithRejection(Json(req), _): WithRejection<Json<TagUserRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let added = run_db(&state, move |db| {
        let mid = media_id.to_string();
        visible_media(db, &mid, &uid)?;
        let target = req.user_id.to_string();
        if db.get_user_by_id(&target)?.is_none() {
            return Err(ApiError::validation("tagged user does not exist"));
        }
        Ok(db.tag_user(&mid, &target)?)
    })
    .await?;

    Ok(if added { StatusCode::CREATED } else { StatusCode::OK })
}

/// DELETE /api/media/{media_id}/tags/{user_id} — the owner or the tagged
/// user themselves.
pub async fn untag_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((media_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    run_db(&state, move |db| {
        let mid = media_id.to_string();
        let row = visible_media(db, &mid, &uid)?;
        let target = user_id.to_string();
        if row.owner_id != uid && target != uid {
            return Err(ApiError::forbidden("only the owner or the tagged user can remove a tag"));
        }
        if !db.untag_user(&mid, &target)? {
            return Err(ApiError::not_found("tag not found"));
        }
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Media the user may see. Invisible media is reported as missing.
fn visible_media(db: &Database, media_id: &str, user_id: &str) -> Result<MediaRow, ApiError> {
    let row = db
        .get_media(media_id)?
        .ok_or_else(|| ApiError::not_found("media not found"))?;
    if !db.media_visible_to(media_id, user_id)? {
        return Err(ApiError::not_found("media not found"));
    }
    Ok(row)
}

pub(crate) fn require_album_member(db: &Database, album_id: &str, user_id: &str) -> Result<(), ApiError> {
    if db.get_album(album_id)?.is_none() {
        return Err(ApiError::not_found("album not found"));
    }
    if !db.is_album_member(album_id, user_id)? {
        return Err(ApiError::forbidden("not a member of this album"));
    }
    Ok(())
}
