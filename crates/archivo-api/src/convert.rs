//! Row -> API model conversion. Everything here runs inside `run_db`.

use std::collections::HashMap;

use archivo_db::Database;
use archivo_db::models::{AlbumRow, MediaRow, RelationRow, UserRow, parse_id, parse_timestamp};
use archivo_family::engine::label_for;
use archivo_types::api::{AlbumResponse, MediaResponse, RelationResponse};
use archivo_types::models::{MediaKind, UserProfile, UserSummary};
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;

pub type Directory = HashMap<Uuid, UserSummary>;

pub fn user_summary(row: &UserRow) -> Result<UserSummary, ApiError> {
    Ok(UserSummary {
        id: parse_id(&row.id)?,
        username: row.username.clone(),
        display_name: row.display_name.clone(),
    })
}

pub fn user_profile(row: &UserRow) -> Result<UserProfile, ApiError> {
    let date_of_birth = row.date_of_birth.as_deref().and_then(|raw| {
        raw.parse::<chrono::NaiveDate>()
            .map_err(|e| warn!("Corrupt date_of_birth '{}' on user '{}': {}", raw, row.id, e))
            .ok()
    });
    Ok(UserProfile {
        id: parse_id(&row.id)?,
        username: row.username.clone(),
        display_name: row.display_name.clone(),
        email: row.email.clone(),
        date_of_birth,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

/// Look up summaries for a set of users in one query.
pub fn directory(db: &Database, ids: impl IntoIterator<Item = Uuid>) -> Result<Directory, ApiError> {
    let mut wanted: Vec<String> = ids.into_iter().map(|id| id.to_string()).collect();
    wanted.sort();
    wanted.dedup();

    let mut dir = Directory::new();
    for row in db.get_users_by_ids(&wanted)? {
        let summary = user_summary(&row)?;
        dir.insert(summary.id, summary);
    }
    Ok(dir)
}

/// Summary from the directory, or a stand-in for a user deleted mid-request.
pub fn summary_of(dir: &Directory, id: Uuid) -> UserSummary {
    dir.get(&id).cloned().unwrap_or_else(|| {
        warn!("User {} missing from directory", id);
        UserSummary {
            id,
            username: "unknown".to_string(),
            display_name: "Unknown".to_string(),
        }
    })
}

/// `viewpoint` decides the label; `None` leaves it out.
pub fn relation_response(
    row: &RelationRow,
    dir: &Directory,
    viewpoint: Option<Uuid>,
) -> Result<RelationResponse, ApiError> {
    let edge = row.edge()?;
    Ok(RelationResponse {
        id: edge.id,
        from_user: summary_of(dir, edge.from_user_id),
        to_user: summary_of(dir, edge.to_user_id),
        relation_type: edge.relation_type,
        label: viewpoint.and_then(|v| label_for(&edge, v)),
        created_at: parse_timestamp(&row.created_at)?,
    })
}

/// Decode the rows and resolve their users, labelled from `viewpoint`.
pub fn relation_responses(
    db: &Database,
    rows: &[RelationRow],
    viewpoint: Option<Uuid>,
) -> Result<Vec<RelationResponse>, ApiError> {
    let mut ids = Vec::with_capacity(rows.len() * 2);
    for row in rows {
        let edge = row.edge()?;
        ids.push(edge.from_user_id);
        ids.push(edge.to_user_id);
    }
    let dir = directory(db, ids)?;
    rows.iter().map(|row| relation_response(row, &dir, viewpoint)).collect()
}

/// Resolve owners and tags for a page of media rows.
pub fn media_responses(db: &Database, rows: &[MediaRow]) -> Result<Vec<MediaResponse>, ApiError> {
    let media_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut tags: HashMap<String, Vec<Uuid>> = HashMap::new();
    for (media_id, user_id) in db.get_tags_for_media(&media_ids)? {
        tags.entry(media_id).or_default().push(parse_id(&user_id)?);
    }

    let mut user_ids = Vec::new();
    for row in rows {
        user_ids.push(parse_id(&row.owner_id)?);
    }
    user_ids.extend(tags.values().flatten().copied());
    let dir = directory(db, user_ids)?;

    rows.iter()
        .map(|row| {
            let tagged = tags
                .get(&row.id)
                .map(|ids| ids.iter().map(|id| summary_of(&dir, *id)).collect())
                .unwrap_or_default();
            media_response(row, &dir, tagged)
        })
        .collect()
}

fn media_response(row: &MediaRow, dir: &Directory, tagged: Vec<UserSummary>) -> Result<MediaResponse, ApiError> {
    let kind = MediaKind::parse(&row.kind).unwrap_or_else(|| {
        warn!("Corrupt kind '{}' on media '{}'", row.kind, row.id);
        MediaKind::Document
    });
    Ok(MediaResponse {
        id: parse_id(&row.id)?,
        owner: summary_of(dir, parse_id(&row.owner_id)?),
        kind,
        title: row.title.clone(),
        description: row.description.clone(),
        content_type: row.content_type.clone(),
        size: row.size.max(0) as u64,
        sha256: row.sha256.clone(),
        album_id: row.album_id.as_deref().map(parse_id).transpose()?,
        tagged,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

pub fn album_responses(db: &Database, rows: &[AlbumRow]) -> Result<Vec<AlbumResponse>, ApiError> {
    let mut owners = Vec::with_capacity(rows.len());
    for row in rows {
        owners.push(parse_id(&row.owner_id)?);
    }
    let dir = directory(db, owners)?;

    rows.iter()
        .map(|row| -> Result<AlbumResponse, ApiError> {
            Ok(AlbumResponse {
                id: parse_id(&row.id)?,
                owner: summary_of(&dir, parse_id(&row.owner_id)?),
                name: row.name.clone(),
                description: row.description.clone(),
                created_at: parse_timestamp(&row.created_at)?,
            })
        })
        .collect()
}
