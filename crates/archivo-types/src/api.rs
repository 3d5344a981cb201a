use std::collections::BTreeMap;

use archivo_family::RelationType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{MediaKind, UserSummary};

// -- JWT Claims --

/// Bearer token claims, issued at register/login and checked by the auth
/// middleware on every protected route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Users --

/// Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    #[serde(default)]
    pub search: String,
}

// -- Family --

#[derive(Debug, Deserialize)]
pub struct FamilyQuery {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct TreeQuery {
    pub root: Option<Uuid>,
}

/// A relative who does not have an account yet; created together with
/// the relation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewMember {
    pub username: Option<String>,
    pub display_name: String,
    pub date_of_birth: Option<NaiveDate>,
}

/// Exactly one of `to_user_id` and `new_member` must be set.
/// `relation_type` says what the target is to the caller.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddRelationRequest {
    pub to_user_id: Option<Uuid>,
    pub new_member: Option<NewMember>,
    pub relation_type: String,
    #[serde(default)]
    pub inherit_relations: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationResponse {
    pub id: Uuid,
    pub from_user: UserSummary,
    pub to_user: UserSummary,
    pub relation_type: RelationType,
    /// What the other endpoint is to the user the list was requested for.
    pub label: Option<RelationType>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AddRelationResponse {
    pub relation: RelationResponse,
    pub derived: Vec<RelationResponse>,
}

#[derive(Debug, Serialize)]
pub struct TreeMemberResponse {
    pub user: UserSummary,
    pub relation_id: Option<Uuid>,
    pub inferred: bool,
}

#[derive(Debug, Serialize)]
pub struct TreeResponse {
    pub root: UserSummary,
    pub buckets: BTreeMap<RelationType, Vec<TreeMemberResponse>>,
}

// -- Media --

#[derive(Debug, Deserialize)]
pub struct UploadMediaQuery {
    pub title: String,
    pub kind: Option<MediaKind>,
    pub description: Option<String>,
    pub album_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaResponse {
    pub id: Uuid,
    pub owner: UserSummary,
    pub kind: MediaKind,
    pub title: String,
    pub description: Option<String>,
    pub content_type: String,
    pub size: u64,
    pub sha256: String,
    pub album_id: Option<Uuid>,
    pub tagged: Vec<UserSummary>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetAlbumRequest {
    pub album_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagUserRequest {
    pub user_id: Uuid,
}

// -- Albums --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAlbumRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlbumResponse {
    pub id: Uuid,
    pub owner: UserSummary,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AlbumDetailResponse {
    pub album: AlbumResponse,
    pub members: Vec<UserSummary>,
    pub media: Vec<MediaResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
}
