use std::collections::BTreeMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::{info, warn};
use uuid::Uuid;

use archivo_db::Database;
use archivo_db::models::RelationRow;
use archivo_family::engine::{counterpart, derive_secondary_relations, label_for};
use archivo_family::{Edge, FamilyTree, NewEdge, RelationType};
use archivo_types::api::{
    AddRelationRequest, AddRelationResponse, Claims, FamilyQuery, NewMember, TreeMemberResponse,
    TreeQuery, TreeResponse,
};

use crate::auth::{NO_PASSWORD, validate_username};
use crate::convert::{directory, relation_responses, summary_of};
use crate::error::ApiError;
use crate::{AppState, run_db};

/// GET /api/family?user_id= — edges touching the user (default: caller),
/// labelled from that user's side.
pub async fn list_relations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<FamilyQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let viewpoint = query.user_id.unwrap_or(claims.sub);

    let relations = run_db(&state, move |db| {
        let uid = viewpoint.to_string();
        if db.get_user_by_id(&uid)?.is_none() {
            return Err(ApiError::not_found("user not found"));
        }
        let rows = db.list_relations_for_user(&uid)?;
        relation_responses(db, &rows, Some(viewpoint))
    })
    .await?;

    Ok(Json(relations))
}

/// POST /api/family — relate the caller to an existing user or to a new
/// placeholder member. With `inherit_relations`, parent/child edges are
/// also propagated to the child's siblings.
pub async fn add_relation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<AddRelationRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let relation_type: RelationType = req.relation_type.parse()?;
    let target = match (req.to_user_id, req.new_member) {
        (Some(id), None) => Target::Existing(id),
        (None, Some(member)) => Target::New(prepare_member(member)?),
        _ => {
            return Err(ApiError::validation(
                "exactly one of to_user_id and new_member is required",
            ));
        }
    };
    let caller = claims.sub;
    let inherit = req.inherit_relations;

    let response = run_db(&state, move |db| {
        let (target_id, created) = match target {
            Target::Existing(id) => {
                if db.get_user_by_id(&id.to_string())?.is_none() {
                    return Err(ApiError::validation("target user does not exist"));
                }
                (id, false)
            }
            Target::New(member) => (create_member(db, member)?, true),
        };

        let result = insert_with_derived(db, caller, target_id, relation_type, inherit);
        if result.is_err() && created {
            // Do not leave an orphan placeholder behind
            if let Err(e) = db.delete_user(&target_id.to_string()) {
                warn!("Failed to remove placeholder member {}: {}", target_id, e);
            }
        }
        result
    })
    .await?;

    info!(
        "{} added {} relation {} ({} derived)",
        claims.username,
        relation_type,
        response.relation.id,
        response.derived.len()
    );

    Ok((StatusCode::CREATED, Json(response)))
}

enum Target {
    Existing(Uuid),
    New(PreparedMember),
}

struct PreparedMember {
    id: Uuid,
    username: String,
    display_name: String,
    date_of_birth: Option<String>,
}

fn prepare_member(member: NewMember) -> Result<PreparedMember, ApiError> {
    let display_name = member.display_name.trim().to_string();
    if display_name.is_empty() {
        return Err(ApiError::validation("new member needs a display name"));
    }
    let id = Uuid::new_v4();
    let username = match member.username.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => {
            validate_username(name)?;
            name.to_string()
        }
        _ => generated_username(&display_name, id),
    };
    Ok(PreparedMember {
        id,
        username,
        display_name,
        date_of_birth: member.date_of_birth.map(|d| d.to_string()),
    })
}

/// `<slug>-<8 hex>` from the display name, e.g. `grandma-rose-1a2b3c4d`.
fn generated_username(display_name: &str, id: Uuid) -> String {
    let mut slug = String::new();
    for c in display_name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug: String = slug.chars().take(20).collect();
    let slug = slug.trim_end_matches('-');
    let hex = id.simple().to_string();
    if slug.is_empty() {
        format!("member-{}", &hex[..8])
    } else {
        format!("{}-{}", slug, &hex[..8])
    }
}

fn create_member(db: &Database, member: PreparedMember) -> Result<Uuid, ApiError> {
    if db.get_user_by_username(&member.username)?.is_some() {
        return Err(ApiError::conflict("username is taken"));
    }
    db.create_user(
        &member.id.to_string(),
        &member.username,
        NO_PASSWORD,
        &member.display_name,
        None,
        member.date_of_birth.as_deref(),
    )?;
    info!("Created placeholder member {} ({})", member.username, member.id);
    Ok(member.id)
}

fn insert_with_derived(
    db: &Database,
    caller: Uuid,
    target: Uuid,
    relation_type: RelationType,
    inherit: bool,
) -> Result<AddRelationResponse, ApiError> {
    let new_edge = NewEdge::new(caller, target, relation_type)?;

    if db
        .relation_between(&caller.to_string(), &target.to_string())?
        .is_some()
    {
        return Err(ApiError::conflict("these users are already related"));
    }

    let derived = if inherit {
        let existing = decode_edges(&db.list_relations_for_users(&[caller.to_string(), target.to_string()])?)?;
        derive_secondary_relations(&new_edge, &existing)
    } else {
        Vec::new()
    };

    let mut batch = Vec::with_capacity(1 + derived.len());
    for edge in std::iter::once(&new_edge).chain(derived.iter()) {
        batch.push((
            Uuid::new_v4().to_string(),
            edge.from_user_id.to_string(),
            edge.to_user_id.to_string(),
            edge.relation_type.to_string(),
        ));
    }

    db.insert_relations(&batch).map_err(|e| {
        if archivo_db::is_constraint_violation(&e) {
            ApiError::conflict("these users are already related")
        } else {
            ApiError::Storage(e)
        }
    })?;

    let mut rows = Vec::with_capacity(batch.len());
    for (id, ..) in &batch {
        let row = db
            .get_relation(id)?
            .ok_or_else(|| ApiError::Storage(anyhow::anyhow!("relation {} vanished after insert", id)))?;
        rows.push(row);
    }

    let mut responses = relation_responses(db, &rows, Some(caller))?.into_iter();
    let relation = responses
        .next()
        .ok_or_else(|| ApiError::Storage(anyhow::anyhow!("empty relation batch")))?;

    Ok(AddRelationResponse {
        relation,
        derived: responses.collect(),
    })
}

fn decode_edges(rows: &[RelationRow]) -> Result<Vec<Edge>, ApiError> {
    rows.iter().map(|r| r.edge().map_err(ApiError::from)).collect()
}

/// DELETE /api/family/{relation_id} — either endpoint may remove an edge.
pub async fn delete_relation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(relation_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = claims.sub;
    run_db(&state, move |db| {
        let rid = relation_id.to_string();
        let row = db
            .get_relation(&rid)?
            .ok_or_else(|| ApiError::not_found("relation not found"))?;
        if !row.edge()?.touches(caller) {
            return Err(ApiError::forbidden("only a member of this relation can remove it"));
        }
        if !db.delete_relation(&rid)? {
            return Err(ApiError::not_found("relation not found"));
        }
        Ok(())
    })
    .await?;

    info!("{} removed relation {}", claims.username, relation_id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/family/tree?root= — the root's relatives grouped into buckets.
pub async fn get_tree(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<TreeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let root = query.root.unwrap_or(claims.sub);

    let tree = run_db(&state, move |db| {
        if db.get_user_by_id(&root.to_string())?.is_none() {
            return Err(ApiError::not_found("user not found"));
        }

        // Depth-2 inference needs the edges of the root's parents and children too
        let direct = decode_edges(&db.list_relations_for_user(&root.to_string())?)?;
        let mut scope = vec![root.to_string()];
        for edge in &direct {
            if !matches!(label_for(edge, root), Some(RelationType::Parent | RelationType::Child)) {
                continue;
            }
            if let Some(other) = counterpart(edge, root) {
                scope.push(other.to_string());
            }
        }
        let edges = decode_edges(&db.list_relations_for_users(&scope)?)?;

        let tree = FamilyTree::project(root, &edges);
        let dir = directory(db, std::iter::once(root).chain(tree.user_ids()))?;

        let buckets: BTreeMap<RelationType, Vec<TreeMemberResponse>> = tree
            .buckets
            .iter()
            .map(|(kind, members)| {
                let members = members
                    .iter()
                    .map(|m| TreeMemberResponse {
                        user: summary_of(&dir, m.user_id),
                        relation_id: m.relation_id,
                        inferred: m.inferred,
                    })
                    .collect();
                (*kind, members)
            })
            .collect();

        Ok(TreeResponse {
            root: summary_of(&dir, root),
            buckets,
        })
    })
    .await?;

    Ok(Json(tree))
}
