use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use archivo_types::api::Claims;

use crate::error::ApiError;
use crate::{AppState, run_db};

/// Extract and validate the JWT from the Authorization header, then make
/// sure the account still exists. Claims land in request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::NotAuthenticated)?;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::NotAuthenticated)?
    .claims;

    let uid = claims.sub.to_string();
    let exists = run_db(&state, move |db| Ok(db.get_user_by_id(&uid)?.is_some())).await?;
    if !exists {
        return Err(ApiError::NotAuthenticated);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
