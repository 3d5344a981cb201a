use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use archivo_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::ApiError;
use crate::{AppState, run_db};

/// Password column value for accounts that cannot sign in (relatives added
/// by someone else). Never parses as a PHC string.
pub const NO_PASSWORD: &str = "!";

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_string();
    validate_username(&username)?;
    if req.password.len() < 8 {
        return Err(ApiError::validation("password must be at least 8 characters"));
    }
    let display_name = match req.display_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => username.clone(),
    };
    let email = normalize_email(req.email.as_deref())?;

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Storage(anyhow::anyhow!("password hashing failed: {}", e)))?
        .to_string();

    let user_id = Uuid::new_v4();
    let uname = username.clone();
    run_db(&state, move |db| {
        if db.get_user_by_username(&uname)?.is_some() {
            return Err(ApiError::conflict("username is taken"));
        }
        db.create_user(
            &user_id.to_string(),
            &uname,
            &password_hash,
            &display_name,
            email.as_deref(),
            None,
        )?;
        Ok(())
    })
    .await?;

    info!("Registered user {} ({})", username, user_id);

    let token = create_token(&state.jwt_secret, state.token_days, user_id, &username)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_string();
    let user = run_db(&state, move |db| Ok(db.get_user_by_username(&username)?))
        .await?
        .ok_or(ApiError::NotAuthenticated)?;

    // Placeholder accounts have no parseable hash and cannot sign in
    let parsed_hash = PasswordHash::new(&user.password).map_err(|_| ApiError::NotAuthenticated)?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::NotAuthenticated)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Storage(anyhow::anyhow!("corrupt user id {:?}: {}", user.id, e)))?;

    let token = create_token(&state.jwt_secret, state.token_days, user_id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

pub fn create_token(secret: &str, days: i64, user_id: Uuid, username: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(days)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Storage(e.into()))?;

    Ok(token)
}

/// 3 to 32 characters of ASCII letters, digits, `.`, `_` or `-`.
pub fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.len() < 3 || username.len() > 32 {
        return Err(ApiError::validation("username must be 3 to 32 characters"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ApiError::validation(
            "username may only contain letters, digits, '.', '_' and '-'",
        ));
    }
    Ok(())
}

/// Empty means "no email". Anything else needs an `@` with text on both sides.
pub fn normalize_email(email: Option<&str>) -> Result<Option<String>, ApiError> {
    let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) else {
        return Ok(None);
    };
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(Some(email.to_string())),
        _ => Err(ApiError::validation("invalid email address")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(validate_username("ann").is_ok());
        assert!(validate_username("anna.b_smith-2").is_ok());
        assert!(validate_username("an").is_err());
        assert!(validate_username(&"a".repeat(33)).is_err());
        assert!(validate_username("anna smith").is_err());
    }

    #[test]
    fn email_rules() {
        assert_eq!(normalize_email(None).unwrap(), None);
        assert_eq!(normalize_email(Some("  ")).unwrap(), None);
        assert_eq!(
            normalize_email(Some(" a@b.org ")).unwrap().as_deref(),
            Some("a@b.org")
        );
        assert!(normalize_email(Some("nobody")).is_err());
        assert!(normalize_email(Some("@b.org")).is_err());
    }

    #[test]
    fn placeholder_password_never_parses() {
        assert!(PasswordHash::new(NO_PASSWORD).is_err());
    }
}
