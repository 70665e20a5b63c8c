use bcrypt::{hash, verify, DEFAULT_COST};
use crate::auth::jwt::sign_token;
use crate::config::AdminAccount;
use crate::dtos::auth::{TokenRequest, TokenResponse};
use crate::error::AppError;
use crate::models::user::User;
use crate::state::AppState;
use axum::{extract::State, Json};
use sqlx::PgPool;
use tracing::{info, instrument};

const BAD_CREDENTIALS: &str = "Unable to log in with provided credentials.";

// POST /token-auth/ - Exchange username/password for a token
#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn obtain_token(
    State(state): State<AppState>,
    payload: TokenRequest
) -> Result<Json<TokenResponse>, AppError> {
    if payload.username.trim().is_empty() {
        return Err(AppError::validation("username: This field may not be blank."));
    }
    if payload.password.is_empty() {
        return Err(AppError::validation("password: This field may not be blank."));
    }

    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, is_active FROM api_user WHERE username = $1"
    )
    .bind(payload.username.trim())
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or_else(|| AppError::validation(BAD_CREDENTIALS))?;

    let password = payload.password;
    let password_hash = user.password_hash.clone();
    let ok = tokio::task::spawn_blocking(move || verify(password, &password_hash))
        .await
        .map_err(|e| AppError::internal(format!("Verify task failed: {e}")))?
        .map_err(|e| AppError::internal(format!("Password verify error: {e}")))?;

    if !ok || !user.is_active {
        return Err(AppError::validation(BAD_CREDENTIALS));
    }

    let token = sign_token(user.id, &user.username, &state.auth.jwt_secret, state.auth.token_ttl_hours)?;
    info!(user_id = user.id, "Token issued");

    Ok(Json(TokenResponse { token }))
}

/// Creates the configured administrator, or resets its password and
/// reactivates it when the account already exists.
pub async fn ensure_admin(db_pool: &PgPool, admin: &AdminAccount) -> Result<(), AppError> {
    let password = admin.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash(password, DEFAULT_COST))
        .await
        .map_err(|e| AppError::internal(format!("Hash task failed: {e}")))?
        .map_err(|e| AppError::internal(format!("Hash error: {e}")))?;

    sqlx::query(
        "INSERT INTO api_user (username, password_hash) VALUES ($1, $2)
         ON CONFLICT (username) DO UPDATE SET password_hash = EXCLUDED.password_hash, is_active = TRUE"
    )
    .bind(&admin.username)
    .bind(password_hash)
    .execute(db_pool)
    .await?;

    info!(username = %admin.username, "Admin account ready");
    Ok(())
}
