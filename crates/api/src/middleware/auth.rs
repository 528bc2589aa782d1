//! Authentication extractors for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use lumen_core::error::CoreError;
use lumen_core::signature::sha256_hex;
use lumen_core::types::DbId;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from a JWT Bearer token in the
/// `Authorization` header.
///
/// Use this as an extractor parameter in any handler that requires
/// authentication:
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's internal database id (from `claims.sub`).
    pub user_id: DbId,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Auth("Missing Authorization header".into()))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Auth(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        let claims = validate_token(token, &state.config.jwt)
            .map_err(|_| AppError::Core(CoreError::Auth("Invalid or expired token".into())))?;

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

/// Caller of the server-to-server process endpoint: either a trusted
/// internal caller presenting the `X-Internal-Secret` header (scheduler,
/// operator tooling), or an authenticated user with a bearer token.
#[derive(Debug, Clone)]
pub enum ProcessCaller {
    Internal,
    User(DbId),
}

impl FromRequestParts<AppState> for ProcessCaller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get("x-internal-secret")
            .and_then(|v| v.to_str().ok());

        if let (Some(provided), Some(expected)) =
            (provided, state.config.internal_api_secret.as_deref())
        {
            // Compare digests so the comparison length does not depend on
            // the secret contents.
            if sha256_hex(provided.as_bytes()) == sha256_hex(expected.as_bytes()) {
                return Ok(ProcessCaller::Internal);
            }
            return Err(AppError::Core(CoreError::Auth(
                "Invalid internal secret".into(),
            )));
        }

        let user = AuthUser::from_request_parts(parts, state).await?;
        Ok(ProcessCaller::User(user.user_id))
    }
}
