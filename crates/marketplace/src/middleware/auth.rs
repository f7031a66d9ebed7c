//! Session-backed user extractor.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use farmstand_core::UserId;

use crate::error::{AppError, set_sentry_user};
use crate::models::session_keys;
use crate::state::AppState;

/// Extractor that requires a signed-in user.
///
/// Rejects with `401 Unauthorized` when the session carries no user, or when
/// the account it names no longer exists.
///
/// ```rust,ignore
/// async fn show_cart(RequireUser(user_id): RequireUser) -> Result<Json<Cart>> { .. }
/// ```
pub struct RequireUser(pub UserId);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AppError::Unauthorized("no session".to_string()))?;

        let user_id: UserId = session
            .get(session_keys::CURRENT_USER_ID)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| AppError::Unauthorized("sign in required".to_string()))?;

        if state.store().get_user(user_id).await?.is_none() {
            tracing::warn!(user_id = %user_id, "Session names an unknown user");
            return Err(AppError::Unauthorized("sign in required".to_string()));
        }

        set_sentry_user(&user_id);
        Ok(Self(user_id))
    }
}

/// Store the signed-in user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user_id: UserId,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_USER_ID, user_id).await
}
