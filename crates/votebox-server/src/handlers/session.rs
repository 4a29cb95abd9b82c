//! Handlers for identities.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/session/guest` | Returns `{"token", "user_id"}`; send the token as `X-Guest-Token` |
//! | `POST` | `/login` | Body: `{"name", "password"}`; registers unknown names first |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use votebox_core::{
  identity::{self, Authentication, Registration},
  store::FeedStore,
  user::{User, UserId},
};

use crate::{AppState, auth::describe, error::ApiError};

// ─── Guest ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct GuestSession {
  pub token:   String,
  pub user_id: UserId,
}

/// `POST /session/guest`
pub async fn guest<S>(State(state): State<AppState<S>>) -> Result<impl IntoResponse, ApiError>
where
  S: FeedStore + Clone + 'static,
{
  let token = identity::new_guest_token();
  let user_id = state
    .store
    .resolve_guest(&token)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(GuestSession { token, user_id })))
}

// ─── Login ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub name:     String,
  pub password: String,
}

/// `POST /login`: a free name is registered with the given password, then
/// the pair is verified either way.
pub async fn login<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<LoginBody>,
) -> Result<Json<User>, ApiError>
where
  S: FeedStore + Clone + 'static,
{
  let registration = state
    .store
    .register(&body.name, &body.password)
    .await
    .map_err(ApiError::store)?;
  if registration == Registration::InvalidName {
    return Err(ApiError::BadRequest(describe(Authentication::InvalidName).to_owned()));
  }

  let outcome = state
    .store
    .authenticate(&body.name, &body.password)
    .await
    .map_err(ApiError::store)?;
  let Some(id) = outcome.user_id() else {
    tracing::debug!(reason = describe(outcome), "login rejected");
    return Err(ApiError::Unauthorized);
  };

  let user = state
    .store
    .get_user(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))?;
  Ok(Json(user))
}
