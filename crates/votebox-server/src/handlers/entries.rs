//! Handlers for single entries.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/entries` | Body: `{"text": "..."}`; identity required |
//! | `GET`  | `/entries/{id}` | The stored entry; 404 if absent |
//! | `PUT`  | `/entries/{id}` | Body: `{"text": "..."}`; author or superuser |
//! | `POST` | `/entries/{id}/upvote` | Replaces the caller's previous direction |
//! | `POST` | `/entries/{id}/downvote` | Replaces the caller's previous direction |
//! | `POST` | `/entries/{id}/delete` | Soft delete; author or superuser |
//! | `POST` | `/entries/{id}/undelete` | Author or superuser |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use votebox_core::{
  entry::{Entry, EntryId},
  store::FeedStore,
  user::UserId,
  vote::Direction,
};

use crate::{AppState, auth::Authenticated, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct EntryBody {
  pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Created {
  pub id: EntryId,
}

fn non_empty(text: String) -> Result<String, ApiError> {
  if text.trim().is_empty() {
    Err(ApiError::BadRequest("entry text is empty".to_owned()))
  } else {
    Ok(text)
  }
}

async fn load<S: FeedStore>(store: &S, id: EntryId) -> Result<Entry, ApiError> {
  store
    .get_entry(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("entry {id} not found")))
}

/// 404 for a missing entry, 403 if `user` may not modify it.
async fn ensure_may_modify<S: FeedStore>(
  store: &S,
  id: EntryId,
  user: UserId,
) -> Result<(), ApiError> {
  load(store, id).await?;
  if store.may_modify(id, user).await.map_err(ApiError::store)? {
    Ok(())
  } else {
    Err(ApiError::Forbidden)
  }
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /entries`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  Json(body): Json<EntryBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: FeedStore + Clone + 'static,
{
  let text = non_empty(body.text)?;
  let id = state
    .store
    .add_entry(text, user)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(Created { id })))
}

// ─── Get / edit ───────────────────────────────────────────────────────────────

/// `GET /entries/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Entry>, ApiError>
where
  S: FeedStore + Clone + 'static,
{
  Ok(Json(load(state.store.as_ref(), EntryId(id)).await?))
}

/// `PUT /entries/{id}`
pub async fn edit<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  Path(id): Path<i64>,
  Json(body): Json<EntryBody>,
) -> Result<Json<Entry>, ApiError>
where
  S: FeedStore + Clone + 'static,
{
  let id = EntryId(id);
  let text = non_empty(body.text)?;
  ensure_may_modify(state.store.as_ref(), id, user).await?;

  state
    .store
    .edit_entry(id, text)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(load(state.store.as_ref(), id).await?))
}

// ─── Votes ────────────────────────────────────────────────────────────────────

async fn vote<S: FeedStore>(
  store: &S,
  user: UserId,
  id: EntryId,
  direction: Direction,
) -> Result<StatusCode, ApiError> {
  load(store, id).await?;
  store
    .vote(id, user, direction)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /entries/{id}/upvote`
pub async fn upvote<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: FeedStore + Clone + 'static,
{
  vote(state.store.as_ref(), user, EntryId(id), Direction::Up).await
}

/// `POST /entries/{id}/downvote`
pub async fn downvote<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: FeedStore + Clone + 'static,
{
  vote(state.store.as_ref(), user, EntryId(id), Direction::Down).await
}

// ─── Delete / undelete ───────────────────────────────────────────────────────

/// `POST /entries/{id}/delete`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: FeedStore + Clone + 'static,
{
  let id = EntryId(id);
  ensure_may_modify(state.store.as_ref(), id, user).await?;
  state
    .store
    .remove_entry(id, user)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(entry = %id, user = %user, "entry deleted");
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /entries/{id}/undelete`
///
/// Retracts the caller's own ledger rows for the entry, which removes a
/// delete marker only if the caller placed it.
pub async fn undelete<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: FeedStore + Clone + 'static,
{
  let id = EntryId(id);
  ensure_may_modify(state.store.as_ref(), id, user).await?;
  let removed = state
    .store
    .restore_entry(id, user)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(entry = %id, user = %user, removed, "entry restored");
  Ok(StatusCode::NO_CONTENT)
}
