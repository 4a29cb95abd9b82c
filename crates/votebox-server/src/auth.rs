//! Viewer extraction: HTTP Basic credentials or a guest token header.

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use votebox_core::{
  identity::{self, Authentication},
  store::FeedStore,
  user::UserId,
};

use crate::{AppState, error::ApiError};

/// Header carrying the token handed out by `POST /session/guest`.
pub const GUEST_TOKEN_HEADER: &str = "x-guest-token";

/// The caller's identity, if any. Anonymous requests extract `Caller(None)`.
pub struct Caller(pub Option<UserId>);

/// An identified caller. Rejects anonymous requests with 401.
pub struct Authenticated(pub UserId);

/// Split a Basic `Authorization` header into name and password.
///
/// `Ok(None)` when the header is absent; a malformed header is rejected.
pub fn basic_credentials(headers: &HeaderMap) -> Result<Option<(String, String)>, ApiError> {
  let Some(header_val) = headers.get(header::AUTHORIZATION) else {
    return Ok(None);
  };
  let header_val = header_val.to_str().map_err(|_| ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;

  let (name, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok(Some((name.to_owned(), password.to_owned())))
}

/// Resolve the caller. Credentials, when sent, must verify; a guest token
/// must be one the server issued and names (and if new, creates) a guest
/// identity.
pub async fn identify<S: FeedStore>(
  headers: &HeaderMap,
  store: &S,
) -> Result<Option<UserId>, ApiError> {
  if let Some((name, password)) = basic_credentials(headers)? {
    let outcome = store
      .authenticate(&name, &password)
      .await
      .map_err(ApiError::store)?;
    return outcome.user_id().map(Some).ok_or(ApiError::Unauthorized);
  }

  let token = headers
    .get(GUEST_TOKEN_HEADER)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|t| !t.is_empty());
  match token {
    Some(token) if identity::is_guest_token(token) => {
      let id = store.resolve_guest(token).await.map_err(ApiError::store)?;
      Ok(Some(id))
    }
    Some(_) => Err(ApiError::Unauthorized),
    None => Ok(None),
  }
}

impl<S> FromRequestParts<AppState<S>> for Caller
where
  S: FeedStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    identify(&parts.headers, state.store.as_ref()).await.map(Caller)
  }
}

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: FeedStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    identify(&parts.headers, state.store.as_ref())
      .await?
      .map(Authenticated)
      .ok_or(ApiError::Unauthorized)
  }
}

/// Reason reported for a login attempt.
pub fn describe(outcome: Authentication) -> &'static str {
  match outcome {
    Authentication::Authenticated(_) => "authenticated",
    Authentication::InvalidName => "invalid username",
    Authentication::NotFound => "unknown user",
    Authentication::WrongPassword => "wrong password",
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::{HeaderValue, Request};
  use votebox_store_sqlite::SqliteStore;

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut builder = Request::builder();
    for (k, v) in pairs {
      builder = builder.header(*k, *v);
    }
    builder.body(()).unwrap().into_parts().0.headers
  }

  #[test]
  fn parses_basic_credentials() {
    let h = headers(&[("authorization", basic("alice", "pa:ss").as_str())]);
    assert_eq!(
      basic_credentials(&h).unwrap(),
      Some(("alice".to_string(), "pa:ss".to_string()))
    );
  }

  #[test]
  fn absent_header_is_anonymous() {
    assert_eq!(basic_credentials(&HeaderMap::new()).unwrap(), None);
  }

  #[test]
  fn rejects_malformed_headers() {
    let no_colon = format!("Basic {}", B64.encode("nocolon"));
    for bad in ["Bearer abc", "Basic !!!not-base64!!!", no_colon.as_str()] {
      let h = headers(&[("authorization", bad)]);
      assert!(matches!(basic_credentials(&h), Err(ApiError::Unauthorized)), "{bad}");
    }
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_bytes(b"Basic \xff").unwrap());
    assert!(matches!(basic_credentials(&h), Err(ApiError::Unauthorized)));
  }

  #[tokio::test]
  async fn identifies_by_credentials_then_token() {
    let store = SqliteStore::open_in_memory(None).await.unwrap();
    store.register("alice", "secret").await.unwrap();

    let id = identify(&headers(&[("authorization", basic("Alice", "secret").as_str())]), &store)
      .await
      .unwrap();
    assert_eq!(id, store.find_user("alice").await.unwrap().map(|u| u.id));

    let wrong = identify(&headers(&[("authorization", basic("alice", "nope").as_str())]), &store).await;
    assert!(matches!(wrong, Err(ApiError::Unauthorized)));

    let token = identity::new_guest_token();
    let guest = identify(&headers(&[(GUEST_TOKEN_HEADER, token.as_str())]), &store).await.unwrap();
    assert!(guest.is_some());
    let again = identify(&headers(&[(GUEST_TOKEN_HEADER, token.as_str())]), &store).await.unwrap();
    assert_eq!(guest, again);

    assert_eq!(identify(&HeaderMap::new(), &store).await.unwrap(), None);
  }

  #[tokio::test]
  async fn rejects_tokens_the_server_never_issued() {
    let store = SqliteStore::open_in_memory(Some("root")).await.unwrap();
    store.register("alice", "secret").await.unwrap();

    for token in ["alice", "ALICE", "root", "tok"] {
      let res = identify(&headers(&[(GUEST_TOKEN_HEADER, token)]), &store).await;
      assert!(matches!(res, Err(ApiError::Unauthorized)), "{token}");
    }
    assert!(store.find_user("root").await.unwrap().is_none());
    assert_eq!(
      store.authenticate("alice", "secret").await.unwrap().user_id(),
      store.find_user("alice").await.unwrap().map(|u| u.id)
    );
  }
}
