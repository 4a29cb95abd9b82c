//! JSON HTTP surface for votebox.
//!
//! Exposes an axum [`Router`] backed by any [`FeedStore`]. Callers identify
//! with HTTP Basic credentials or an `X-Guest-Token` header; anonymous callers
//! may read the feed but not write.

pub mod auth;
pub mod error;
pub mod handlers;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use votebox_core::store::FeedStore;

use handlers::{entries, feed, session};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `VOTEBOX_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  /// Identifier granted the superuser role every time the store is opened.
  #[serde(default)]
  pub superuser:  Option<String>,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("votebox.db") }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: FeedStore> {
  pub store: Arc<S>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the votebox [`Router`].
pub fn router<S>(state: AppState<S>) -> Router
where
  S: FeedStore + Clone + 'static,
{
  Router::new()
    // Identities
    .route("/session/guest", post(session::guest::<S>))
    .route("/login", post(session::login::<S>))
    // Feed
    .route("/entries", get(feed::list::<S>).post(entries::create::<S>))
    .route("/export", get(feed::export::<S>))
    // Entries
    .route("/entries/{id}", get(entries::get_one::<S>).put(entries::edit::<S>))
    .route("/entries/{id}/upvote", post(entries::upvote::<S>))
    .route("/entries/{id}/downvote", post(entries::downvote::<S>))
    .route("/entries/{id}/delete", post(entries::delete::<S>))
    .route("/entries/{id}/undelete", post(entries::undelete::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use votebox_store_sqlite::SqliteStore;

  use crate::{
    auth::GUEST_TOKEN_HEADER,
    handlers::{entries::Created, feed::FeedPage, session::GuestSession},
  };

  async fn make_state() -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory(Some("root")).await.unwrap();
    AppState { store: Arc::new(store) }
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn oneshot_raw(
    state:   AppState<SqliteStore>,
    method:  &str,
    uri:     &str,
    headers: Vec<(&str, &str)>,
    body:    Option<Value>,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let body = match body {
      Some(json) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(json.to_string())
      }
      None => Body::empty(),
    };
    router(state).oneshot(builder.body(body).unwrap()).await.unwrap()
  }

  async fn body_bytes(resp: Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()
  }

  async fn guest_token(state: &AppState<SqliteStore>) -> String {
    let resp = oneshot_raw(state.clone(), "POST", "/session/guest", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let session: GuestSession = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    session.token
  }

  async fn login(state: &AppState<SqliteStore>, name: &str, password: &str) -> Response {
    oneshot_raw(
      state.clone(),
      "POST",
      "/login",
      vec![],
      Some(json!({ "name": name, "password": password })),
    ).await
  }

  async fn submit(state: &AppState<SqliteStore>, auth: (&str, &str), text: &str) -> i64 {
    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/entries",
      vec![auth],
      Some(json!({ "text": text })),
    ).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Created = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    created.id.0
  }

  async fn feed(state: &AppState<SqliteStore>, query: &str, headers: Vec<(&str, &str)>) -> FeedPage {
    let resp = oneshot_raw(state.clone(), "GET", &format!("/entries{query}"), headers, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
  }

  // ── Identities ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn guest_session_issues_distinct_tokens() {
    let state = make_state().await;
    let a = guest_token(&state).await;
    let b = guest_token(&state).await;
    assert_ne!(a, b);
    assert_eq!(a.len(), 64);
  }

  #[tokio::test]
  async fn login_registers_then_authenticates() {
    let state = make_state().await;

    let resp = login(&state, "Alice", "secret").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let user: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(user["identifier"], "alice");
    assert_eq!(user["role"], "user");

    assert_eq!(login(&state, "alice", "secret").await.status(), StatusCode::OK);
    let wrong = login(&state, "ALICE", "nope").await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert!(wrong.headers().contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(login(&state, "ab", "secret").await.status(), StatusCode::BAD_REQUEST);
  }

  // ── Writes ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn anonymous_writes_are_rejected() {
    let state = make_state().await;
    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/entries",
      vec![],
      Some(json!({ "text": "hello" })),
    ).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = oneshot_raw(state, "POST", "/entries/1/upvote", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn guest_submits_and_reads_back() {
    let state = make_state().await;
    let token = guest_token(&state).await;
    let id = submit(&state, (GUEST_TOKEN_HEADER, token.as_str()), "a /quiet/ #joke").await;

    let resp = oneshot_raw(state.clone(), "GET", &format!("/entries/{id}"), vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let entry: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(entry["text"], "a /quiet/ #joke");
    assert_eq!(entry["format"], "prettytext");

    let page = feed(&state, "", vec![(GUEST_TOKEN_HEADER, token.as_str())]).await;
    assert_eq!(page.total, 1);
    assert!(page.entries[0].mine);
    assert!(page.entries[0].html.contains("<em>quiet</em>"));

    let missing = oneshot_raw(state, "GET", "/entries/99", vec![], None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn empty_text_is_a_bad_request() {
    let state = make_state().await;
    let token = guest_token(&state).await;
    let resp = oneshot_raw(
      state,
      "POST",
      "/entries",
      vec![(GUEST_TOKEN_HEADER, token.as_str())],
      Some(json!({ "text": "   " })),
    ).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn only_author_or_super_may_edit() {
    let state = make_state().await;
    login(&state, "author", "pw1").await;
    login(&state, "stranger", "pw2").await;
    login(&state, "root", "pw3").await;
    state.store.promote("root").await.unwrap();

    let author = basic("author", "pw1");
    let id = submit(&state, ("authorization", author.as_str()), "draft").await;
    let uri = format!("/entries/{id}");

    let stranger = basic("stranger", "pw2");
    let resp = oneshot_raw(
      state.clone(),
      "PUT",
      &uri,
      vec![("authorization", stranger.as_str())],
      Some(json!({ "text": "vandalised" })),
    ).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = oneshot_raw(
      state.clone(),
      "PUT",
      &uri,
      vec![("authorization", author.as_str())],
      Some(json!({ "text": "final" })),
    ).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let entry: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(entry["text"], "final");

    let root = basic("root", "pw3");
    let resp = oneshot_raw(
      state,
      "PUT",
      &uri,
      vec![("authorization", root.as_str())],
      Some(json!({ "text": "moderated" })),
    ).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn votes_toggle_direction() {
    let state = make_state().await;
    let token = guest_token(&state).await;
    let id = submit(&state, (GUEST_TOKEN_HEADER, token.as_str()), "x").await;
    let h = vec![(GUEST_TOKEN_HEADER, token.as_str())];

    for _ in 0..2 {
      let resp =
        oneshot_raw(state.clone(), "POST", &format!("/entries/{id}/upvote"), h.clone(), None).await;
      assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }
    let page = feed(&state, "?sort=score", h.clone()).await;
    assert_eq!(page.entries[0].score, 1);
    assert!(page.entries[0].upvoted);

    oneshot_raw(state.clone(), "POST", &format!("/entries/{id}/downvote"), h.clone(), None).await;
    let page = feed(&state, "?sort=score", h).await;
    assert_eq!(page.entries[0].score, -1);
    assert!(page.entries[0].downvoted);
    assert!(!page.entries[0].upvoted);

    let resp = oneshot_raw(
      state,
      "POST",
      "/entries/42/upvote",
      vec![(GUEST_TOKEN_HEADER, token.as_str())],
      None,
    ).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn delete_hides_from_others_until_undeleted() {
    let state = make_state().await;
    let owner = guest_token(&state).await;
    let other = guest_token(&state).await;
    let id = submit(&state, (GUEST_TOKEN_HEADER, owner.as_str()), "oops").await;
    submit(&state, (GUEST_TOKEN_HEADER, owner.as_str()), "fine").await;

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      &format!("/entries/{id}/delete"),
      vec![(GUEST_TOKEN_HEADER, other.as_str())],
      None,
    ).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      &format!("/entries/{id}/delete"),
      vec![(GUEST_TOKEN_HEADER, owner.as_str())],
      None,
    ).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    assert_eq!(feed(&state, "", vec![]).await.total, 1);
    let mine = feed(&state, "", vec![(GUEST_TOKEN_HEADER, owner.as_str())]).await;
    assert_eq!(mine.total, 2);
    assert!(mine.entries[1].deleted);
    assert_eq!(mine.entries[1].id.0, id);

    oneshot_raw(
      state.clone(),
      "POST",
      &format!("/entries/{id}/undelete"),
      vec![(GUEST_TOKEN_HEADER, owner.as_str())],
      None,
    ).await;
    assert_eq!(feed(&state, "", vec![]).await.total, 2);
  }

  // ── Reads ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn feed_paginates_filters_and_defaults_sort() {
    let state = make_state().await;
    let token = guest_token(&state).await;
    for i in 0..5 {
      submit(&state, (GUEST_TOKEN_HEADER, token.as_str()), &format!("entry {i} #even{}", i % 2)).await;
    }

    let page = feed(&state, "?page=1&per_page=-2&sort=bogus", vec![]).await;
    assert_eq!(page.total, 5);
    assert_eq!((page.page, page.per_page), (1, 2));
    assert_eq!(page.sort, votebox_core::feed::SortMode::Rank);
    // All ties: ascending id order.
    assert_eq!(page.entries.iter().map(|e| e.id.0).collect::<Vec<_>>(), vec![3, 4]);

    let tagged = feed(&state, "?filter=_even0", vec![]).await;
    assert_eq!(tagged.total, 3);
  }

  #[tokio::test]
  async fn export_joins_plain_text_by_score() {
    let state = make_state().await;
    let token = guest_token(&state).await;
    submit(&state, (GUEST_TOKEN_HEADER, token.as_str()), "first one").await;
    let b = submit(&state, (GUEST_TOKEN_HEADER, token.as_str()), "second").await;
    oneshot_raw(
      state.clone(),
      "POST",
      &format!("/entries/{b}/upvote"),
      vec![(GUEST_TOKEN_HEADER, token.as_str())],
      None,
    ).await;

    let resp = oneshot_raw(state, "GET", "/export", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap().to_string();
    assert!(ct.starts_with("text/plain"), "Content-Type: {ct}");
    let text = String::from_utf8(body_bytes(resp).await).unwrap();
    assert_eq!(text, "second\n\r\n\rfirst one");
  }

  #[tokio::test]
  async fn bad_credentials_are_rejected_even_for_reads() {
    let state = make_state().await;
    let resp = oneshot_raw(
      state,
      "GET",
      "/entries",
      vec![("authorization", basic("nobody", "pw").as_str())],
      None,
    ).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn chosen_guest_tokens_cannot_squat_names() {
    let state = make_state().await;
    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/entries",
      vec![(GUEST_TOKEN_HEADER, "root")],
      Some(json!({ "text": "mine now" })),
    ).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = oneshot_raw(state.clone(), "GET", "/entries", vec![(GUEST_TOKEN_HEADER, "alice")], None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = oneshot_raw(
      state,
      "POST",
      "/login",
      vec![],
      Some(json!({ "name": "root", "password": "pw" })),
    ).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let user: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(user["identifier"], "root");
  }
}
