//! Handlers for the ranked feed.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/entries` | `?filter=&sort=rank\|score\|age\|unread&page=&per_page=` |
//! | `GET`  | `/export`  | `?filter=`; plain text, score order, anonymous view |

use axum::{
  Json,
  extract::{Query, State},
  http::header,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use votebox_core::{
  feed::{self, FeedQuery, RenderedEntry, SortMode},
  store::FeedStore,
};

use crate::{AppState, auth::Caller, error::ApiError};

pub const DEFAULT_PER_PAGE: usize = 10;

#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
  pub filter:   Option<String>,
  pub sort:     Option<String>,
  pub page:     Option<i64>,
  pub per_page: Option<i64>,
}

/// One page of the feed plus the size of the whole filtered feed.
#[derive(Debug, Serialize, Deserialize)]
pub struct FeedPage {
  pub total:    usize,
  pub page:     usize,
  pub per_page: usize,
  pub sort:     SortMode,
  pub entries:  Vec<RenderedEntry>,
}

/// Page bounds from raw parameters. Signs are dropped; a zero page size
/// falls back to the default.
fn page_bounds(page: Option<i64>, per_page: Option<i64>) -> (usize, usize) {
  let to_usize = |n: i64| usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX);
  let per_page = per_page
    .map(to_usize)
    .filter(|n| *n > 0)
    .unwrap_or(DEFAULT_PER_PAGE);
  (page.map(to_usize).unwrap_or(0), per_page)
}

fn search_terms(filter: Option<&str>) -> Vec<String> {
  filter.map(feed::parse_filter).unwrap_or_default()
}

/// `GET /entries`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Caller(viewer): Caller,
  Query(params): Query<FeedParams>,
) -> Result<Json<FeedPage>, ApiError>
where
  S: FeedStore + Clone + 'static,
{
  let query = FeedQuery {
    viewer,
    search: search_terms(params.filter.as_deref()),
    sort: SortMode::parse_or_default(params.sort.as_deref()),
    as_of: None,
  };
  let (page, per_page) = page_bounds(params.page, params.per_page);

  let entries = state
    .store
    .list_feed(&query)
    .await
    .map_err(ApiError::store)?;
  let total = entries.len();
  let entries = entries
    .into_iter()
    .skip(page.saturating_mul(per_page))
    .take(per_page)
    .collect();

  Ok(Json(FeedPage { total, page, per_page, sort: query.sort, entries }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
  pub filter: Option<String>,
}

/// `GET /export`
pub async fn export<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ExportParams>,
) -> Result<impl IntoResponse, ApiError>
where
  S: FeedStore + Clone + 'static,
{
  let query = FeedQuery {
    search: search_terms(params.filter.as_deref()),
    sort: SortMode::Score,
    ..Default::default()
  };
  let entries = state
    .store
    .list_feed(&query)
    .await
    .map_err(ApiError::store)?;

  Ok((
    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
    feed::export_text(&entries),
  ))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn page_bounds_defaults_and_signs() {
    assert_eq!(page_bounds(None, None), (0, DEFAULT_PER_PAGE));
    assert_eq!(page_bounds(Some(2), Some(5)), (2, 5));
    assert_eq!(page_bounds(Some(-1), Some(-3)), (1, 3));
    assert_eq!(page_bounds(None, Some(0)), (0, DEFAULT_PER_PAGE));
  }

  #[test]
  fn filter_underscore_is_a_tag() {
    assert_eq!(search_terms(Some("_cats dogs")), vec!["#cats", "dogs"]);
    assert!(search_terms(None).is_empty());
  }
}
