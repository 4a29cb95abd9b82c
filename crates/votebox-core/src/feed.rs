//! The ranked feed: a pure fold over entries and the vote ledger.
//!
//! Scores are never stored. Every feed request loads the entries, the ledger
//! and the privileged user set, then [`build_feed`] tallies the ledger in a
//! single pass and renders, filters and sorts the result.

use std::{
  collections::{HashMap, HashSet},
  str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error,
  entry::{Entry, EntryId},
  markup::{self, SPACE_MARK, TAG_MARK},
  user::{Role, UserId},
  vote::{VoteEvent, VoteType},
};

/// Freshness decay exponent used by [`SortMode::Rank`].
pub const RANK_EXPONENT: f64 = 1.8;

/// Extra weight on top of the base count for a privileged voter's vote.
/// A privileged vote therefore counts ten times.
pub const PRIVILEGED_EXTRA_WEIGHT: i64 = 9;

/// Score reported for soft-deleted entries shown to their owner.
pub const DELETED_SCORE: i64 = -1_000_000;

/// Separator used when exporting plain text.
pub const EXPORT_SEPARATOR: &str = "\n\r\n\r";

// ─── Query ───────────────────────────────────────────────────────────────────

/// Feed ordering. All modes sort descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
  /// Score decayed by age.
  #[default]
  Rank,
  Score,
  /// Newest first.
  Age,
  /// Entries the viewer has not voted on first.
  Unread,
}

impl SortMode {
  pub fn as_str(self) -> &'static str {
    match self {
      SortMode::Rank => "rank",
      SortMode::Score => "score",
      SortMode::Age => "age",
      SortMode::Unread => "unread",
    }
  }

  /// Parse a user-supplied mode, falling back to [`SortMode::Rank`].
  pub fn parse_or_default(s: Option<&str>) -> Self {
    s.and_then(|s| s.parse().ok()).unwrap_or_default()
  }
}

impl FromStr for SortMode {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "rank" => Ok(SortMode::Rank),
      "score" => Ok(SortMode::Score),
      "age" => Ok(SortMode::Age),
      "unread" => Ok(SortMode::Unread),
      other => Err(Error::UnknownSortMode(other.to_owned())),
    }
  }
}

/// Parameters for [`FeedStore::list_feed`](crate::store::FeedStore::list_feed).
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
  /// The user the per-viewer flags are computed for. `None` is anonymous.
  pub viewer: Option<UserId>,
  /// Every term must occur in the entry's plain text, ignoring case.
  pub search: Vec<String>,
  pub sort:   SortMode,
  /// Instant freshness is measured from; defaults to now.
  pub as_of:  Option<DateTime<Utc>>,
}

/// Split a filter query into search terms. A leading `_` stands for `#`.
pub fn parse_filter(filter: &str) -> Vec<String> {
  let filter = match filter.strip_prefix(TAG_MARK) {
    Some(rest) => format!("#{rest}"),
    None => filter.to_owned(),
  };
  filter
    .split(SPACE_MARK)
    .filter(|t| !t.is_empty())
    .map(str::to_owned)
    .collect()
}

// ─── Output ──────────────────────────────────────────────────────────────────

/// An entry as seen by one viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedEntry {
  pub id:         EntryId,
  pub html:       String,
  /// Plain text, used for search and export.
  pub text:       String,
  pub score:      i64,
  /// Age in whole days.
  pub freshness:  i64,
  pub created_at: DateTime<Utc>,
  pub upvoted:    bool,
  pub downvoted:  bool,
  /// The viewer may edit or delete this entry.
  pub mine:       bool,
  pub deleted:    bool,
}

/// Join the plain text of a feed for export.
pub fn export_text(feed: &[RenderedEntry]) -> String {
  feed
    .iter()
    .map(|e| e.text.as_str())
    .collect::<Vec<_>>()
    .join(EXPORT_SEPARATOR)
}

// ─── Fold ────────────────────────────────────────────────────────────────────

/// The viewer resolved against the user table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
  pub id:   UserId,
  pub role: Role,
}

/// Everything [`build_feed`] needs, loaded in one read.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
  pub entries:    Vec<Entry>,
  pub votes:      Vec<VoteEvent>,
  /// Users with role `user` or `super`.
  pub privileged: HashSet<UserId>,
  pub viewer:     Option<Viewer>,
}

#[derive(Debug, Default)]
struct Tally {
  up:          i64,
  down:        i64,
  /// Net privileged votes, counted once more at the extra weight.
  privileged:  i64,
  deleted:     bool,
  viewer_up:   bool,
  viewer_down: bool,
}

impl Tally {
  fn score(&self) -> i64 { self.up - self.down + PRIVILEGED_EXTRA_WEIGHT * self.privileged }
}

fn tally(
  votes: &[VoteEvent],
  privileged: &HashSet<UserId>,
  viewer: Option<UserId>,
) -> HashMap<EntryId, Tally> {
  let mut tallies: HashMap<EntryId, Tally> = HashMap::new();
  for vote in votes {
    let t = tallies.entry(vote.entry_id).or_default();
    let by_viewer = viewer == Some(vote.user_id);
    let weighted = privileged.contains(&vote.user_id);
    match vote.kind {
      VoteType::Up => {
        t.up += 1;
        t.privileged += i64::from(weighted);
        t.viewer_up |= by_viewer;
      }
      VoteType::Down => {
        t.down += 1;
        t.privileged -= i64::from(weighted);
        t.viewer_down |= by_viewer;
      }
      VoteType::Delete => t.deleted = true,
    }
  }
  tallies
}

/// Render, filter and sort `snapshot` for `query`.
pub fn build_feed(
  snapshot: FeedSnapshot,
  query: &FeedQuery,
  now: DateTime<Utc>,
) -> Vec<RenderedEntry> {
  let FeedSnapshot { mut entries, votes, privileged, viewer } = snapshot;
  let viewer_id = viewer.map(|v| v.id);
  let viewer_is_super = viewer.is_some_and(|v| v.role == Role::Super);
  let terms: Vec<String> = query.search.iter().map(|t| t.to_lowercase()).collect();
  let tallies = tally(&votes, &privileged, viewer_id);
  let empty = Tally::default();

  entries.sort_by_key(|e| e.id);

  let mut feed: Vec<RenderedEntry> = entries
    .into_iter()
    .filter_map(|entry| {
      let t = tallies.get(&entry.id).unwrap_or(&empty);
      let mine = viewer_is_super || viewer_id == Some(entry.author_id);
      if t.deleted && !mine {
        return None;
      }

      let rendered = markup::render(&entry.text, entry.format);
      let haystack = rendered.plain.to_lowercase();
      if !terms.iter().all(|term| haystack.contains(term.as_str())) {
        return None;
      }

      Some(RenderedEntry {
        id:         entry.id,
        html:       rendered.html,
        text:       rendered.plain,
        score:      if t.deleted { DELETED_SCORE } else { t.score() },
        freshness:  (now - entry.created_at).num_days().max(0),
        created_at: entry.created_at,
        upvoted:    t.viewer_up,
        downvoted:  t.viewer_down,
        mine,
        deleted:    t.deleted,
      })
    })
    .collect();

  // Stable: equal keys keep ascending id order.
  feed.sort_by(|a, b| {
    a.deleted
      .cmp(&b.deleted)
      .then_with(|| sort_key(b, query.sort).total_cmp(&sort_key(a, query.sort)))
  });
  feed
}

fn sort_key(e: &RenderedEntry, mode: SortMode) -> f64 {
  match mode {
    SortMode::Rank => {
      (e.score + 1) as f64 / ((e.freshness + 1) as f64).powf(RANK_EXPONENT)
    }
    SortMode::Score => e.score as f64,
    SortMode::Age => (1 - e.freshness) as f64,
    SortMode::Unread => {
      if e.upvoted || e.downvoted {
        -e.freshness as f64
      } else {
        e.freshness as f64
      }
    }
  }
}
