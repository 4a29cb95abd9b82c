//! Vote events, the append-only ledger rows that scores are derived from.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, entry::EntryId, user::UserId};

/// The kind of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
  Up,
  Down,
  /// Soft-delete marker. Hides the entry from everyone but its owner and
  /// superusers.
  Delete,
}

impl VoteType {
  pub fn as_str(self) -> &'static str {
    match self {
      VoteType::Up => "up",
      VoteType::Down => "down",
      VoteType::Delete => "delete",
    }
  }
}

impl FromStr for VoteType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "up" => Ok(VoteType::Up),
      "down" => Ok(VoteType::Down),
      "delete" => Ok(VoteType::Delete),
      other => Err(Error::UnknownVoteType(other.to_owned())),
    }
  }
}

/// A directional vote; the only kinds subject to the one-per-user toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Up,
  Down,
}

impl From<Direction> for VoteType {
  fn from(d: Direction) -> Self {
    match d {
      Direction::Up => VoteType::Up,
      Direction::Down => VoteType::Down,
    }
  }
}

/// A single ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEvent {
  pub id:       i64,
  pub entry_id: EntryId,
  pub user_id:  UserId,
  pub kind:     VoteType,
}
