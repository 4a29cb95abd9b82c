//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! New timestamps are stored as RFC 3339 strings. Stores written by earlier
//! deployments carry `YYYY-MM-DD HH:MM:SS[.ffffff]` timestamps, read as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use votebox_core::{
  entry::{Entry, EntryId, RenderFormat},
  user::{Role, User, UserId},
  vote::{VoteEvent, VoteType},
};

use crate::{Error, Result};

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
    .map(|naive| naive.and_utc())
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an entries row.
pub struct RawEntry {
  pub id:      i64,
  pub text:    Option<String>,
  pub format:  Option<String>,
  pub user:    Option<i64>,
  pub created: Option<String>,
}

impl RawEntry {
  pub const COLUMNS: &'static str = "id, text, format, user, created";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:      row.get(0)?,
      text:    row.get(1)?,
      format:  row.get(2)?,
      user:    row.get(3)?,
      created: row.get(4)?,
    })
  }

  pub fn into_entry(self) -> Result<Entry> {
    // Untagged rows render as pretty text, which never emits raw markup.
    let format = match self.format.as_deref() {
      Some(f) => f.parse::<RenderFormat>()?,
      None => RenderFormat::PrettyText,
    };
    let author_id = self
      .user
      .map(UserId)
      .ok_or_else(|| Error::Decode(format!("entry {} has no author", self.id)))?;
    let created_at = self
      .created
      .as_deref()
      .ok_or_else(|| Error::Decode(format!("entry {} has no timestamp", self.id)))
      .and_then(decode_dt)?;

    Ok(Entry {
      id: EntryId(self.id),
      text: self.text.unwrap_or_default(),
      format,
      author_id,
      created_at,
    })
  }
}

/// Raw values read directly from a users row.
pub struct RawUser {
  pub id:         i64,
  pub identifier: Option<String>,
  pub role:       Option<String>,
}

impl RawUser {
  pub const COLUMNS: &'static str = "id, identifier, role";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { id: row.get(0)?, identifier: row.get(1)?, role: row.get(2)? })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:         UserId(self.id),
      identifier: self.identifier.unwrap_or_default(),
      role:       decode_role(self.role.as_deref())?,
    })
  }
}

/// Raw values read directly from a votes row.
pub struct RawVote {
  pub id:   i64,
  pub joke: i64,
  pub user: i64,
  pub kind: String,
}

impl RawVote {
  pub fn into_vote(self) -> Result<VoteEvent> {
    Ok(VoteEvent {
      id:       self.id,
      entry_id: EntryId(self.joke),
      user_id:  UserId(self.user),
      kind:     self.kind.parse::<VoteType>()?,
    })
  }
}

/// A missing role column value means the schema default.
pub fn decode_role(s: Option<&str>) -> Result<Role> {
  Ok(s.map(str::parse::<Role>).transpose()?.unwrap_or_default())
}
