//! Entries: the short submitted texts being voted on.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, user::UserId};

/// Row id of an entry. Ids are assigned in submission order.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntryId(pub i64);

impl fmt::Display for EntryId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// How the stored text is turned into HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
  /// Raw HTML carried over from the first generation. Never written anew.
  #[serde(rename = "html")]
  LegacyHtml,
  /// Plain text with inline `/em/`, `*strong*` and `#tag` markup.
  PrettyText,
}

impl RenderFormat {
  pub fn as_str(self) -> &'static str {
    match self {
      RenderFormat::LegacyHtml => "html",
      RenderFormat::PrettyText => "prettytext",
    }
  }
}

impl FromStr for RenderFormat {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "html" => Ok(RenderFormat::LegacyHtml),
      "prettytext" => Ok(RenderFormat::PrettyText),
      other => Err(Error::UnknownRenderFormat(other.to_owned())),
    }
  }
}

/// A stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
  pub id:         EntryId,
  pub text:       String,
  pub format:     RenderFormat,
  pub author_id:  UserId,
  pub created_at: DateTime<Utc>,
}
