//! Schema generations, the fixed linear chain a store walks through.
//!
//! A store is in exactly one generation at a time. Each generation is
//! recognised by the name of its entries table; the chain only ever advances
//! one edge at a time via [`Generation::next`].

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// A named schema version. Ordered oldest to newest.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
  /// Flat entries table with vote counters, votes keyed by voter IP.
  V0,
  /// Entries, users and typed votes split into separate tables.
  V1,
  /// Users gain role, password and salt.
  V1a,
  /// `report` votes folded into `down`, `markdown` format renamed.
  V1b,
  /// Entries carry a creation timestamp; identifiers are lowercase.
  V1c,
}

impl Generation {
  /// Every generation, oldest first.
  pub const ALL: [Generation; 5] = [
    Generation::V0,
    Generation::V1,
    Generation::V1a,
    Generation::V1b,
    Generation::V1c,
  ];

  /// The generation new stores are created in and old ones migrate towards.
  pub const LATEST: Generation = Generation::V1c;

  pub fn as_str(self) -> &'static str {
    match self {
      Generation::V0 => "v0",
      Generation::V1 => "v1",
      Generation::V1a => "v1a",
      Generation::V1b => "v1b",
      Generation::V1c => "v1c",
    }
  }

  /// The table whose presence identifies this generation.
  pub fn marker(self) -> &'static str {
    match self {
      Generation::V0 => "jokes",
      Generation::V1 => "v1_jokes",
      Generation::V1a => "v1a_jokes",
      Generation::V1b => "v1b_jokes",
      Generation::V1c => "v1c_jokes",
    }
  }

  /// The generation reached by the single outgoing edge, if any.
  pub fn next(self) -> Option<Generation> {
    match self {
      Generation::V0 => Some(Generation::V1),
      Generation::V1 => Some(Generation::V1a),
      Generation::V1a => Some(Generation::V1b),
      Generation::V1b => Some(Generation::V1c),
      Generation::V1c => None,
    }
  }

  /// Resolve the generation owning a marker table name.
  pub fn from_marker(table: &str) -> Option<Generation> {
    Self::ALL.into_iter().find(|g| g.marker() == table)
  }

  /// Table names for the three normalised tables of this generation.
  ///
  /// `None` for [`Generation::V0`], which predates the normalised layout.
  pub fn tables(self) -> Option<Tables> {
    let prefix = match self {
      Generation::V0 => return None,
      Generation::V1 => "v1",
      Generation::V1a => "v1a",
      Generation::V1b => "v1b",
      Generation::V1c => "v1c",
    };
    Some(Tables {
      entries: format!("{prefix}_jokes"),
      users:   format!("{prefix}_users"),
      votes:   format!("{prefix}_votes"),
    })
  }
}

impl fmt::Display for Generation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Generation {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|g| g.as_str() == s)
      .ok_or_else(|| Error::UnknownGeneration(s.to_owned()))
  }
}

/// Concrete table names, resolved once for a generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
  pub entries: String,
  pub users:   String,
  pub votes:   String,
}
