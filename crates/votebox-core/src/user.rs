//! Users: guests identified by an opaque token, and registered accounts.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Row id of a user.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// What a user is allowed to do and how much their votes weigh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  /// Created implicitly from a guest token. Votes count once.
  #[default]
  Guest,
  /// Registered with a password.
  User,
  /// May modify every entry.
  Super,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Role::Guest => "guest",
      Role::User => "user",
      Role::Super => "super",
    }
  }

  /// Privileged voters carry the extra score weight.
  pub fn is_privileged(self) -> bool { matches!(self, Role::User | Role::Super) }
}

impl FromStr for Role {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "guest" => Ok(Role::Guest),
      "user" => Ok(Role::User),
      "super" => Ok(Role::Super),
      other => Err(Error::UnknownRole(other.to_owned())),
    }
  }
}

/// A user row. Password material never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:         UserId,
  pub identifier: String,
  pub role:       Role,
}
