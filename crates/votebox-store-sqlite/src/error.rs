//! Error type for `votebox-store-sqlite`.

use thiserror::Error;
use votebox_core::generation::Generation;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] votebox_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("malformed row: {0}")]
  Decode(String),

  /// The token is malformed or names a registered identity.
  #[error("not a guest token: {0:?}")]
  InvalidGuestToken(String),

  /// More than one generation marker table is present.
  #[error("store carries markers of several schema generations: {0:?}")]
  AmbiguousSchema(Vec<Generation>),

  #[error("generation {0} has no normalised tables")]
  UnsupportedGeneration(Generation),

  /// A step failed and was rolled back; the store stays at `from`.
  #[error("migration {from} -> {to} failed: {source}")]
  MigrationStep {
    from:   Generation,
    to:     Generation,
    #[source]
    source: rusqlite::Error,
  },

  #[error("migration {from} -> {to} left the store at {found:?}")]
  StepDidNotAdvance {
    from:  Generation,
    to:    Generation,
    found: Option<Generation>,
  },

  #[error("creating the {0} schema failed: {1}")]
  Bootstrap(Generation, #[source] rusqlite::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
