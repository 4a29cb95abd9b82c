//! Error types for `votebox-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown role: {0:?}")]
  UnknownRole(String),

  #[error("unknown vote type: {0:?}")]
  UnknownVoteType(String),

  #[error("unknown render format: {0:?}")]
  UnknownRenderFormat(String),

  #[error("unknown sort mode: {0:?}")]
  UnknownSortMode(String),

  #[error("unknown schema generation: {0:?}")]
  UnknownGeneration(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
