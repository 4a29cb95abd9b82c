//! SQLite backend for the votebox entry store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Opening a store first walks its schema
//! forward to the latest generation; see [`MigrationReport`].

mod encode;
mod migrate;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use migrate::{AppliedStep, MigrationReport};
pub use store::SqliteStore;
