//! Core types and trait definitions for the votebox entry store.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! ranking fold, markup rendering and credential primitives live here so every
//! backend scores and renders a feed the same way.

pub mod entry;
pub mod error;
pub mod feed;
pub mod generation;
pub mod identity;
pub mod markup;
pub mod store;
pub mod user;
pub mod vote;

pub use error::{Error, Result};
