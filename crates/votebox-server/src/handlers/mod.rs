pub mod entries;
pub mod feed;
pub mod session;
