//! taskray-core - Core library for taskray
//!
//! This crate contains the remote API client, the sync engine, the local
//! cache, and the models shared by every taskray interface (menu-bar shell,
//! CLI).

pub mod api;
pub mod credentials;
pub mod db;
pub mod error;
pub mod models;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use store::Store;
