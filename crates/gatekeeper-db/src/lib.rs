//! Gatekeeper user store
//!
//! This crate defines the user document, its validation rules and
//! password hashing lifecycle, and the SQLite-backed store via sqlx.

pub mod credentials;
pub mod error;
pub mod models;
pub mod repository;
pub mod utils;

pub use credentials::{HASH_COST, prepare_for_save};
pub use error::DbError;
pub use models::*;
pub use repository::Database;
