//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations
//! - Change feed for live listeners

mod database;
mod models;

pub use database::Database;
pub use models::*;
