#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! PostgreSQL persistence for the crash result set.
//!
//! Uses `switchy_database` raw SQL against a single `crash_data` table.
//! The table is created on demand; there are no migrations.

pub mod db;
pub mod queries;

use strum_macros::{AsRefStr, Display};

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// How records are written to the `crash_data` table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum WriteMode {
    /// Keep the table and upsert by `crash_id`. Rows from earlier runs that
    /// are not in this result set stay in place.
    #[default]
    Upsert,
    /// Drop and recreate the table before inserting. An interrupted run
    /// leaves the table empty or partially written.
    Replace,
}
