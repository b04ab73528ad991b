//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

use super::tile_repo::TileKey;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,

    /// No job row with the given id.
    #[error("No job with id {0}")]
    JobNotFound(i64),

    /// No tile row with the given composite key.
    #[error("No tile {0}")]
    TileNotFound(TileKey),

    /// Checkout lost the compare-and-swap against a live checkout.
    #[error("Tile {0} is already checked out")]
    CheckoutConflict(TileKey),

    /// The tile cannot be split.
    #[error("Tile {key} cannot be split: {reason}")]
    SplitRefused { key: TileKey, reason: String },
}
