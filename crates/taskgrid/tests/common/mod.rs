//! Shared helpers for integration tests.

use taskgrid::db::{user_repo, Database};
use taskgrid::jobs::GridJobSpec;

/// Opens a fresh in-memory store with migrations applied.
pub fn open_db() -> Database {
    Database::open_in_memory().expect("Failed to create test database")
}

/// Creates plain (non-admin) user accounts.
pub fn seed_users(db: &Database, usernames: &[&str]) {
    for username in usernames {
        user_repo::insert(db, username, false).expect("Failed to seed user");
    }
}

/// A boundary covering `width_cells` x `height_cells` grid cells at
/// zoom 16 (cell edge is roughly 611 m there).
pub fn grid_spec(title: &str, width_cells: i64, height_cells: i64) -> GridJobSpec {
    let cell = 611.0;
    let width = cell * width_cells as f64 - 100.0;
    let height = cell * height_cells as f64 - 100.0;
    GridJobSpec {
        title: title.to_string(),
        geometry: format!(
            "POLYGON((10 10, {w} 10, {w} {h}, 10 {h}, 10 10))",
            w = width,
            h = height
        ),
        zoom: 16,
        author: None,
    }
}
