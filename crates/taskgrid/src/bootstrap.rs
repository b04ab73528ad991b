//! Initial data seeding.
//!
//! Populates a fresh store with one ordinary user, one admin, and a
//! small example job. Idempotent: an already-populated store is left
//! untouched, and a seed that races a concurrent population backs off
//! instead of surfacing the constraint error. Nothing outside this
//! module swallows duplicate-data errors.

use crate::db::{job_repo, user_repo, Database, DatabaseError};
use crate::error::{Result, TaskgridError};
use crate::jobs::{self, GridJobSpec};

/// Username of the non-admin example account.
pub const SAMPLE_USERNAME: &str = "foo";

const SAMPLE_JOB_TITLE: &str = "Sample mapping job";
const SAMPLE_JOB_ZOOM: i64 = 16;
/// A small area near the projected origin, a few dozen cells at zoom 16.
const SAMPLE_JOB_GEOMETRY: &str =
    "MULTIPOLYGON(((3600 5658300, 6300 5658300, 6300 5661400, 3600 5661400, 3600 5658300)))";

/// Seeds the store when it is empty. Returns whether anything was done.
pub fn initialize(db: &Database, admin_username: &str) -> Result<bool> {
    if user_repo::count(db)? > 0 {
        tracing::info!("store already populated, skipping seed");
        return Ok(false);
    }

    match populate(db, admin_username) {
        Ok(()) => {
            tracing::info!(admin = admin_username, "seeded initial data");
            Ok(true)
        }
        Err(TaskgridError::Database(DatabaseError::Sqlite(ref e))) if is_constraint(e) => {
            tracing::warn!(error = %e, "seed raced an existing population, leaving store as-is");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn populate(db: &Database, admin_username: &str) -> Result<()> {
    user_repo::insert(db, SAMPLE_USERNAME, false)?;
    user_repo::insert(db, admin_username, true)?;

    let mut job = jobs::create_grid_job(
        db,
        &GridJobSpec {
            title: SAMPLE_JOB_TITLE.to_string(),
            geometry: SAMPLE_JOB_GEOMETRY.to_string(),
            zoom: SAMPLE_JOB_ZOOM,
            author: Some(admin_username.to_string()),
        },
    )?;

    job.short_description = "An example job to explore the workflow with".to_string();
    job.task_extra = Some(
        "Use the per-tile .osm extract linked from the job page to seed your editor."
            .to_string(),
    );
    job_repo::update_meta(db, &job)?;

    Ok(())
}

fn is_constraint(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
