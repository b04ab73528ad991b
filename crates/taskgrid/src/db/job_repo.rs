//! Job repository — CRUD operations for the `jobs` table.
//!
//! Job creation is always paired with the full tile set in one
//! transaction: a job is never persisted partially populated.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

use crate::progress::{self, TileProgress};

use super::tile_repo::NewTile;
use super::{Database, DatabaseError};

/// Publication state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Archived = 0,
    Published = 1,
    Draft = 2,
}

impl JobStatus {
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(JobStatus::Archived),
            1 => Some(JobStatus::Published),
            2 => Some(JobStatus::Draft),
            _ => None,
        }
    }
}

impl FromSql for JobStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = i64::column_result(value)?;
        JobStatus::from_i64(raw).ok_or(FromSqlError::OutOfRange(raw))
    }
}

impl ToSql for JobStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(*self as i64))
    }
}

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: i64,
    pub title: String,
    pub status: JobStatus,
    pub description: String,
    pub short_description: String,
    /// Boundary WKT; `None` for imported jobs, whose shape lives on the tiles.
    pub geometry: Option<String>,
    /// Grid zoom; `None` for imported jobs.
    pub zoom: Option<i64>,
    pub task_extra: Option<String>,
    pub workflow: String,
    pub imagery: Option<String>,
    pub josm_preset: Option<String>,
    pub is_private: bool,
    pub featured: bool,
    /// Cached percent done, recomputed from tiles on every tile mutation.
    pub done: i64,
    /// Cached most-recent tile update, stamped on every tile mutation.
    pub last_update: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub license_id: Option<i64>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            status: row.get("status")?,
            description: row.get("description")?,
            short_description: row.get("short_description")?,
            geometry: row.get("geometry")?,
            zoom: row.get("zoom")?,
            task_extra: row.get("task_extra")?,
            workflow: row.get("workflow")?,
            imagery: row.get("imagery")?,
            josm_preset: row.get("josm_preset")?,
            is_private: row.get("is_private")?,
            featured: row.get("featured")?,
            done: row.get("done")?,
            last_update: row.get("last_update")?,
            author: row.get("author")?,
            license_id: row.get("license_id")?,
        })
    }
}

/// Fields supplied when creating a job. Everything else starts at the
/// published defaults and is edited afterwards via [`update_meta`].
#[derive(Debug, Clone)]
pub struct NewJob {
    pub title: String,
    pub geometry: Option<String>,
    pub zoom: Option<i64>,
    pub author: Option<String>,
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub author: Option<String>,
    pub featured: Option<bool>,
    pub is_private: Option<bool>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new job row together with its full tile set, atomically.
pub fn insert_with_tiles(
    db: &Database,
    job: &NewJob,
    tiles: &[NewTile],
) -> Result<JobRow, DatabaseError> {
    db.with_tx(|tx| {
        tx.execute(
            "INSERT INTO jobs (title, status, geometry, zoom, author)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                job.title,
                JobStatus::Published,
                job.geometry,
                job.zoom,
                job.author
            ],
        )?;
        let job_id = tx.last_insert_rowid();

        let mut stmt = tx.prepare(
            "INSERT INTO tiles (x, y, zoom, job_id, checkin, geometry, import_file)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
        )?;
        for tile in tiles {
            stmt.execute(params![
                tile.x,
                tile.y,
                tile.zoom,
                job_id,
                tile.geometry,
                tile.import_file
            ])?;
        }
        drop(stmt);

        find_in_conn(tx, job_id)?.ok_or(DatabaseError::JobNotFound(job_id))
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| find_in_conn(conn, id))
}

/// Finds a job by its unique title.
pub fn find_by_title(db: &Database, title: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT * FROM jobs WHERE title = ?1",
            params![title],
            JobRow::from_row,
        )
        .optional()
        .map_err(DatabaseError::Sqlite)
    })
}

pub(crate) fn find_in_conn(conn: &Connection, id: i64) -> Result<Option<JobRow>, DatabaseError> {
    conn.query_row(
        "SELECT * FROM jobs WHERE id = ?1",
        params![id],
        JobRow::from_row,
    )
    .optional()
    .map_err(DatabaseError::Sqlite)
}

/// Queries jobs with filters, returning (rows, total_count).
pub fn query(db: &Database, filter: &JobFilter) -> Result<(Vec<JobRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status));
        }
        if let Some(ref author) = filter.author {
            conditions.push(format!("author = ?{}", param_values.len() + 1));
            param_values.push(Box::new(author.clone()));
        }
        if let Some(featured) = filter.featured {
            conditions.push(format!("featured = ?{}", param_values.len() + 1));
            param_values.push(Box::new(featured));
        }
        if let Some(is_private) = filter.is_private {
            conditions.push(format!("is_private = ?{}", param_values.len() + 1));
            param_values.push(Box::new(is_private));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        // Count total matching rows.
        let count_sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
        let params_ref: Vec<&dyn ToSql> = param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        // Fetch paginated results, newest jobs first.
        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM jobs {} ORDER BY id DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn ToSql> = param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<JobRow> = stmt
            .query_map(params_ref.as_slice(), JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: JobStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Updates a job's editable metadata. Geometry, zoom, and the derived
/// progress fields are never written through this path.
pub fn update_meta(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET title=?2, status=?3, description=?4, short_description=?5,
             task_extra=?6, workflow=?7, imagery=?8, josm_preset=?9, is_private=?10,
             featured=?11, author=?12, license_id=?13
             WHERE id=?1",
            params![
                job.id,
                job.title,
                job.status,
                job.description,
                job.short_description,
                job.task_extra,
                job.workflow,
                job.imagery,
                job.josm_preset,
                job.is_private,
                job.featured,
                job.author,
                job.license_id,
            ],
        )?;
        Ok(())
    })
}

/// Deletes a job; tiles, history, whitelist and tag links cascade.
pub fn delete(db: &Database, id: i64) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    })
}

/// Grants a user access to a private job.
pub fn add_to_whitelist(db: &Database, job_id: i64, username: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO job_whitelists (job_id, username) VALUES (?1, ?2)",
            params![job_id, username],
        )?;
        Ok(())
    })
}

pub fn remove_from_whitelist(
    db: &Database,
    job_id: i64,
    username: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "DELETE FROM job_whitelists WHERE job_id = ?1 AND username = ?2",
            params![job_id, username],
        )?;
        Ok(())
    })
}

/// Usernames whitelisted on the given job.
pub fn whitelisted_users(db: &Database, job_id: i64) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT username FROM job_whitelists WHERE job_id = ?1 ORDER BY username",
        )?;
        let users = stmt
            .query_map(params![job_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(users)
    })
}

/// Recomputes the job's cached `done` percentage from its current tile
/// set and stamps `last_update`. Runs on the caller's connection so tile
/// mutations fold it into their own transaction.
pub(crate) fn refresh_progress(
    conn: &Connection,
    job_id: i64,
    now: DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    let zoom: Option<Option<i64>> = conn
        .query_row("SELECT zoom FROM jobs WHERE id = ?1", params![job_id], |r| {
            r.get(0)
        })
        .optional()?;
    let Some(zoom) = zoom else {
        return Err(DatabaseError::JobNotFound(job_id));
    };

    let mut stmt = conn.prepare("SELECT zoom, checkin, updated_at FROM tiles WHERE job_id = ?1")?;
    let tiles = stmt
        .query_map(params![job_id], |row| {
            Ok(TileProgress {
                zoom: row.get(0)?,
                checkin: row.get(1)?,
                update: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let done = progress::percent_done(zoom, &tiles);
    conn.execute(
        "UPDATE jobs SET done = ?2, last_update = ?3 WHERE id = ?1",
        params![job_id, done, now],
    )?;
    Ok(done)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_job(title: &str) -> NewJob {
        NewJob {
            title: title.to_string(),
            geometry: Some("POLYGON((0 0, 2000 0, 2000 2000, 0 2000, 0 0))".to_string()),
            zoom: Some(16),
            author: None,
        }
    }

    fn grid_tiles(count: i64, zoom: i64) -> Vec<NewTile> {
        (0..count)
            .map(|x| NewTile {
                x,
                y: 0,
                zoom,
                geometry: None,
                import_file: None,
            })
            .collect()
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let job = insert_with_tiles(&db, &sample_job("Area 1"), &grid_tiles(4, 16)).unwrap();

        assert_eq!(job.title, "Area 1");
        assert_eq!(job.status, JobStatus::Published);
        assert_eq!(job.zoom, Some(16));
        assert_eq!(job.done, 0);
        assert!(job.last_update.is_none());

        let found = find_by_id(&db, job.id).unwrap().unwrap();
        assert_eq!(found.title, "Area 1");

        let by_title = find_by_title(&db, "Area 1").unwrap().unwrap();
        assert_eq!(by_title.id, job.id);
    }

    #[test]
    fn test_insert_populates_all_tiles() {
        let db = test_db();
        let job = insert_with_tiles(&db, &sample_job("Area 2"), &grid_tiles(9, 16)).unwrap();

        db.with_conn(|conn| {
            let count: u32 = conn.query_row(
                "SELECT COUNT(*) FROM tiles WHERE job_id = ?1",
                params![job.id],
                |r| r.get(0),
            )?;
            assert_eq!(count, 9);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_duplicate_title_rejected_and_no_partial_job() {
        let db = test_db();
        insert_with_tiles(&db, &sample_job("Area 3"), &grid_tiles(2, 16)).unwrap();

        let err = insert_with_tiles(&db, &sample_job("Area 3"), &grid_tiles(2, 16));
        assert!(err.is_err());

        let (_, total) = query(&db, &JobFilter::default()).unwrap();
        assert_eq!(total, 1);
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, 42).unwrap().is_none());
        assert!(find_by_title(&db, "missing").unwrap().is_none());
    }

    #[test]
    fn test_query_with_status_filter() {
        let db = test_db();
        let job = insert_with_tiles(&db, &sample_job("Draft job"), &grid_tiles(1, 16)).unwrap();
        insert_with_tiles(&db, &sample_job("Published job"), &grid_tiles(1, 16)).unwrap();

        let mut draft = job;
        draft.status = JobStatus::Draft;
        update_meta(&db, &draft).unwrap();

        let (rows, total) = query(
            &db,
            &JobFilter {
                status: Some(JobStatus::Draft),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].title, "Draft job");
    }

    #[test]
    fn test_query_pagination() {
        let db = test_db();
        for i in 0..10 {
            insert_with_tiles(&db, &sample_job(&format!("Job {}", i)), &grid_tiles(1, 16))
                .unwrap();
        }

        let (rows, total) = query(
            &db,
            &JobFilter {
                limit: Some(3),
                offset: Some(0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 10);
        assert_eq!(rows.len(), 3);
        // Newest first.
        assert_eq!(rows[0].title, "Job 9");
    }

    #[test]
    fn test_update_meta() {
        let db = test_db();
        let mut job = insert_with_tiles(&db, &sample_job("Area 4"), &grid_tiles(1, 16)).unwrap();

        job.description = "A longer text".to_string();
        job.short_description = "Short".to_string();
        job.is_private = true;
        job.featured = true;
        job.status = JobStatus::Archived;
        update_meta(&db, &job).unwrap();

        let found = find_by_id(&db, job.id).unwrap().unwrap();
        assert_eq!(found.description, "A longer text");
        assert_eq!(found.short_description, "Short");
        assert!(found.is_private);
        assert!(found.featured);
        assert_eq!(found.status, JobStatus::Archived);
        // Derived fields untouched.
        assert_eq!(found.done, 0);
    }

    #[test]
    fn test_count_by_status() {
        let db = test_db();
        insert_with_tiles(&db, &sample_job("c1"), &grid_tiles(1, 16)).unwrap();
        insert_with_tiles(&db, &sample_job("c2"), &grid_tiles(1, 16)).unwrap();

        assert_eq!(count_by_status(&db, JobStatus::Published).unwrap(), 2);
        assert_eq!(count_by_status(&db, JobStatus::Archived).unwrap(), 0);
    }

    #[test]
    fn test_delete_cascades_to_tiles() {
        let db = test_db();
        let job = insert_with_tiles(&db, &sample_job("Area 5"), &grid_tiles(4, 16)).unwrap();

        assert!(delete(&db, job.id).unwrap());
        assert!(!delete(&db, job.id).unwrap());

        db.with_conn(|conn| {
            let count: u32 = conn.query_row(
                "SELECT COUNT(*) FROM tiles WHERE job_id = ?1",
                params![job.id],
                |r| r.get(0),
            )?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_whitelist_round_trip() {
        let db = test_db();
        let job = insert_with_tiles(&db, &sample_job("Private area"), &grid_tiles(1, 16)).unwrap();
        db.with_conn(|conn| {
            conn.execute("INSERT INTO users (username, admin) VALUES ('alice', 0)", [])?;
            Ok(())
        })
        .unwrap();

        add_to_whitelist(&db, job.id, "alice").unwrap();
        add_to_whitelist(&db, job.id, "alice").unwrap(); // idempotent
        assert_eq!(whitelisted_users(&db, job.id).unwrap(), vec!["alice"]);

        remove_from_whitelist(&db, job.id, "alice").unwrap();
        assert!(whitelisted_users(&db, job.id).unwrap().is_empty());
    }

    #[test]
    fn test_job_status_round_trip() {
        assert_eq!(JobStatus::from_i64(0), Some(JobStatus::Archived));
        assert_eq!(JobStatus::from_i64(1), Some(JobStatus::Published));
        assert_eq!(JobStatus::from_i64(2), Some(JobStatus::Draft));
        assert_eq!(JobStatus::from_i64(3), None);
    }
}
