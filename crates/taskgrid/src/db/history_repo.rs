//! Tile history repository — append-only versioned snapshots.
//!
//! One row per committed tile mutation, holding the post-mutation field
//! state and a version number that is monotonic per tile key. Rows are
//! never updated or deleted here; only the job cascade removes them.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::tile_repo::{TileKey, TileRow};
use super::{Database, DatabaseError};

/// A historical tile snapshot.
#[derive(Debug, Clone)]
pub struct TileHistoryRow {
    pub id: i64,
    pub x: i64,
    pub y: i64,
    pub zoom: i64,
    pub job_id: i64,
    pub version: i64,
    pub username: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub checkout: bool,
    pub checkin: i64,
    pub change: bool,
    pub comment: Option<String>,
    pub geometry: Option<String>,
    pub import_file: Option<String>,
}

impl TileHistoryRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            x: row.get("x")?,
            y: row.get("y")?,
            zoom: row.get("zoom")?,
            job_id: row.get("job_id")?,
            version: row.get("version")?,
            username: row.get("username")?,
            updated_at: row.get("updated_at")?,
            checkout: row.get("checkout")?,
            checkin: row.get("checkin")?,
            change: row.get("change")?,
            comment: row.get("comment")?,
            geometry: row.get("geometry")?,
            import_file: row.get("import_file")?,
        })
    }
}

/// Appends a snapshot of the given tile state with the next version
/// number for its key. Runs on the caller's connection so it lands in
/// the same transaction as the mutation it records.
pub(crate) fn append_snapshot(conn: &Connection, tile: &TileRow) -> Result<i64, DatabaseError> {
    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) + 1 FROM tile_history
         WHERE x = ?1 AND y = ?2 AND zoom = ?3 AND job_id = ?4",
        params![tile.x, tile.y, tile.zoom, tile.job_id],
        |r| r.get(0),
    )?;

    conn.execute(
        "INSERT INTO tile_history
             (x, y, zoom, job_id, version, username, updated_at, checkout,
              checkin, change, comment, geometry, import_file)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            tile.x,
            tile.y,
            tile.zoom,
            tile.job_id,
            version,
            tile.username,
            tile.updated_at,
            tile.checkout,
            tile.checkin,
            tile.change,
            tile.comment,
            tile.geometry,
            tile.import_file,
        ],
    )?;

    Ok(version)
}

/// All snapshots for a tile key, oldest first.
pub fn versions_for(db: &Database, key: TileKey) -> Result<Vec<TileHistoryRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM tile_history
             WHERE x = ?1 AND y = ?2 AND zoom = ?3 AND job_id = ?4
             ORDER BY version",
        )?;
        let rows = stmt
            .query_map(params![key.x, key.y, key.zoom, key.job_id], |row| {
                TileHistoryRow::from_row(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Highest version recorded for a tile key, 0 when it has no history.
pub fn latest_version(db: &Database, key: TileKey) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        let version: i64 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM tile_history
             WHERE x = ?1 AND y = ?2 AND zoom = ?3 AND job_id = ?4",
            params![key.x, key.y, key.zoom, key.job_id],
            |r| r.get(0),
        )?;
        Ok(version)
    })
}

/// Number of history rows held for a whole job.
pub fn count_for_job(db: &Database, job_id: i64) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM tile_history WHERE job_id = ?1",
            params![job_id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
