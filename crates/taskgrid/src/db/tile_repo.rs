//! Tile repository — composite-key CRUD and the checkout/checkin
//! lifecycle.
//!
//! Every mutation here is one transaction that applies the field change,
//! stamps the tile's `updated_at`, appends one history snapshot, and
//! refreshes the owning job's cached progress. There are no implicit
//! hooks: the record-then-mutate sequence is spelled out in
//! [`finish_mutation`], and a rollback discards all three effects
//! together.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::GeometryError;
use crate::geom::grid::{self, SpatialRef};
use crate::geom::{self, Geom};

use super::{history_repo, job_repo, Database, DatabaseError};

/// Composite tile identity: a tile is scoped to exactly one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub x: i64,
    pub y: i64,
    pub zoom: i64,
    pub job_id: i64,
}

impl std::fmt::Display for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}) at zoom {} in job {}",
            self.x, self.y, self.zoom, self.job_id
        )
    }
}

/// A raw tile row from the database.
#[derive(Debug, Clone)]
pub struct TileRow {
    pub x: i64,
    pub y: i64,
    pub zoom: i64,
    pub job_id: i64,
    /// Who currently holds the tile, when checked out.
    pub username: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub checkout: bool,
    /// Completion counter: 0 = never completed, >0 = completed. Treated
    /// as an opaque monotonic marker beyond that.
    pub checkin: i64,
    /// Set for tiles altered outside the normal workflow (imports).
    pub change: bool,
    pub comment: Option<String>,
    /// Explicit WKT override for irregular tiles; takes precedence over
    /// the grid formula in [`TileRow::to_polygon`].
    pub geometry: Option<String>,
    pub import_file: Option<String>,
}

impl TileRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            x: row.get("x")?,
            y: row.get("y")?,
            zoom: row.get("zoom")?,
            job_id: row.get("job_id")?,
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

    pub fn key(&self) -> TileKey {
        TileKey {
            x: self.x,
            y: self.y,
            zoom: self.zoom,
            job_id: self.job_id,
        }
    }

    /// Resolves the tile's polygon: the explicit geometry override when
    /// present, otherwise the slippy-grid square for (x, y, zoom).
    pub fn to_polygon(&self, srs: SpatialRef) -> Result<geo_types::Polygon<f64>, GeometryError> {
        if let Some(ref wkt) = self.geometry {
            return geom::parse_wkt_polygon(wkt);
        }
        Ok(grid::square(self.x, self.y, grid::step(self.zoom), srs))
    }

    /// Resolved polygon as a [`Geom`], for intersection queries.
    pub fn to_geom(&self, srs: SpatialRef) -> Result<Geom, GeometryError> {
        self.to_polygon(srs).map(Geom::Polygon)
    }
}

/// Fields supplied when creating tiles in bulk at job construction.
/// Checkout state and the completion counter always start cleared.
#[derive(Debug, Clone)]
pub struct NewTile {
    pub x: i64,
    pub y: i64,
    pub zoom: i64,
    pub geometry: Option<String>,
    pub import_file: Option<String>,
}

/// Finds a tile by its composite key.
pub fn find(db: &Database, key: TileKey) -> Result<Option<TileRow>, DatabaseError> {
    db.with_conn(|conn| find_in_conn(conn, key))
}

/// Lists a job's tiles in deterministic (zoom, x, y) order.
pub fn list_for_job(db: &Database, job_id: i64) -> Result<Vec<TileRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM tiles WHERE job_id = ?1 ORDER BY zoom, x, y",
        )?;
        let tiles = stmt
            .query_map(params![job_id], TileRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tiles)
    })
}

/// Lists the tiles currently assigned to a user, across jobs.
pub fn list_for_user(db: &Database, username: &str) -> Result<Vec<TileRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM tiles WHERE username = ?1 ORDER BY job_id, zoom, x, y",
        )?;
        let tiles = stmt
            .query_map(params![username], TileRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tiles)
    })
}

/// Claims a tile for a user. The flip of the `checkout` flag is a
/// compare-and-swap inside the transaction, so two racing claims cannot
/// both succeed: the loser gets [`DatabaseError::CheckoutConflict`] and
/// no history row.
pub fn checkout(db: &Database, key: TileKey, username: &str) -> Result<TileRow, DatabaseError> {
    db.with_tx(|tx| {
        let now = Utc::now();
        let affected = tx.execute(
            "UPDATE tiles SET checkout = 1, username = ?5, updated_at = ?6
             WHERE x = ?1 AND y = ?2 AND zoom = ?3 AND job_id = ?4 AND checkout = 0",
            params![key.x, key.y, key.zoom, key.job_id, username, now],
        )?;
        if affected == 0 {
            return Err(match find_in_conn(tx, key)? {
                Some(_) => DatabaseError::CheckoutConflict(key),
                None => DatabaseError::TileNotFound(key),
            });
        }
        finish_mutation(tx, key, now)
    })
}

/// Marks a checked-out tile completed: bumps the completion counter and
/// clears the checkout flag. A comment, when given, replaces the tile's
/// comment.
pub fn checkin(
    db: &Database,
    key: TileKey,
    comment: Option<&str>,
) -> Result<TileRow, DatabaseError> {
    db.with_tx(|tx| {
        let now = Utc::now();
        let affected = tx.execute(
            "UPDATE tiles SET checkin = checkin + 1, checkout = 0,
                 comment = COALESCE(?5, comment), updated_at = ?6
             WHERE x = ?1 AND y = ?2 AND zoom = ?3 AND job_id = ?4",
            params![key.x, key.y, key.zoom, key.job_id, comment, now],
        )?;
        if affected == 0 {
            return Err(DatabaseError::TileNotFound(key));
        }
        finish_mutation(tx, key, now)
    })
}

/// Abandons a claim without counting a completion.
pub fn release(db: &Database, key: TileKey) -> Result<TileRow, DatabaseError> {
    db.with_tx(|tx| {
        let now = Utc::now();
        let affected = tx.execute(
            "UPDATE tiles SET checkout = 0, username = NULL, updated_at = ?5
             WHERE x = ?1 AND y = ?2 AND zoom = ?3 AND job_id = ?4",
            params![key.x, key.y, key.zoom, key.job_id, now],
        )?;
        if affected == 0 {
            return Err(DatabaseError::TileNotFound(key));
        }
        finish_mutation(tx, key, now)
    })
}

/// Replaces the tile's free-text comment.
pub fn set_comment(db: &Database, key: TileKey, comment: &str) -> Result<TileRow, DatabaseError> {
    db.with_tx(|tx| {
        let now = Utc::now();
        let affected = tx.execute(
            "UPDATE tiles SET comment = ?5, updated_at = ?6
             WHERE x = ?1 AND y = ?2 AND zoom = ?3 AND job_id = ?4",
            params![key.x, key.y, key.zoom, key.job_id, comment, now],
        )?;
        if affected == 0 {
            return Err(DatabaseError::TileNotFound(key));
        }
        finish_mutation(tx, key, now)
    })
}

/// Flags (or clears) an out-of-band alteration on the tile.
pub fn mark_changed(db: &Database, key: TileKey, changed: bool) -> Result<TileRow, DatabaseError> {
    db.with_tx(|tx| {
        let now = Utc::now();
        let affected = tx.execute(
            "UPDATE tiles SET change = ?5, updated_at = ?6
             WHERE x = ?1 AND y = ?2 AND zoom = ?3 AND job_id = ?4",
            params![key.x, key.y, key.zoom, key.job_id, changed, now],
        )?;
        if affected == 0 {
            return Err(DatabaseError::TileNotFound(key));
        }
        finish_mutation(tx, key, now)
    })
}

/// Replaces a grid tile with its four slippy children at zoom+1. The
/// parent row is removed; its history rows stay (history is only ever
/// deleted by the job cascade). Refused for tiles with an explicit
/// geometry override or a live checkout.
pub fn split(db: &Database, key: TileKey) -> Result<Vec<TileRow>, DatabaseError> {
    db.with_tx(|tx| {
        let tile = find_in_conn(tx, key)?.ok_or(DatabaseError::TileNotFound(key))?;
        if tile.geometry.is_some() {
            return Err(DatabaseError::SplitRefused {
                key,
                reason: "tile has an explicit geometry".to_string(),
            });
        }
        if tile.checkout {
            return Err(DatabaseError::SplitRefused {
                key,
                reason: "tile is checked out".to_string(),
            });
        }

        let now = Utc::now();
        tx.execute(
            "DELETE FROM tiles WHERE x = ?1 AND y = ?2 AND zoom = ?3 AND job_id = ?4",
            params![key.x, key.y, key.zoom, key.job_id],
        )?;

        let mut children = Vec::with_capacity(4);
        for dx in 0..2 {
            for dy in 0..2 {
                let child = TileKey {
                    x: key.x * 2 + dx,
                    y: key.y * 2 + dy,
                    zoom: key.zoom + 1,
                    job_id: key.job_id,
                };
                tx.execute(
                    "INSERT INTO tiles (x, y, zoom, job_id, checkin) VALUES (?1, ?2, ?3, ?4, 0)",
                    params![child.x, child.y, child.zoom, child.job_id],
                )?;
                children.push(
                    find_in_conn(tx, child)?.ok_or(DatabaseError::TileNotFound(child))?,
                );
            }
        }

        job_repo::refresh_progress(tx, key.job_id, now)?;
        Ok(children)
    })
}

fn find_in_conn(conn: &Connection, key: TileKey) -> Result<Option<TileRow>, DatabaseError> {
    conn.query_row(
        "SELECT * FROM tiles WHERE x = ?1 AND y = ?2 AND zoom = ?3 AND job_id = ?4",
        params![key.x, key.y, key.zoom, key.job_id],
        TileRow::from_row,
    )
    .optional()
    .map_err(DatabaseError::Sqlite)
}

/// Shared tail of every tile mutation: snapshot the post-mutation state
/// into the history table, then refresh the owning job's derived fields
/// with the same timestamp the tile was stamped with.
fn finish_mutation(
    conn: &Connection,
    key: TileKey,
    now: DateTime<Utc>,
) -> Result<TileRow, DatabaseError> {
    let tile = find_in_conn(conn, key)?.ok_or(DatabaseError::TileNotFound(key))?;
    history_repo::append_snapshot(conn, &tile)?;
    job_repo::refresh_progress(conn, key.job_id, now)?;
    Ok(tile)
}
