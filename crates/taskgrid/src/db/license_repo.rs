//! License repository — reference data attached to jobs.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone)]
pub struct LicenseRow {
    pub id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub plain_text: Option<String>,
}

impl LicenseRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            plain_text: row.get("plain_text")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewLicense {
    pub name: Option<String>,
    pub description: Option<String>,
    pub plain_text: Option<String>,
}

/// Inserts a license and returns its id.
pub fn insert(db: &Database, license: &NewLicense) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO licenses (name, description, plain_text) VALUES (?1, ?2, ?3)",
            params![license.name, license.description, license.plain_text],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn find_by_id(db: &Database, id: i64) -> Result<Option<LicenseRow>, DatabaseError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT * FROM licenses WHERE id = ?1",
            params![id],
            LicenseRow::from_row,
        )
        .optional()
        .map_err(DatabaseError::Sqlite)
    })
}

pub fn list(db: &Database) -> Result<Vec<LicenseRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM licenses ORDER BY id")?;
        let licenses = stmt
            .query_map([], LicenseRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(licenses)
    })
}
