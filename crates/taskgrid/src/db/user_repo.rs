//! User repository — accounts, accepted licenses, private-job access.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw user row from the database.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub username: String,
    pub admin: bool,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            username: row.get("username")?,
            admin: row.get("admin")?,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }
}

/// Inserts a new user.
pub fn insert(db: &Database, username: &str, admin: bool) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO users (username, admin) VALUES (?1, ?2)",
            params![username, admin],
        )?;
        Ok(())
    })
}

/// Finds a user by username.
pub fn find(db: &Database, username: &str) -> Result<Option<UserRow>, DatabaseError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT * FROM users WHERE username = ?1",
            params![username],
            UserRow::from_row,
        )
        .optional()
        .map_err(DatabaseError::Sqlite)
    })
}

/// Lists all users ordered by username.
pub fn list(db: &Database) -> Result<Vec<UserRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM users ORDER BY username")?;
        let users = stmt
            .query_map([], UserRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    })
}

/// Total number of users.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
        Ok(count)
    })
}

/// Records that a user accepted a license.
pub fn accept_license(db: &Database, username: &str, license_id: i64) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO users_licenses (username, license_id) VALUES (?1, ?2)",
            params![username, license_id],
        )?;
        Ok(())
    })
}

/// Whether a user accepted the given license.
pub fn has_accepted_license(
    db: &Database,
    username: &str,
    license_id: i64,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM users_licenses WHERE username = ?1 AND license_id = ?2",
            params![username, license_id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    })
}

/// License ids a user accepted, ascending.
pub fn accepted_license_ids(db: &Database, username: &str) -> Result<Vec<i64>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT license_id FROM users_licenses WHERE username = ?1 ORDER BY license_id",
        )?;
        let ids = stmt
            .query_map(params![username], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    })
}

/// Ids of the private jobs the user is whitelisted on, ascending.
pub fn private_job_ids_for(db: &Database, username: &str) -> Result<Vec<i64>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT j.id FROM jobs j
             JOIN job_whitelists w ON w.job_id = j.id
             WHERE w.username = ?1 AND j.is_private = 1
             ORDER BY j.id",
        )?;
        let ids = stmt
            .query_map(params![username], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    })
}
