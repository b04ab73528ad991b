//! Tag repository — free-form labels attached to jobs.

use rusqlite::params;

use super::{Database, DatabaseError};

/// Replaces a job's tag set. Unknown tags are created on the fly.
pub fn set_job_tags(db: &Database, job_id: i64, tags: &[String]) -> Result<(), DatabaseError> {
    db.with_tx(|tx| {
        tx.execute("DELETE FROM job_tags WHERE job_id = ?1", params![job_id])?;
        for tag in tags {
            tx.execute("INSERT OR IGNORE INTO tags (tag) VALUES (?1)", params![tag])?;
            tx.execute(
                "INSERT OR IGNORE INTO job_tags (job_id, tag) VALUES (?1, ?2)",
                params![job_id, tag],
            )?;
        }
        Ok(())
    })
}

/// Tags attached to a job, sorted.
pub fn tags_for_job(db: &Database, job_id: i64) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT tag FROM job_tags WHERE job_id = ?1 ORDER BY tag")?;
        let tags = stmt
            .query_map(params![job_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    })
}

/// All known tags, sorted.
pub fn list_all(db: &Database) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT tag FROM tags ORDER BY tag")?;
        let tags = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    })
}
