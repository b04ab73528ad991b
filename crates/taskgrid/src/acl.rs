//! Access-control evaluation.
//!
//! Maps a principal to the permission strings the surrounding
//! application checks against: one `job:<id>` grant per whitelisted
//! private job, plus `group:admin` for administrators. An unknown
//! principal holds no permissions.

use crate::db::{user_repo, Database, DatabaseError};

pub const ADMIN_GROUP: &str = "group:admin";

pub fn permissions_for(db: &Database, username: &str) -> Result<Vec<String>, DatabaseError> {
    let Some(user) = user_repo::find(db, username)? else {
        return Ok(Vec::new());
    };

    let mut permissions: Vec<String> = user_repo::private_job_ids_for(db, username)?
        .into_iter()
        .map(|job_id| format!("job:{}", job_id))
        .collect();

    if user.is_admin() {
        permissions.push(ADMIN_GROUP.to_string());
    }

    Ok(permissions)
}
