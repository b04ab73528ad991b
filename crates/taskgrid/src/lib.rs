pub mod acl;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod geom;
pub mod import;
pub mod jobs;
pub mod progress;

pub use acl::permissions_for;
pub use config::{load_config, Config};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, GeometryError, ImportError, Result, TaskgridError};
pub use jobs::{
    create_grid_job, create_import_job, delete_job, import_job_from_geojson, GridJobSpec,
    ImportJobSpec,
};
