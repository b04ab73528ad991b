use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskgridError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("Invalid WKT geometry: {0}")]
    InvalidWkt(String),

    #[error("Unsupported geometry type {0}, expected POLYGON or MULTIPOLYGON")]
    UnsupportedType(String),

    #[error("No tiles could be derived from the geometry")]
    EmptyTileSet,
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to fetch GeoJSON source '{url}': {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse GeoJSON source: {0}")]
    Parse(#[from] geojson::Error),

    #[error("Unsupported feature geometry type {0}, expected Polygon or MultiPolygon")]
    UnsupportedGeometry(String),
}

pub type Result<T> = std::result::Result<T, TaskgridError>;
