//! Typed geometry boundary.
//!
//! All WKT entering the system passes through [`parse_wkt`], which yields
//! a typed [`Geom`] value; downstream code never works on raw geometry
//! strings.

pub mod grid;

use geo::Centroid;
use geo_types::{MultiPolygon, Point, Polygon};
use wkt::{ToWkt, TryFromWkt};

use crate::error::GeometryError;

/// A job boundary: a single polygon or a multi-polygon.
#[derive(Debug, Clone, PartialEq)]
pub enum Geom {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl Geom {
    /// Center of mass of the boundary, when it is non-degenerate.
    pub fn centroid(&self) -> Option<Point<f64>> {
        match self {
            Geom::Polygon(polygon) => polygon.centroid(),
            Geom::MultiPolygon(multi) => multi.centroid(),
        }
    }
}

/// Parses WKT text into a typed geometry value.
pub fn parse_wkt(text: &str) -> Result<Geom, GeometryError> {
    let geometry = geo_types::Geometry::<f64>::try_from_wkt_str(text)
        .map_err(|e| GeometryError::InvalidWkt(e.to_string()))?;

    match geometry {
        geo_types::Geometry::Polygon(polygon) => Ok(Geom::Polygon(polygon)),
        geo_types::Geometry::MultiPolygon(multi) => Ok(Geom::MultiPolygon(multi)),
        other => Err(GeometryError::UnsupportedType(kind_name(&other).to_string())),
    }
}

/// Parses WKT that must be a single POLYGON (tile geometry overrides).
pub fn parse_wkt_polygon(text: &str) -> Result<Polygon<f64>, GeometryError> {
    match parse_wkt(text)? {
        Geom::Polygon(polygon) => Ok(polygon),
        Geom::MultiPolygon(_) => {
            Err(GeometryError::UnsupportedType("MULTIPOLYGON".to_string()))
        }
    }
}

/// Serializes a polygon as WKT.
pub fn polygon_to_wkt(polygon: &Polygon<f64>) -> String {
    polygon.wkt_string()
}

fn kind_name(geometry: &geo_types::Geometry<f64>) -> &'static str {
    match geometry {
        geo_types::Geometry::Point(_) => "POINT",
        geo_types::Geometry::Line(_) => "LINE",
        geo_types::Geometry::LineString(_) => "LINESTRING",
        geo_types::Geometry::Polygon(_) => "POLYGON",
        geo_types::Geometry::MultiPoint(_) => "MULTIPOINT",
        geo_types::Geometry::MultiLineString(_) => "MULTILINESTRING",
        geo_types::Geometry::MultiPolygon(_) => "MULTIPOLYGON",
        geo_types::Geometry::GeometryCollection(_) => "GEOMETRYCOLLECTION",
        geo_types::Geometry::Rect(_) => "RECT",
        geo_types::Geometry::Triangle(_) => "TRIANGLE",
    }
}
