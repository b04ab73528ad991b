//! Slippy-grid arithmetic over the projected (EPSG:900913) plane.
//!
//! A grid cell (x, y) at zoom z is the axis-aligned square with edge
//! `WORLD_EXTENT / 2^(z-1)` whose lower-left corner sits at
//! `(x * edge, y * edge)` in projected meters. [`tiles_in_geom`] and
//! [`square`] share this convention, so an enumerated cell always
//! resolves back to a polygon that intersects the source geometry.

use geo::{BoundingRect, Intersects};
use geo_types::{Coord, LineString, Polygon, Rect};

use super::Geom;

/// Full projected-map half-width in meters (Web-Mercator half-circumference).
pub const WORLD_EXTENT: f64 = 20_037_508.342_789_244;

/// Relative nudge applied to the bounding-box cell ranges so float noise
/// at exact cell boundaries cannot widen or narrow the candidate range.
const RANGE_EPSILON: f64 = 1e-9;

/// Spatial reference for resolved cell polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialRef {
    /// EPSG:900913 projected meters, the native grid space.
    WebMercator,
    /// EPSG:4326 longitude/latitude degrees.
    Wgs84,
}

/// Edge length in meters of one grid cell at the given zoom.
pub fn step(zoom: i64) -> f64 {
    WORLD_EXTENT / f64::powi(2.0, (zoom - 1) as i32)
}

/// Axis-aligned square polygon for grid cell (x, y) with the given edge
/// length, in the requested spatial reference.
pub fn square(x: i64, y: i64, edge: f64, srs: SpatialRef) -> Polygon<f64> {
    let xmin = x as f64 * edge;
    let ymin = y as f64 * edge;
    let xmax = xmin + edge;
    let ymax = ymin + edge;

    let corners = [
        (xmin, ymin),
        (xmax, ymin),
        (xmax, ymax),
        (xmin, ymax),
        (xmin, ymin),
    ];
    let ring: Vec<Coord<f64>> = corners
        .iter()
        .map(|&(cx, cy)| match srs {
            SpatialRef::WebMercator => Coord { x: cx, y: cy },
            SpatialRef::Wgs84 => to_lonlat(cx, cy),
        })
        .collect();

    Polygon::new(LineString::from(ring), vec![])
}

/// Enumerates the grid cells whose squares intersect the geometry at the
/// given zoom, in row-major order. Deterministic and duplicate-free.
pub fn tiles_in_geom(geom: &Geom, zoom: i64) -> Vec<(i64, i64)> {
    let Some(bounds) = bounding_rect(geom) else {
        return Vec::new();
    };

    let edge = step(zoom);
    let xmin = (bounds.min().x / edge + RANGE_EPSILON).floor() as i64;
    let xmax = (bounds.max().x / edge - RANGE_EPSILON).ceil() as i64;
    let ymin = (bounds.min().y / edge + RANGE_EPSILON).floor() as i64;
    let ymax = (bounds.max().y / edge - RANGE_EPSILON).ceil() as i64;

    let mut cells = Vec::new();
    for x in xmin..xmax {
        for y in ymin..ymax {
            let candidate = square(x, y, edge, SpatialRef::WebMercator);
            if intersects(geom, &candidate) {
                cells.push((x, y));
            }
        }
    }
    cells
}

/// Projects EPSG:900913 meters to EPSG:4326 degrees.
fn to_lonlat(x: f64, y: f64) -> Coord<f64> {
    let lon = x / WORLD_EXTENT * 180.0;
    let lat = f64::sinh(y / WORLD_EXTENT * std::f64::consts::PI)
        .atan()
        .to_degrees();
    Coord { x: lon, y: lat }
}

fn bounding_rect(geom: &Geom) -> Option<Rect<f64>> {
    match geom {
        Geom::Polygon(polygon) => polygon.bounding_rect(),
        Geom::MultiPolygon(multi) => multi.bounding_rect(),
    }
}

fn intersects(geom: &Geom, candidate: &Polygon<f64>) -> bool {
    match geom {
        Geom::Polygon(polygon) => candidate.intersects(polygon),
        Geom::MultiPolygon(multi) => candidate.intersects(multi),
    }
}
