//! GeoJSON import source.
//!
//! Fetches a FeatureCollection over HTTP and turns each polygonal
//! feature into an irregular tile geometry: a WKT POLYGON override plus
//! the feature's `import_url` reference when it carries one. Each
//! Polygon feature, and each sub-polygon of a MultiPolygon feature,
//! becomes one tile geometry.

use std::time::Duration;

use geojson::{FeatureCollection, GeoJson};

use crate::error::ImportError;
use crate::geom;

/// One imported tile geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedGeometry {
    /// WKT POLYGON, outer ring plus any holes.
    pub wkt: String,
    /// Value of the feature's `import_url` property, when present.
    pub import_file: Option<String>,
}

/// Fetches the GeoJSON source with a bounded timeout. Not retried; the
/// caller decides whether to try again.
pub fn fetch_source(url: &str, timeout: Duration) -> Result<String, ImportError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ImportError::Fetch {
            url: url.to_string(),
            source: e,
        })?;

    tracing::debug!(url, timeout_secs = timeout.as_secs(), "fetching GeoJSON source");

    client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.text())
        .map_err(|e| ImportError::Fetch {
            url: url.to_string(),
            source: e,
        })
}

/// Parses a FeatureCollection into tile geometries.
///
/// A feature with no geometry is skipped; a feature with a non-polygonal
/// geometry aborts the import, so a job is never built from a partial
/// read of its source.
pub fn tiles_from_geojson(text: &str) -> Result<Vec<ImportedGeometry>, ImportError> {
    let geojson: GeoJson = text.parse()?;
    let collection = FeatureCollection::try_from(geojson)?;

    let mut imported = Vec::new();
    for feature in collection.features {
        let import_file = feature
            .properties
            .as_ref()
            .and_then(|props| props.get("import_url"))
            .and_then(|value| value.as_str())
            .map(str::to_string);

        let Some(geometry) = feature.geometry else {
            tracing::warn!("skipping feature without geometry");
            continue;
        };

        let geometry = geo_types::Geometry::<f64>::try_from(geometry)?;
        match geometry {
            geo_types::Geometry::Polygon(polygon) => {
                imported.push(ImportedGeometry {
                    wkt: geom::polygon_to_wkt(&polygon),
                    import_file,
                });
            }
            geo_types::Geometry::MultiPolygon(multi) => {
                for polygon in multi {
                    imported.push(ImportedGeometry {
                        wkt: geom::polygon_to_wkt(&polygon),
                        import_file: import_file.clone(),
                    });
                }
            }
            other => {
                return Err(ImportError::UnsupportedGeometry(kind_name(&other)));
            }
        }
    }

    Ok(imported)
}

fn kind_name(geometry: &geo_types::Geometry<f64>) -> String {
    match geometry {
        geo_types::Geometry::Point(_) => "Point",
        geo_types::Geometry::Line(_) => "Line",
        geo_types::Geometry::LineString(_) => "LineString",
        geo_types::Geometry::MultiPoint(_) => "MultiPoint",
        geo_types::Geometry::MultiLineString(_) => "MultiLineString",
        geo_types::Geometry::GeometryCollection(_) => "GeometryCollection",
        _ => "unknown",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PART_MULTIPOLYGON: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "MultiPolygon",
                "coordinates": [
                    [[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]]],
                    [[[20.0, 20.0], [30.0, 20.0], [30.0, 30.0], [20.0, 30.0], [20.0, 20.0]]]
                ]
            }
        }]
    }"#;

    #[test]
    fn test_multipolygon_yields_one_geometry_per_part() {
        let imported = tiles_from_geojson(TWO_PART_MULTIPOLYGON).unwrap();
        assert_eq!(imported.len(), 2);
        assert!(imported[0].wkt.starts_with("POLYGON"));
        assert!(imported[0].import_file.is_none());
        assert!(imported[1].import_file.is_none());
        assert_ne!(imported[0].wkt, imported[1].wkt);
    }

    #[test]
    fn test_polygon_feature_with_import_url() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"import_url": "https://example.org/part0.osm"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [5.0, 0.0], [5.0, 5.0], [0.0, 5.0], [0.0, 0.0]]]
                }
            }]
        }"#;
        let imported = tiles_from_geojson(text).unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(
            imported[0].import_file.as_deref(),
            Some("https://example.org/part0.osm")
        );
    }

    #[test]
    fn test_polygon_with_hole_keeps_both_rings() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [
                        [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]],
                        [[4.0, 4.0], [6.0, 4.0], [6.0, 6.0], [4.0, 6.0], [4.0, 4.0]]
                    ]
                }
            }]
        }"#;
        let imported = tiles_from_geojson(text).unwrap();
        assert_eq!(imported.len(), 1);
        let polygon = crate::geom::parse_wkt_polygon(&imported[0].wkt).unwrap();
        assert_eq!(polygon.interiors().len(), 1);
    }

    #[test]
    fn test_rejects_line_feature() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[0.0, 0.0], [1.0, 1.0]]
                }
            }]
        }"#;
        let err = tiles_from_geojson(text).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedGeometry(ref kind) if kind == "LineString"));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = tiles_from_geojson("{\"type\": \"FeatureCollection\"").unwrap_err();
        assert!(matches!(err, ImportError::Parse(_)));
    }

    #[test]
    fn test_skips_feature_without_geometry() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"import_url": "https://example.org/x.osm"},
                "geometry": null
            }]
        }"#;
        let imported = tiles_from_geojson(text).unwrap();
        assert!(imported.is_empty());
    }

    #[test]
    fn test_fetch_unreachable_host_times_out() {
        // Reserved TEST-NET-1 address, nothing listens there.
        let err = fetch_source("http://192.0.2.1/area.geojson", Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(err, ImportError::Fetch { .. }));
    }
}
