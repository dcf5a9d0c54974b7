//! Export GeoJSON des POI stockés (géométries écrites par geozero)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use serde_json::{json, Value};

use crate::record::StoredPoi;

/// Écrit une FeatureCollection dans un fichier et retourne le nombre de features
pub fn export_to_geojson(pois: &[StoredPoi], output_path: &Path) -> Result<usize> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    write_feature_collection(&mut writer, pois)?;
    writer.flush()?;
    Ok(pois.len())
}

/// Écrit une FeatureCollection WGS84
pub fn write_feature_collection<W: Write>(writer: &mut W, pois: &[StoredPoi]) -> Result<()> {
    write!(writer, r#"{{"type":"FeatureCollection","features":["#)?;
    for (i, poi) in pois.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(writer, poi)?;
    }
    write!(writer, "]}}")?;
    Ok(())
}

fn write_feature<W: Write>(writer: &mut W, poi: &StoredPoi) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","id":{},"geometry":"#, poi.id)?;

    let mut geom_buf = Vec::new();
    {
        let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
        poi.record
            .geometry
            .process_geom(&mut geom_writer)
            .with_context(|| format!("Failed to encode geometry of POI {}", poi.id))?;
    }
    writer.write_all(&geom_buf)?;

    write!(writer, r#","properties":"#)?;
    serde_json::to_writer(&mut *writer, &feature_properties(poi))?;
    write!(writer, "}}")?;
    Ok(())
}

fn feature_properties(poi: &StoredPoi) -> Value {
    let record = &poi.record;
    json!({
        "id": poi.id,
        "name": record.name,
        "poi_type": record.category,
        "address": record.address,
        "geom_type": record.geometry_type(),
        "properties": record.properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CanonicalRecord;
    use geo::{point, polygon, Geometry};

    fn pois() -> Vec<StoredPoi> {
        vec![
            StoredPoi {
                id: 1,
                record: CanonicalRecord {
                    name: "Fontaine \"Wallace\"".into(),
                    category: Some("fountain".into()),
                    address: None,
                    geometry: Geometry::Point(point!(x: 2.35, y: 48.85)),
                    properties: json!({"potable": true}).as_object().cloned(),
                },
            },
            StoredPoi {
                id: 2,
                record: CanonicalRecord {
                    name: "Square".into(),
                    category: None,
                    address: Some("Place X".into()),
                    geometry: Geometry::Polygon(polygon![
                        (x: 0.0, y: 0.0),
                        (x: 1.0, y: 0.0),
                        (x: 1.0, y: 1.0),
                        (x: 0.0, y: 0.0),
                    ]),
                    properties: None,
                },
            },
        ]
    }

    #[test]
    fn test_feature_collection_is_valid_geojson() {
        let mut out = Vec::new();
        write_feature_collection(&mut out, &pois()).unwrap();

        let text = String::from_utf8(out).unwrap();
        let parsed: geojson::GeoJson = text.parse().unwrap();
        let geojson::GeoJson::FeatureCollection(fc) = parsed else {
            panic!("Expected a FeatureCollection");
        };
        assert_eq!(fc.features.len(), 2);

        let first = fc.features[0].properties.as_ref().unwrap();
        assert_eq!(first["name"], "Fontaine \"Wallace\"");
        assert_eq!(first["poi_type"], "fountain");
        assert_eq!(first["geom_type"], "Point");
        assert_eq!(first["properties"]["potable"], true);

        let second = fc.features[1].properties.as_ref().unwrap();
        assert_eq!(second["id"], 2);
        assert_eq!(second["geom_type"], "Polygon");
        assert!(second["poi_type"].is_null());
        assert!(second["properties"].is_null());
    }

    #[test]
    fn test_empty_collection() {
        let mut out = Vec::new();
        write_feature_collection(&mut out, &[]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"{"type":"FeatureCollection","features":[]}"#
        );
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pois.geojson");
        assert_eq!(export_to_geojson(&pois(), &path).unwrap(), 2);
        assert!(std::fs::read_to_string(&path).unwrap().starts_with(r#"{"type":"FeatureCollection""#));
    }
}
