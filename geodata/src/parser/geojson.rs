//! Parser GeoJSON (FeatureCollection, Feature ou Geometry seule)

use std::path::Path;

use ::geojson::{GeoJson, JsonObject, Value};
use tracing::{debug, warn};

use super::ParsedSource;
use crate::crs::{self, Crs};
use crate::types::{AttributeValue, Attributes, RawRecord};
use crate::GeoDataError;

/// Parse un fichier GeoJSON
pub fn parse(path: &Path) -> Result<ParsedSource, GeoDataError> {
    let text = std::fs::read_to_string(path)?;
    parse_str(&text, path)
}

/// Parse un document GeoJSON déjà en mémoire (`origin` sert aux messages d'erreur)
pub fn parse_str(text: &str, origin: &Path) -> Result<ParsedSource, GeoDataError> {
    let document: GeoJson = text
        .parse()
        .map_err(|e: ::geojson::Error| GeoDataError::parse_error(origin, e.to_string()))?;

    let parsed = match document {
        GeoJson::FeatureCollection(fc) => {
            let crs = declared_crs(fc.foreign_members.as_ref())?;
            let records = fc
                .features
                .into_iter()
                .enumerate()
                .map(|(index, feature)| {
                    build_record(index, feature.geometry, feature.properties)
                })
                .collect();
            ParsedSource { records, crs }
        }
        GeoJson::Feature(feature) => {
            let crs = declared_crs(feature.foreign_members.as_ref())?;
            ParsedSource {
                records: vec![build_record(0, feature.geometry, feature.properties)],
                crs,
            }
        }
        GeoJson::Geometry(geometry) => {
            let crs = declared_crs(geometry.foreign_members.as_ref())?;
            ParsedSource {
                records: vec![build_record(0, Some(geometry), None)],
                crs,
            }
        }
    };

    debug!(records = parsed.records.len(), "GeoJSON parsed");
    Ok(parsed)
}

fn declared_crs(foreign_members: Option<&JsonObject>) -> Result<Option<Crs>, GeoDataError> {
    let Some(member) = foreign_members.and_then(|m| m.get("crs")) else {
        return Ok(None);
    };
    crs::from_geojson_member(member).map_err(|reason| {
        warn!(crs = %member, "Unusable GeoJSON crs member");
        GeoDataError::reprojection(member, reason)
    })
}

fn build_record(
    index: usize,
    geometry: Option<::geojson::Geometry>,
    properties: Option<JsonObject>,
) -> RawRecord {
    let attributes: Attributes = properties
        .map(|props| {
            props
                .into_iter()
                .map(|(k, v)| (k, AttributeValue::from(v)))
                .collect()
        })
        .unwrap_or_default();

    let (geometry, geometry_error) = match geometry {
        None => (None, None),
        Some(g) => match check_value(&g.value) {
            ValueCheck::Empty => (None, None),
            ValueCheck::Malformed(reason) => {
                warn!(index, reason = %reason, "Unreadable GeoJSON geometry");
                (None, Some(reason))
            }
            ValueCheck::Usable => match geo::Geometry::<f64>::try_from(g) {
                Ok(geom) => (Some(geom), None),
                Err(e) => {
                    warn!(index, error = %e, "GeoJSON geometry conversion failed");
                    (None, Some(e.to_string()))
                }
            },
        },
    };

    RawRecord {
        index,
        geometry,
        geometry_error,
        attributes,
    }
}

/// État d'une géométrie GeoJSON avant conversion
#[derive(Debug, PartialEq)]
enum ValueCheck {
    Usable,
    Empty,
    Malformed(String),
}

/// Détecte les géométries vides et les positions incomplètes
///
/// La conversion vers `geo` indexe les positions sans vérification.
fn check_value(value: &Value) -> ValueCheck {
    fn positions_ok(positions: &[Vec<f64>]) -> bool {
        positions.iter().all(|p| p.len() >= 2)
    }

    let (empty, ok) = match value {
        Value::Point(p) => (p.is_empty(), p.is_empty() || p.len() >= 2),
        Value::MultiPoint(points) => (points.is_empty(), positions_ok(points)),
        Value::LineString(line) => (line.is_empty(), positions_ok(line)),
        Value::MultiLineString(lines) => (
            lines.iter().all(|l| l.is_empty()),
            lines.iter().all(|l| positions_ok(l)),
        ),
        Value::Polygon(rings) => (
            rings.first().map_or(true, |r| r.is_empty()),
            rings.iter().all(|r| positions_ok(r)),
        ),
        Value::MultiPolygon(polygons) => (
            polygons
                .iter()
                .all(|rings| rings.first().map_or(true, |r| r.is_empty())),
            polygons
                .iter()
                .all(|rings| rings.iter().all(|r| positions_ok(r))),
        ),
        Value::GeometryCollection(geometries) => {
            let checks: Vec<ValueCheck> = geometries.iter().map(|g| check_value(&g.value)).collect();
            if let Some(ValueCheck::Malformed(reason)) = checks
                .iter()
                .find(|c| matches!(c, ValueCheck::Malformed(_)))
            {
                return ValueCheck::Malformed(reason.clone());
            }
            (checks.iter().all(|c| *c == ValueCheck::Empty), true)
        }
    };

    if !ok {
        ValueCheck::Malformed("position with fewer than 2 coordinates".to_string())
    } else if empty {
        ValueCheck::Empty
    } else {
        ValueCheck::Usable
    }
}
