//! Parser Shapefile (.shp + .dbf, .prj optionnel)

use std::path::{Path, PathBuf};

use shapefile::dbase::{self, FieldValue};
use shapefile::Shape;
use tracing::{debug, warn};

use super::ParsedSource;
use crate::crs::{self, Crs};
use crate::types::{AttributeValue, Attributes, RawRecord};
use crate::GeoDataError;

/// Parse un Shapefile et ses fichiers compagnons
pub fn parse(path: &Path) -> Result<ParsedSource, GeoDataError> {
    let dbf_path = companion(path, "dbf");
    let field_names = read_field_names(&dbf_path)?;

    let mut reader = shapefile::Reader::from_path(path)
        .map_err(|e| GeoDataError::parse_error(path, e.to_string()))?;

    let mut records = Vec::new();
    for (index, item) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = item.map_err(|e| GeoDataError::parse_error(path, e.to_string()))?;

        let (geometry, geometry_error) = convert_shape(index, shape);

        let mut attributes = Attributes::with_capacity(field_names.len());
        for name in &field_names {
            let value = record
                .get(name)
                .map(convert_field)
                .unwrap_or(AttributeValue::Null);
            attributes.push(name.clone(), value);
        }

        records.push(RawRecord {
            index,
            geometry,
            geometry_error,
            attributes,
        });
    }

    let crs = read_prj(&companion(path, "prj"))?;
    debug!(records = records.len(), fields = field_names.len(), "Shapefile parsed");

    Ok(ParsedSource { records, crs })
}

/// Chemin d'un fichier compagnon, en respectant la casse de l'extension
fn companion(path: &Path, extension: &str) -> PathBuf {
    let upper = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.chars().all(|c| c.is_ascii_uppercase()));
    if upper {
        path.with_extension(extension.to_ascii_uppercase())
    } else {
        path.with_extension(extension)
    }
}

/// Noms des champs dans l'ordre de l'en-tête DBF
fn read_field_names(dbf_path: &Path) -> Result<Vec<String>, GeoDataError> {
    let reader = dbase::Reader::from_path(dbf_path)
        .map_err(|e| GeoDataError::parse_error(dbf_path, e.to_string()))?;
    Ok(reader
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect())
}

fn read_prj(prj_path: &Path) -> Result<Option<Crs>, GeoDataError> {
    if !prj_path.exists() {
        return Ok(None);
    }
    let wkt = std::fs::read_to_string(prj_path)?;
    Ok(crs::from_prj(&wkt))
}

fn convert_shape(index: usize, shape: Shape) -> (Option<geo::Geometry<f64>>, Option<String>) {
    if matches!(shape, Shape::NullShape) {
        return (None, None);
    }
    match geo::Geometry::<f64>::try_from(shape) {
        Ok(geometry) => (Some(geometry), None),
        Err(e) => {
            let reason = e.to_string();
            warn!(index, reason = %reason, "Shape conversion failed");
            (None, Some(reason))
        }
    }
}

/// Conversion des valeurs DBF vers des nombres / textes simples
///
/// Les `Numeric` entiers deviennent des entiers.
fn convert_field(value: &FieldValue) -> AttributeValue {
    match value {
        FieldValue::Character(Some(s)) => AttributeValue::Text(s.trim_end().to_string()),
        FieldValue::Numeric(Some(n)) => numeric(*n),
        FieldValue::Logical(Some(b)) => AttributeValue::Bool(*b),
        FieldValue::Float(Some(f)) => AttributeValue::Float(f64::from(*f)),
        FieldValue::Integer(i) => AttributeValue::Integer(i64::from(*i)),
        FieldValue::Double(d) | FieldValue::Currency(d) => AttributeValue::Float(*d),
        FieldValue::Date(Some(d)) => AttributeValue::Text(iso_date(d)),
        FieldValue::DateTime(dt) => {
            let time = dt.time();
            AttributeValue::Text(format!(
                "{}T{:02}:{:02}:{:02}",
                iso_date(&dt.date()),
                time.hours(),
                time.minutes(),
                time.seconds()
            ))
        }
        FieldValue::Memo(s) => AttributeValue::Text(s.clone()),
        FieldValue::Character(None)
        | FieldValue::Numeric(None)
        | FieldValue::Logical(None)
        | FieldValue::Float(None)
        | FieldValue::Date(None) => AttributeValue::Null,
        // Variantes ajoutées par de futures versions de dbase
        #[allow(unreachable_patterns)]
        other => AttributeValue::Text(format!("{:?}", other)),
    }
}

fn iso_date(date: &dbase::Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

fn numeric(n: f64) -> AttributeValue {
    // Au-delà de 2^53 un f64 n'est plus un entier exact
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        AttributeValue::Integer(n as i64)
    } else {
        AttributeValue::Float(n)
    }
}
