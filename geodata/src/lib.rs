//! # geodata
//!
//! Lecture de jeux de données géographiques (points, polygones) normalisés en WGS84.
//!
//! ## Features
//!
//! - GeoJSON (`.geojson`, `.json`): FeatureCollection, Feature ou Geometry seule
//! - Shapefile (`.shp` + `.dbf`, `.prj` optionnel)
//! - Détection du CRS source et reprojection vers EPSG:4326 via PROJ (feature `reproject`)
//! - Attributs typés, dans l'ordre natif de la source
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::path::Path;
//!
//! let dataset = geodata::read(Path::new("poi.geojson"))?;
//! println!("{} records, CRS: {:?}", dataset.len(), dataset.source_crs);
//! for record in &dataset.records {
//!     println!("{} -> {:?}", record.index, record.attributes.get("name"));
//! }
//! ```

pub mod crs;
pub mod error;
pub mod parser;
pub mod reproject;
pub mod types;

pub use crs::{Crs, WGS84_EPSG};
pub use error::GeoDataError;
pub use reproject::Reprojector;
pub use types::{AttributeValue, Attributes, Dataset, RawRecord};

use std::path::Path;

use tracing::{info, warn};

use parser::ParsedSource;

/// Format de fichier reconnu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    GeoJson,
    Shapefile,
}

impl SourceFormat {
    /// Déduit le format depuis l'extension (insensible à la casse)
    pub fn from_path(path: &Path) -> Result<Self, GeoDataError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "geojson" | "json" => Ok(SourceFormat::GeoJson),
            "shp" => Ok(SourceFormat::Shapefile),
            _ => Err(GeoDataError::UnsupportedFormat {
                extension: if extension.is_empty() {
                    "(none)".to_string()
                } else {
                    format!(".{}", extension)
                },
            }),
        }
    }
}

/// Lit un fichier GeoJSON ou Shapefile et retourne ses enregistrements en WGS84.
///
/// # Errors
///
/// - `FileNotFound` si le fichier n'existe pas
/// - `UnsupportedFormat` si l'extension n'est pas reconnue
/// - `Parse` si le fichier est mal formé
/// - `Reprojection` si le CRS déclaré ne peut pas être converti en WGS84
pub fn read(path: &Path) -> Result<Dataset, GeoDataError> {
    if !path.exists() {
        return Err(GeoDataError::FileNotFound(path.to_path_buf()));
    }

    let parsed = match SourceFormat::from_path(path)? {
        SourceFormat::GeoJson => {
            info!(path = %path.display(), "Reading GeoJSON file");
            parser::geojson::parse(path)?
        }
        SourceFormat::Shapefile => {
            info!(path = %path.display(), "Reading Shapefile");
            parser::shp::parse(path)?
        }
    };

    normalize(parsed)
}

/// Lit un document GeoJSON déjà chargé en mémoire
pub fn read_geojson_str(text: &str) -> Result<Dataset, GeoDataError> {
    let parsed = parser::geojson::parse_str(text, Path::new("<memory>"))?;
    normalize(parsed)
}

/// Garantit que toutes les géométries sont en EPSG:4326
fn normalize(parsed: ParsedSource) -> Result<Dataset, GeoDataError> {
    let ParsedSource { mut records, crs } = parsed;

    let reprojected = match &crs {
        None => {
            warn!("No CRS defined, assuming EPSG:4326 (WGS84)");
            false
        }
        Some(source) if source.is_wgs84() => false,
        Some(source) => {
            info!(crs = %source, "Reprojecting to EPSG:4326 (WGS84)");
            let reprojector = Reprojector::new(source)?;
            for record in &mut records {
                if let Some(geometry) = &record.geometry {
                    record.geometry = Some(reprojector.transform_geometry(geometry)?);
                }
            }
            true
        }
    };

    Ok(Dataset {
        records,
        source_crs: crs,
        reprojected,
    })
}
