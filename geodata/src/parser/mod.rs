//! Parsers par format de fichier

pub mod geojson;
pub mod shp;

use crate::crs::Crs;
use crate::types::RawRecord;

/// Sortie brute d'un parser, avant normalisation du CRS
#[derive(Debug)]
pub struct ParsedSource {
    pub records: Vec<RawRecord>,
    pub crs: Option<Crs>,
}
