//! Types d'erreurs pour le crate geodata

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Erreurs pouvant survenir lors de la lecture d'un jeu de données
#[derive(Debug, Error)]
pub enum GeoDataError {
    /// Fichier source introuvable
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Extension non reconnue (pas de fallback silencieux)
    #[error("Unsupported file format: {extension}. Supported formats: .geojson, .json, .shp")]
    UnsupportedFormat { extension: String },

    /// Erreur d'I/O lors de la lecture
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fichier mal formé
    #[error("Parse error in {file}: {reason}")]
    Parse { file: String, reason: String },

    /// Impossible de normaliser le CRS vers WGS84
    #[error("Reprojection from {crs} to EPSG:4326 failed: {reason}")]
    Reprojection { crs: String, reason: String },
}

impl GeoDataError {
    /// Crée une erreur de parsing avec contexte
    pub fn parse_error(file: &Path, reason: impl Into<String>) -> Self {
        Self::Parse {
            file: file.display().to_string(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de reprojection
    pub fn reprojection(crs: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::Reprojection {
            crs: crs.to_string(),
            reason: reason.into(),
        }
    }
}
