//! Erreurs de l'import par lots

use geodata::GeoDataError;
use thiserror::Error;

/// Erreurs du pipeline d'import
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to read source data: {0}")]
    Read(#[from] GeoDataError),

    #[error("Invalid geometry at row {index}")]
    InvalidGeometry { index: usize },

    #[error("Error processing row {index}: {reason}")]
    Extraction { index: usize, reason: String },

    #[error("Batch {batch} failed to commit ({committed} records already committed)")]
    BatchCommit {
        batch: usize,
        committed: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("Batch size must be greater than 0")]
    InvalidBatchSize,
}
