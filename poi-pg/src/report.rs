//! Rapport d'import
//!
//! Résumé console et export JSON (`--report`) d'un import: compteurs, durée,
//! statut et premières erreurs rencontrées.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::importer::ImportStats;

/// Nombre d'erreurs affichées sur la console
const DISPLAYED_ERRORS: usize = 20;

/// Statut global de l'import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportStatus {
    /// Tous les enregistrements valides importés, aucun échec
    Success,
    /// Import terminé avec des enregistrements en échec
    PartialSuccess,
    /// Import interrompu ou aucun enregistrement importé malgré des échecs
    Failed,
}

/// Rapport complet d'import
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub source: PathBuf,
    pub dry_run: bool,
    pub duration_secs: f64,
    pub status: ImportStatus,
    pub stats: ImportStats,
    /// Erreur fatale ayant interrompu l'import
    pub fatal_error: Option<String>,
    /// Premières erreurs par enregistrement
    pub errors: Vec<String>,
}

impl ImportReport {
    pub fn new(source: &Path, dry_run: bool) -> Self {
        Self {
            source: source.to_path_buf(),
            dry_run,
            duration_secs: 0.0,
            status: ImportStatus::Success,
            stats: ImportStats::default(),
            fatal_error: None,
            errors: Vec::new(),
        }
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    pub fn record_errors(&mut self, errors: &[String]) {
        self.errors.extend_from_slice(errors);
    }

    /// Import interrompu
    pub fn record_fatal(&mut self, message: impl Into<String>) {
        self.fatal_error = Some(message.into());
    }

    /// Détermine le statut final
    pub fn finalize(&mut self, stats: ImportStats) {
        self.stats = stats;
        self.status = if self.fatal_error.is_some() {
            ImportStatus::Failed
        } else if stats.failed == 0 {
            ImportStatus::Success
        } else if stats.succeeded > 0 {
            ImportStatus::PartialSuccess
        } else {
            ImportStatus::Failed
        };
    }

    /// Résumé final sur la console
    pub fn display(&self) {
        println!("\nImport completed:");
        println!("  Successfully imported: {}", self.stats.succeeded);
        println!("  Failed: {}", self.stats.failed);
        println!("  Skipped: {}", self.stats.skipped);
        println!("  Duration: {:.2}s", self.duration_secs);
        if self.dry_run {
            println!("  (dry run: nothing was written to the database)");
        }

        if let Some(fatal) = &self.fatal_error {
            println!("\nImport failed: {}", fatal);
        }

        if !self.errors.is_empty() {
            println!("\nErrors ({}):", self.errors.len());
            for e in self.errors.iter().take(DISPLAYED_ERRORS) {
                println!("  {}", e);
            }
            if self.errors.len() > DISPLAYED_ERRORS {
                println!("  ... and {} more", self.errors.len() - DISPLAYED_ERRORS);
            }
        }
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Affichage compact
    pub fn summary(&self) -> String {
        format!(
            "{}: {} imported, {} failed, {} skipped ({:?})",
            self.source.display(),
            self.stats.succeeded,
            self.stats.failed,
            self.stats.skipped,
            self.status
        )
    }
}
