//! Import par lots: enregistrements bruts -> POI stockés
//!
//! Les enregistrements sont lus dans l'ordre de la source, regroupés en lots
//! de `batch_size` et chaque lot est commité dans sa propre transaction.
//! Un enregistrement invalide est compté (`skipped` / `failed`) sans
//! interrompre l'import, sauf si `skip_invalid` est désactivé.
//!
//! Un seul import à la fois par store: aucun verrou n'empêche deux imports
//! concurrents sur la même table.

use std::path::Path;

use geo::{CoordsIter, Geometry, LineString, Polygon};
use geodata::RawRecord;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ImportError;
use crate::mapper::{self, FieldMapping};
use crate::record::CanonicalRecord;
use crate::store::PoiStore;

/// Taille de lot par défaut
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Nombre maximal d'erreurs par enregistrement conservées pour le rapport
const MAX_RECORDED_ERRORS: usize = 100;

/// Options d'import
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    pub batch_size: usize,
    /// Compter les enregistrements invalides au lieu d'échouer
    pub skip_invalid: bool,
    pub mapping: FieldMapping,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            skip_invalid: true,
            mapping: FieldMapping::default(),
        }
    }
}

/// Compteurs d'import. `succeeded + failed + skipped` = enregistrements traités.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ImportStats {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

/// Pilote l'import d'enregistrements vers un [`PoiStore`]
pub struct BatchImporter<'s, S> {
    store: &'s mut S,
    options: ImportOptions,
    progress: Option<Box<dyn FnMut(usize) + 's>>,
    record_errors: Vec<String>,
}

impl<'s, S: PoiStore> BatchImporter<'s, S> {
    pub fn new(store: &'s mut S, options: ImportOptions) -> Self {
        Self {
            store,
            options,
            progress: None,
            record_errors: Vec::new(),
        }
    }

    /// Callback appelé après chaque lot commité avec le total `succeeded`
    pub fn on_progress(mut self, callback: impl FnMut(usize) + 's) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Premières erreurs par enregistrement rencontrées
    pub fn record_errors(&self) -> &[String] {
        &self.record_errors
    }

    /// Lit un fichier GeoJSON / Shapefile puis l'importe
    pub async fn import_file(&mut self, path: &Path) -> Result<ImportStats, ImportError> {
        let dataset = geodata::read(path)?;
        self.import(dataset.records).await
    }

    /// Importe les enregistrements dans l'ordre, lot par lot
    ///
    /// # Errors
    ///
    /// - `InvalidBatchSize` si `batch_size` vaut 0
    /// - `InvalidGeometry` / `Extraction` au premier enregistrement invalide
    ///   quand `skip_invalid` est désactivé (le lot en cours est abandonné)
    /// - `BatchCommit` dès qu'un lot échoue, quel que soit `skip_invalid`
    pub async fn import<I>(&mut self, records: I) -> Result<ImportStats, ImportError>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let batch_size = self.options.batch_size;
        if batch_size == 0 {
            return Err(ImportError::InvalidBatchSize);
        }

        let mut stats = ImportStats::default();
        let mut batch: Vec<CanonicalRecord> = Vec::with_capacity(batch_size.min(4096));
        let mut batch_number = 0;

        for raw in records {
            match self.prepare(raw) {
                Ok(Some(record)) => {
                    batch.push(record);
                    if batch.len() >= batch_size {
                        batch_number += 1;
                        self.commit(&mut batch, batch_number, &mut stats).await?;
                    }
                }
                Ok(None) => stats.skipped += 1,
                Err(e) => {
                    stats.failed += 1;
                    warn!(error = %e, "Record rejected");
                    if self.record_errors.len() < MAX_RECORDED_ERRORS {
                        self.record_errors.push(e.to_string());
                    }
                    if !self.options.skip_invalid {
                        return Err(e);
                    }
                }
            }
        }

        if !batch.is_empty() {
            batch_number += 1;
            self.commit(&mut batch, batch_number, &mut stats).await?;
        }

        info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            skipped = stats.skipped,
            batches = batch_number,
            "Import finished"
        );
        Ok(stats)
    }

    /// `Ok(None)` = enregistrement ignoré (géométrie absente ou vide)
    fn prepare(&self, raw: RawRecord) -> Result<Option<CanonicalRecord>, ImportError> {
        let index = raw.index;

        if let Some(reason) = &raw.geometry_error {
            return Err(ImportError::Extraction {
                index,
                reason: reason.clone(),
            });
        }

        let fields = mapper::extract(&raw, &self.options.mapping);

        let geometry = match raw.geometry {
            Some(geometry) if geometry.coords_count() > 0 => geometry,
            _ if self.options.skip_invalid => {
                debug!(index, "Skipping record without geometry");
                return Ok(None);
            }
            _ => return Err(ImportError::InvalidGeometry { index }),
        };

        check_structure(&geometry).map_err(|reason| ImportError::Extraction { index, reason })?;

        Ok(Some(fields.with_geometry(geometry)))
    }

    async fn commit(
        &mut self,
        batch: &mut Vec<CanonicalRecord>,
        batch_number: usize,
        stats: &mut ImportStats,
    ) -> Result<(), ImportError> {
        if let Err(source) = self.store.insert_batch(batch.as_slice()).await {
            return Err(ImportError::BatchCommit {
                batch: batch_number,
                committed: stats.succeeded,
                source,
            });
        }

        stats.succeeded += batch.len();
        info!(
            batch = batch_number,
            rows = batch.len(),
            succeeded = stats.succeeded,
            "Batch committed"
        );
        if let Some(progress) = self.progress.as_mut() {
            progress(stats.succeeded);
        }
        batch.clear();
        Ok(())
    }
}

/// Vérifie qu'une géométrie est stockable telle quelle par PostGIS
fn check_structure(geometry: &Geometry<f64>) -> Result<(), String> {
    fn ring_ok(ring: &LineString<f64>) -> Result<(), String> {
        if ring.0.len() < 4 {
            return Err(format!("ring has {} points (at least 4 required)", ring.0.len()));
        }
        if ring.0.first() != ring.0.last() {
            return Err("ring is not closed".to_string());
        }
        Ok(())
    }

    fn polygon_ok(polygon: &Polygon<f64>) -> Result<(), String> {
        ring_ok(polygon.exterior())?;
        polygon.interiors().iter().try_for_each(ring_ok)
    }

    fn line_ok(line: &LineString<f64>) -> Result<(), String> {
        if line.0.len() < 2 {
            return Err(format!("line has {} point(s) (at least 2 required)", line.0.len()));
        }
        Ok(())
    }

    if geometry.coords_iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err("non-finite coordinate".to_string());
    }

    match geometry {
        Geometry::LineString(ls) => line_ok(ls),
        Geometry::MultiLineString(mls) => mls.0.iter().try_for_each(line_ok),
        Geometry::Polygon(p) => polygon_ok(p),
        Geometry::MultiPolygon(mp) => mp.0.iter().try_for_each(polygon_ok),
        Geometry::GeometryCollection(gc) => gc.0.iter().try_for_each(check_structure),
        _ => Ok(()),
    }
}
