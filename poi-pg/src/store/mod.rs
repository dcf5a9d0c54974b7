//! Stockage des POI
//!
//! Le trait [`PoiStore`] est le contrat minimal dont dépendent l'import et la
//! résolution spatiale:
//! - `insert_batch`: un lot = une transaction
//! - `find_containing`: POI dont la géométrie contient le point, par id croissant
//! - `find_nearest`: POI le plus proche en distance géodésique (mètres)
//! - `all`: tous les POI, par id croissant
//!
//! Implémentations: [`PostgisStore`] (production) et [`MemoryStore`] (dry-run, tests).

pub mod memory;
pub mod pool;
pub mod postgres;
pub mod transaction;

pub use memory::MemoryStore;
pub use pool::{create_pool, test_connection, DatabaseConfig, SslMode};
pub use postgres::PostgisStore;

use anyhow::Result;
use geo::Point;

use crate::record::{CanonicalRecord, StoredPoi};

/// Contrat de stockage des POI (coordonnées WGS84, `x = lon`, `y = lat`)
///
/// Un seul écrivain à la fois: aucune garantie en cas d'imports concurrents.
#[allow(async_fn_in_trait)]
pub trait PoiStore {
    /// Insère un lot de façon atomique et retourne le nombre de lignes écrites
    async fn insert_batch(&mut self, records: &[CanonicalRecord]) -> Result<u64>;

    /// POI contenant le point, triés par id (le plus petit gagne)
    async fn find_containing(&self, point: Point<f64>) -> Result<Vec<StoredPoi>>;

    /// POI le plus proche et sa distance en mètres (égalité: plus petit id)
    async fn find_nearest(&self, point: Point<f64>) -> Result<Option<(StoredPoi, f64)>>;

    /// Tous les POI, triés par id
    async fn all(&self) -> Result<Vec<StoredPoi>>;
}
