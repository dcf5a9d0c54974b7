//! Store en mémoire (dry-run et tests)
//!
//! Mêmes règles que PostGIS: `ST_Contains` pour la containment, distance
//! géodésique sur l'ellipsoïde WGS84 pour le plus proche.

use anyhow::Result;
use geo::{Closest, ClosestPoint, Contains, GeodesicDistance, Geometry, Point};
use tracing::debug;

use super::PoiStore;
use crate::record::{CanonicalRecord, StoredPoi};

/// POI conservés dans un `Vec`, ids attribués séquentiellement à partir de 1
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pois: Vec<StoredPoi>,
    last_id: i32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pois.is_empty()
    }
}

impl PoiStore for MemoryStore {
    async fn insert_batch(&mut self, records: &[CanonicalRecord]) -> Result<u64> {
        for record in records {
            self.last_id += 1;
            self.pois.push(StoredPoi {
                id: self.last_id,
                record: record.clone(),
            });
        }
        debug!(rows = records.len(), total = self.pois.len(), "Batch stored in memory");
        Ok(records.len() as u64)
    }

    async fn find_containing(&self, point: Point<f64>) -> Result<Vec<StoredPoi>> {
        Ok(self
            .pois
            .iter()
            .filter(|poi| geometry_contains(&poi.record.geometry, &point))
            .cloned()
            .collect())
    }

    async fn find_nearest(&self, point: Point<f64>) -> Result<Option<(StoredPoi, f64)>> {
        let mut best: Option<(&StoredPoi, f64)> = None;
        for poi in &self.pois {
            let Some(distance) = geodesic_distance_to(&poi.record.geometry, &point) else {
                continue;
            };
            // Les ids sont croissants: l'inégalité stricte garde le plus petit en cas d'égalité
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((poi, distance));
            }
        }
        Ok(best.map(|(poi, distance)| (poi.clone(), distance)))
    }

    async fn all(&self) -> Result<Vec<StoredPoi>> {
        Ok(self.pois.clone())
    }
}

/// Équivalent de `ST_Contains(geom, point)`
fn geometry_contains(geometry: &Geometry<f64>, point: &Point<f64>) -> bool {
    match geometry {
        Geometry::Point(g) => g.contains(point),
        Geometry::Line(g) => g.contains(point),
        Geometry::LineString(g) => g.contains(point),
        Geometry::Polygon(g) => g.contains(point),
        Geometry::MultiPoint(g) => g.contains(point),
        Geometry::MultiLineString(g) => g.contains(point),
        Geometry::MultiPolygon(g) => g.contains(point),
        Geometry::Rect(g) => g.contains(point),
        Geometry::Triangle(g) => g.contains(point),
        Geometry::GeometryCollection(gc) => gc.iter().any(|g| geometry_contains(g, point)),
    }
}

/// Distance géodésique (mètres) du point à la géométrie, 0 si contenu
///
/// Le point le plus proche est cherché dans le plan lon/lat, ce qui suffit
/// aux distances courtes utilisées ici.
fn geodesic_distance_to(geometry: &Geometry<f64>, point: &Point<f64>) -> Option<f64> {
    if geometry_contains(geometry, point) {
        return Some(0.0);
    }
    match geometry.closest_point(point) {
        Closest::Intersection(p) | Closest::SinglePoint(p) => Some(point.geodesic_distance(&p)),
        Closest::Indeterminate => None,
    }
}
