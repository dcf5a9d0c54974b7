//! Résolution d'un point vers un POI: containment d'abord, sinon le plus proche

use anyhow::Result;
use geo::Point;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::record::StoredPoi;
use crate::store::PoiStore;

/// Étape de la résolution. On ne passe à `Nearest` que si `Containing` n'a rien trouvé.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvePhase {
    Containing,
    Nearest,
}

/// POI retenu pour un point, construit à la demande
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMatch {
    pub id: i32,
    pub name: String,
    pub category: Option<String>,
    pub address: Option<String>,
    pub properties: Option<Map<String, Value>>,
    /// 0 si le point est contenu
    pub distance_meters: f64,
    pub contained: bool,
}

impl ResolvedMatch {
    fn new(poi: StoredPoi, distance_meters: f64, contained: bool) -> Self {
        Self {
            id: poi.id,
            name: poi.record.name,
            category: poi.record.category,
            address: poi.record.address,
            properties: poi.record.properties,
            distance_meters,
            contained,
        }
    }

    pub fn display_distance(&self) -> String {
        format_distance(self.distance_meters)
    }
}

/// `"12.35 meters"` sous 1 km, `"1.50 kilometers"` au-delà
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{:.2} meters", meters)
    } else {
        format!("{:.2} kilometers", meters / 1000.0)
    }
}

/// Résout des coordonnées WGS84 contre un [`PoiStore`]
pub struct SpatialResolver<'s, S> {
    store: &'s S,
}

impl<'s, S: PoiStore> SpatialResolver<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Un seul résultat: le POI contenant (plus petit id), sinon le plus proche.
    /// `None` uniquement si le store est vide.
    pub async fn resolve(&self, latitude: f64, longitude: f64) -> Result<Option<ResolvedMatch>> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            anyhow::bail!("Invalid coordinates: latitude {latitude}, longitude {longitude}");
        }

        let point = Point::new(longitude, latitude);
        let mut phase = ResolvePhase::Containing;

        loop {
            match phase {
                ResolvePhase::Containing => {
                    let containing = self.store.find_containing(point).await?;
                    debug!(latitude, longitude, candidates = containing.len(), "Containment lookup");
                    if let Some(poi) = containing.into_iter().next() {
                        return Ok(Some(ResolvedMatch::new(poi, 0.0, true)));
                    }
                    phase = ResolvePhase::Nearest;
                }
                ResolvePhase::Nearest => {
                    let nearest = self.store.find_nearest(point).await?;
                    debug!(latitude, longitude, found = nearest.is_some(), "Nearest lookup");
                    return Ok(nearest.map(|(poi, distance)| ResolvedMatch::new(poi, distance, false)));
                }
            }
        }
    }
}
