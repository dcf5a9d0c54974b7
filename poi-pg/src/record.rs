//! Enregistrements POI normalisés

use geo::Geometry;
use serde_json::{Map, Value};

/// Champs extraits d'un enregistrement source (sans la géométrie)
#[derive(Debug, Clone, PartialEq)]
pub struct PoiFields {
    /// Nom, jamais vide (`"Unnamed POI"` par défaut)
    pub name: String,
    /// Classification (colonne `poi_type`)
    pub category: Option<String>,
    pub address: Option<String>,
    /// Attributs résiduels, `None` si aucun
    pub properties: Option<Map<String, Value>>,
}

impl PoiFields {
    /// Associe une géométrie WGS84 pour former un enregistrement insérable
    pub fn with_geometry(self, geometry: Geometry<f64>) -> CanonicalRecord {
        CanonicalRecord {
            name: self.name,
            category: self.category,
            address: self.address,
            geometry,
            properties: self.properties,
        }
    }
}

/// POI prêt à être inséré (géométrie en EPSG:4326)
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub name: String,
    pub category: Option<String>,
    pub address: Option<String>,
    pub geometry: Geometry<f64>,
    pub properties: Option<Map<String, Value>>,
}

impl CanonicalRecord {
    /// Nom du type de géométrie (Point, Polygon, ...)
    pub fn geometry_type(&self) -> &'static str {
        geometry_type_name(&self.geometry)
    }
}

/// POI tel que stocké, avec son identifiant
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoi {
    pub id: i32,
    pub record: CanonicalRecord,
}

pub(crate) fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "LineString",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Polygon",
        Geometry::Triangle(_) => "Polygon",
    }
}
