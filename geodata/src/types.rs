//! Types de données pour le crate geodata

use std::fmt;

use geo::Geometry;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::crs::Crs;

/// Résultat de la lecture d'un fichier, déjà normalisé en WGS84
#[derive(Debug)]
pub struct Dataset {
    /// Enregistrements dans l'ordre de la source
    pub records: Vec<RawRecord>,

    /// CRS déclaré par la source (`None` si absent, WGS84 supposé)
    pub source_crs: Option<Crs>,

    /// Vrai si les géométries ont été reprojetées vers EPSG:4326
    pub reprojected: bool,
}

impl Dataset {
    /// Nombre d'enregistrements lus
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Types de géométrie présents, dans l'ordre de première apparition
    pub fn geometry_types(&self) -> Vec<&'static str> {
        let mut types = Vec::new();
        for record in &self.records {
            let name = record.geometry_type();
            if !types.contains(&name) {
                types.push(name);
            }
        }
        types
    }

    /// Noms d'attributs présents, dans l'ordre de première apparition
    pub fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for record in &self.records {
            for key in record.attributes.keys() {
                if !columns.contains(&key) {
                    columns.push(key);
                }
            }
        }
        columns
    }
}

/// Un enregistrement brut: géométrie + sac d'attributs non typé à la source
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// Position dans le fichier source (0-based)
    pub index: usize,

    /// Géométrie en WGS84 (`None` si nulle ou illisible)
    pub geometry: Option<Geometry<f64>>,

    /// Raison pour laquelle une géométrie présente n'a pas pu être lue
    pub geometry_error: Option<String>,

    /// Attributs dans l'ordre natif de la source
    pub attributes: Attributes,
}

impl RawRecord {
    /// Nom du type de géométrie (style OGC)
    pub fn geometry_type(&self) -> &'static str {
        match &self.geometry {
            None => "None",
            Some(Geometry::Point(_)) => "Point",
            Some(Geometry::Line(_)) => "Line",
            Some(Geometry::LineString(_)) => "LineString",
            Some(Geometry::Polygon(_)) => "Polygon",
            Some(Geometry::MultiPoint(_)) => "MultiPoint",
            Some(Geometry::MultiLineString(_)) => "MultiLineString",
            Some(Geometry::MultiPolygon(_)) => "MultiPolygon",
            Some(Geometry::GeometryCollection(_)) => "GeometryCollection",
            Some(Geometry::Rect(_)) => "Rect",
            Some(Geometry::Triangle(_)) => "Triangle",
        }
    }
}

/// Valeur d'attribut: union fermée scalaire / tableau / objet
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Array(Vec<AttributeValue>),
    Object(Attributes),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Conversion vers `serde_json::Value` (ordre des clés conservé)
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttributeValue::Null => serde_json::Value::Null,
            AttributeValue::Bool(b) => serde_json::Value::Bool(*b),
            AttributeValue::Integer(i) => serde_json::Value::from(*i),
            // NaN / infini n'existent pas en JSON
            AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            AttributeValue::Text(s) => serde_json::Value::String(s.clone()),
            AttributeValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(AttributeValue::to_json).collect())
            }
            AttributeValue::Object(attrs) => attrs.to_json(),
        }
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttributeValue::Null,
            serde_json::Value::Bool(b) => AttributeValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    AttributeValue::Integer(i)
                } else {
                    // u64 > i64::MAX ou flottant
                    AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => AttributeValue::Text(s),
            serde_json::Value::Array(items) => {
                AttributeValue::Array(items.into_iter().map(AttributeValue::from).collect())
            }
            serde_json::Value::Object(map) => AttributeValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, AttributeValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => Ok(()),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::Text(s) => f.write_str(s),
            AttributeValue::Array(_) | AttributeValue::Object(_) => {
                write!(f, "{}", self.to_json())
            }
        }
    }
}

/// Map ordonnée clé -> valeur, dans l'ordre natif de la source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(Vec<(String, AttributeValue)>);

impl Attributes {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Ajoute un attribut en fin de map
    pub fn push(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.0.push((key.into(), value));
    }

    /// Première valeur associée à la clé
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl FromIterator<(String, AttributeValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Attributes {
    type Item = (String, AttributeValue);
    type IntoIter = std::vec::IntoIter<(String, AttributeValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
