//! Extraction des champs POI depuis un enregistrement brut
//!
//! Trois champs nommés (nom, type, adresse) sont lus selon un [`FieldMapping`];
//! tous les autres attributs non nuls partent dans `properties`.

use geodata::{AttributeValue, Attributes, RawRecord};
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::record::PoiFields;

/// Nom utilisé quand la source n'en fournit pas
pub const UNNAMED_POI: &str = "Unnamed POI";

/// Colonne source réservée, jamais recopiée dans les propriétés
const GEOMETRY_KEY: &str = "geometry";

/// Correspondance colonnes source -> champs POI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    /// Colonne du nom (défaut: `name`)
    pub name: String,
    /// Colonne du type (défaut: `type`)
    #[serde(alias = "poi_type")]
    pub category: String,
    /// Colonne de l'adresse (défaut: `address`)
    pub address: String,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            name: "name".into(),
            category: "type".into(),
            address: "address".into(),
        }
    }
}

impl FieldMapping {
    fn is_mapped(&self, key: &str) -> bool {
        key == GEOMETRY_KEY || key == self.name || key == self.category || key == self.address
    }
}

/// Extrait les champs POI d'un enregistrement. Ne peut pas échouer.
pub fn extract(record: &RawRecord, mapping: &FieldMapping) -> PoiFields {
    let attributes = &record.attributes;

    let name = text_field(attributes, &mapping.name)
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| UNNAMED_POI.to_string());

    let properties: Map<String, serde_json::Value> = attributes
        .iter()
        .filter(|(key, value)| !mapping.is_mapped(key) && !value.is_null())
        .map(|(key, value)| (key.to_string(), value.to_json()))
        .collect();

    PoiFields {
        name,
        category: text_field(attributes, &mapping.category),
        address: text_field(attributes, &mapping.address),
        properties: (!properties.is_empty()).then_some(properties),
    }
}

/// Valeur textuelle d'un attribut (les nombres et booléens sont rendus en texte)
fn text_field(attributes: &Attributes, key: &str) -> Option<String> {
    match attributes.get(key)? {
        AttributeValue::Null => None,
        AttributeValue::Text(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
