//! Configuration d'import (fichier JSON optionnel, `--config`)
//!
//! ```json
//! {
//!   "fields": { "name": "NOM", "poi_type": "CATEGORIE", "address": "ADRESSE" },
//!   "batch_size": 500,
//!   "skip_invalid": true
//! }
//! ```
//!
//! Les clés inconnues sont ignorées; les options de la ligne de commande
//! priment sur le fichier.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::importer::ImportOptions;
use crate::mapper::FieldMapping;

/// Configuration d'import
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ImportConfig {
    pub fields: FieldMapping,
    pub batch_size: Option<usize>,
    pub skip_invalid: Option<bool>,
}

/// Valeurs passées en ligne de commande (`None` = non précisé)
#[derive(Debug, Clone, Default)]
pub struct ImportOverrides {
    pub name_field: Option<String>,
    pub type_field: Option<String>,
    pub address_field: Option<String>,
    pub batch_size: Option<usize>,
    pub no_skip_invalid: bool,
}

impl ImportConfig {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse config JSON")
    }

    /// Options effectives: ligne de commande > fichier > défauts
    pub fn resolve(self, overrides: ImportOverrides) -> ImportOptions {
        let defaults = ImportOptions::default();
        let mut mapping = self.fields;
        if let Some(name) = overrides.name_field {
            mapping.name = name;
        }
        if let Some(category) = overrides.type_field {
            mapping.category = category;
        }
        if let Some(address) = overrides.address_field {
            mapping.address = address;
        }

        ImportOptions {
            batch_size: overrides
                .batch_size
                .or(self.batch_size)
                .unwrap_or(defaults.batch_size),
            skip_invalid: !overrides.no_skip_invalid
                && self.skip_invalid.unwrap_or(defaults.skip_invalid),
            mapping,
        }
    }
}
