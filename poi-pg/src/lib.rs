//! # poi-pg
//!
//! Import de POI (GeoJSON, Shapefile) vers PostGIS et résolution spatiale d'un
//! point: POI contenant, sinon POI le plus proche.
//!
//! ## Features
//!
//! - Lecture via [`geodata`], reprojection automatique en WGS84
//! - Extraction de champs configurable (nom, type, adresse) + propriétés JSONB
//! - Import par lots transactionnels (`COPY`), erreurs par enregistrement isolées
//! - Résolution containment -> plus proche (distance géodésique)
//! - Export GeoJSON de la table
//!
//! ## Usage CLI
//!
//! ```bash
//! # Import (création de la table si besoin)
//! poi-pg import ./data/poi.geojson --init-db
//! poi-pg import ./data/communes.shp --name-field NOM --type-field TYPE
//!
//! # Quel POI pour ce point ?
//! poi-pg resolve --lat 40.0 --lon -75.0
//! poi-pg resolve --from-ip --json
//!
//! # Export GeoJSON
//! poi-pg export --output pois.geojson
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod importer;
pub mod location;
pub mod mapper;
pub mod record;
pub mod report;
pub mod resolver;
pub mod store;

pub use config::{ImportConfig, ImportOverrides};
pub use error::ImportError;
pub use importer::{BatchImporter, ImportOptions, ImportStats};
pub use mapper::FieldMapping;
pub use record::{CanonicalRecord, PoiFields, StoredPoi};
pub use report::{ImportReport, ImportStatus};
pub use resolver::{format_distance, ResolvePhase, ResolvedMatch, SpatialResolver};
pub use store::{create_pool, DatabaseConfig, MemoryStore, PoiStore, PostgisStore};
