//! Détection du système de coordonnées source
//!
//! - GeoJSON: membre `crs` (forme `name` ou ancienne forme `EPSG`)
//! - Shapefile: fichier `.prj` en WKT

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Code EPSG du WGS84 géographique
pub const WGS84_EPSG: u32 = 4326;

/// Système de coordonnées déclaré par une source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Crs {
    /// Code EPSG connu
    Epsg(u32),
    /// Nom d'autorité non EPSG (`ESRI:102100`, `OGC:CRS27`...) passé tel quel à PROJ
    Named(String),
    /// Définition WKT sans autorité exploitable (passée telle quelle à PROJ)
    Wkt(String),
}

impl Crs {
    /// Vrai si le CRS est déjà celui du stockage
    pub fn is_wgs84(&self) -> bool {
        matches!(self, Crs::Epsg(WGS84_EPSG))
    }

    /// Définition utilisable par PROJ
    pub fn definition(&self) -> String {
        match self {
            Crs::Epsg(code) => format!("EPSG:{}", code),
            Crs::Named(name) => name.clone(),
            Crs::Wkt(wkt) => wkt.clone(),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{}", code),
            Crs::Named(name) => f.write_str(name),
            Crs::Wkt(wkt) => {
                // Le WKT complet est illisible dans les logs
                let head: String = wkt.chars().take(48).collect();
                write!(f, "WKT[{}...]", head)
            }
        }
    }
}

fn epsg_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)EPSG:(?:[0-9.]*:)?:?(\d+)$").expect("valid regex"))
}

fn authority_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:AUTHORITY|ID)\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#).expect("valid regex")
    })
}

/// Interprète un nom de CRS GeoJSON (`urn:ogc:def:crs:EPSG::2154`, `EPSG:3857`, `CRS84`...)
///
/// Un nom non reconnu est conservé tel quel: c'est PROJ qui tranchera.
pub fn parse_crs_name(name: &str) -> Option<Crs> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let upper = name.to_ascii_uppercase();
    if upper.ends_with("CRS84") || upper.ends_with("CRS:84") {
        return Some(Crs::Epsg(WGS84_EPSG));
    }
    let epsg = epsg_name_regex()
        .captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .map(Crs::Epsg);
    Some(epsg.unwrap_or_else(|| Crs::Named(name.to_string())))
}

/// Extrait le CRS du membre `crs` d'un objet GeoJSON
///
/// `null` = CRS non déclaré. Un membre présent sans nom ni code exploitable est
/// une erreur: les coordonnées ne peuvent pas être supposées en WGS84.
pub fn from_geojson_member(crs: &serde_json::Value) -> Result<Option<Crs>, String> {
    if crs.is_null() {
        return Ok(None);
    }
    let properties = crs
        .get("properties")
        .ok_or_else(|| "crs member has no properties".to_string())?;

    match crs.get("type").and_then(|t| t.as_str()) {
        Some("name") => properties
            .get("name")
            .and_then(|n| n.as_str())
            .and_then(parse_crs_name)
            .map(Some)
            .ok_or_else(|| "crs member has no usable name".to_string()),
        Some("EPSG") => properties
            .get("code")
            .and_then(|c| {
                c.as_u64()
                    .or_else(|| c.as_str().and_then(|s| s.trim().parse().ok()))
            })
            .and_then(|c| u32::try_from(c).ok())
            .map(|c| Some(Crs::Epsg(c)))
            .ok_or_else(|| "crs member has no usable EPSG code".to_string()),
        Some(other) => Err(format!("unsupported crs type {:?}", other)),
        None => Err("crs member has no type".to_string()),
    }
}

/// Interprète le contenu d'un fichier `.prj`
///
/// La dernière `AUTHORITY["EPSG",...]` est celle du CRS englobant.
pub fn from_prj(wkt: &str) -> Option<Crs> {
    let wkt = wkt.trim();
    if wkt.is_empty() {
        return None;
    }

    if let Some(code) = authority_regex()
        .captures_iter(wkt)
        .last()
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
    {
        return Some(Crs::Epsg(code));
    }

    // Les .prj ESRI n'ont pas d'autorité: reconnaître le WGS84 géographique
    let upper = wkt.to_ascii_uppercase();
    let geographic = upper.starts_with("GEOGCS") || upper.starts_with("GEOGCRS");
    if geographic && (upper.contains("WGS_1984") || upper.contains("WGS 84") || upper.contains("WGS84")) {
        return Some(Crs::Epsg(WGS84_EPSG));
    }

    Some(Crs::Wkt(wkt.to_string()))
}
