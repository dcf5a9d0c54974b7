//! Position approximative de la machine via un service de géolocalisation IP
//!
//! Le service doit répondre un objet JSON avec un champ `"loc": "lat,lon"`
//! (format ipinfo.io).

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

/// Endpoint par défaut
pub const DEFAULT_LOCATION_URL: &str = "https://ipinfo.io/json";

/// Variable d'environnement remplaçant l'endpoint
pub const LOCATION_URL_ENV: &str = "LOCATION_SERVICE_URL";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Location service returned HTTP {0}")]
    Status(StatusCode),

    #[error("No location data in response: {0}")]
    MissingLocation(String),

    #[error("Invalid location value: {0:?}")]
    InvalidLocation(String),
}

/// Client du service de géolocalisation (timeout 5 s, pas de retry)
pub struct LocationClient {
    client: Client,
    url: String,
}

impl LocationClient {
    pub fn new(url: impl Into<String>) -> Result<Self, LocationError> {
        let client = Client::builder()
            .user_agent(concat!("poi-pg/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Endpoint depuis `LOCATION_SERVICE_URL`, sinon ipinfo.io
    pub fn from_env() -> Result<Self, LocationError> {
        let url = std::env::var(LOCATION_URL_ENV).unwrap_or_else(|_| DEFAULT_LOCATION_URL.into());
        Self::new(url)
    }

    /// Retourne `(latitude, longitude)`
    pub async fn current_location(&self) -> Result<(f64, f64), LocationError> {
        debug!(url = %self.url, "Requesting current location");
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LocationError::Status(status));
        }

        let body: Value = response.json().await?;
        let loc = body
            .get("loc")
            .and_then(Value::as_str)
            .ok_or_else(|| LocationError::MissingLocation(body.to_string()))?;

        let (latitude, longitude) = parse_loc(loc)?;
        info!(latitude, longitude, "Current location resolved");
        Ok((latitude, longitude))
    }
}

/// Parse `"lat,lon"` en coordonnées WGS84
pub fn parse_loc(loc: &str) -> Result<(f64, f64), LocationError> {
    let invalid = || LocationError::InvalidLocation(loc.to_string());

    let (lat, lon) = loc.split_once(',').ok_or_else(invalid)?;
    let latitude: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let longitude: f64 = lon.trim().parse().map_err(|_| invalid())?;

    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(invalid());
    }
    Ok((latitude, longitude))
}
