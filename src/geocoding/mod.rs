//! Address → coordinates lookups.
//!
//! One outbound request per lookup, no retries. The default client speaks the
//! Google Geocoding JSON API.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::GeocodingConfig;
use crate::database::models::Location;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("no coordinates found for address")]
    AddressNotFound,

    #[error("geocoding service rejected the request: {0}")]
    Rejected(String),

    #[error("invalid geocoding endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn locate(&self, address: &str) -> Result<Location, GeocodeError>;
}

pub struct GoogleGeocoder {
    client: reqwest::Client,
    endpoint: url::Url,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self, GeocodeError> {
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: url::Url::parse(&config.endpoint)?,
            api_key: config.api_key.clone(),
        })
    }

    fn request_url(&self, address: &str) -> url::Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("address", address)
            .append_pair("key", &self.api_key);
        url
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn locate(&self, address: &str) -> Result<Location, GeocodeError> {
        let response = self
            .client
            .get(self.request_url(address))
            .send()
            .await?
            .error_for_status()?;

        let body = response.bytes().await?;
        // An unparseable body is treated like an empty answer
        let parsed = serde_json::from_slice::<GeocodeResponse>(&body).ok();
        debug!(status = parsed.as_ref().map(|r| r.status.as_str()), "geocoding response");

        location_from_response(parsed)
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

fn location_from_response(response: Option<GeocodeResponse>) -> Result<Location, GeocodeError> {
    let Some(response) = response else {
        return Err(GeocodeError::AddressNotFound);
    };

    match response.status.as_str() {
        "OK" | "ZERO_RESULTS" => response
            .results
            .into_iter()
            .next()
            .map(|result| result.geometry.location)
            .ok_or(GeocodeError::AddressNotFound),
        other => Err(GeocodeError::Rejected(other.to_string())),
    }
}
