use anyhow::Context;
use serde_json::json;

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::geocoding::{GeocodeError, Geocoder, GoogleGeocoder};

pub async fn handle(address: &str, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    if config.geocoding.api_key.is_empty() {
        tracing::warn!("GOOGLE_API_KEY is not set; the geocoding service will likely refuse the request");
    }

    let geocoder = GoogleGeocoder::new(&config.geocoding).context("invalid geocoding endpoint")?;

    match geocoder.locate(address).await {
        Ok(location) => output_success(
            &output_format,
            &format!("{} -> {}, {}", address, location.lat, location.lng),
            Some(json!({ "address": address, "location": location })),
        ),
        Err(GeocodeError::AddressNotFound) => {
            output_error(&output_format, "Could not get coordinates for given address", Some("ADDRESS_NOT_FOUND"))?;
            anyhow::bail!("no coordinates for {:?}", address)
        }
        Err(e) => Err(e).context("geocoding request failed"),
    }
}
