use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, warn};

use rentatool_core::config::LogisticsConfig;

use crate::geocode::{GeoPoint, Geocoder};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QuoteError {
    /// The destination text could not be turned into coordinates, either
    /// because it lacks a street/building pair or because the geocoder found
    /// no candidate. The user can retry with a corrected address.
    #[error("destination address could not be resolved")]
    UnresolvableAddress,
    #[error("quote provider failure: {0}")]
    Provider(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeliveryQuote {
    /// Fee in whole currency units, rounded up.
    pub fee: i64,
    /// Full provider response, kept for logging and dispute trails.
    pub raw_detail: serde_json::Value,
}

/// One end of the delivery route.
#[derive(Clone, Debug, PartialEq)]
pub struct RoutePoint {
    pub name: String,
    pub street: String,
    pub building: String,
    pub lat: f64,
    pub lon: f64,
}

impl RoutePoint {
    pub fn origin_from_config(config: &LogisticsConfig) -> Self {
        Self {
            name: config.origin_name.clone(),
            street: config.origin_street.clone(),
            building: config.origin_building.clone(),
            lat: config.origin_lat,
            lon: config.origin_lon,
        }
    }
}

/// Stateless, idempotent delivery quoting: each call is independent, so a
/// failed quote is always safe to retry.
#[async_trait]
pub trait DeliveryQuotes: Send + Sync {
    async fn quote(
        &self,
        origin: &RoutePoint,
        destination_text: &str,
        cargo_weight_kg: f64,
    ) -> Result<DeliveryQuote, QuoteError>;
}

pub struct YandexCargoClient {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
    city_prefix: String,
    geocoder: Arc<dyn Geocoder>,
}

impl YandexCargoClient {
    pub fn new(
        config: &LogisticsConfig,
        geocoder: Arc<dyn Geocoder>,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            city_prefix: config.city_prefix.clone(),
            geocoder,
        })
    }
}

#[async_trait]
impl DeliveryQuotes for YandexCargoClient {
    async fn quote(
        &self,
        origin: &RoutePoint,
        destination_text: &str,
        cargo_weight_kg: f64,
    ) -> Result<DeliveryQuote, QuoteError> {
        let (street, building) = parse_destination(destination_text)?;

        let full_address = format!("{}, {street}, {building}", self.city_prefix);
        let Some(point) = self.geocoder.resolve(&full_address).await else {
            return Err(QuoteError::UnresolvableAddress);
        };

        let destination = RoutePoint {
            name: full_address,
            street,
            building,
            lat: point.lat,
            lon: point.lon,
        };
        let body = pricing_request_body(origin, &destination, cargo_weight_kg);

        let response = self
            .http
            .post(format!("{}/check-price", self.base_url))
            .bearer_auth(self.token.expose_secret())
            .header("Accept-Language", "en")
            .json(&body)
            .send()
            .await
            .map_err(|error| QuoteError::Provider(error.to_string()))?;

        let status = response.status();
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|error| QuoteError::Provider(error.to_string()))?;

        if !status.is_success() {
            warn!(status = %status, payload = %payload, "quote provider rejected the request");
            return Err(QuoteError::Provider(format!("status {status}")));
        }

        let Some(fee) = parse_fee(&payload) else {
            return Err(QuoteError::Provider("response carried no price field".to_string()));
        };
        debug!(fee, "delivery quote resolved");
        Ok(DeliveryQuote { fee, raw_detail: payload })
    }
}

/// Normalizes free-text destination into a (street, building) pair. Comma
/// separated; anything past the second component (apartment, notes) is left
/// to the courier.
pub(crate) fn parse_destination(text: &str) -> Result<(String, String), QuoteError> {
    let mut parts = text.split(',').map(str::trim).filter(|part| !part.is_empty());
    match (parts.next(), parts.next()) {
        (Some(street), Some(building)) => Ok((street.to_string(), building.to_string())),
        _ => Err(QuoteError::UnresolvableAddress),
    }
}

fn route_point_json(point: &RoutePoint, id: u32) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "fullname": point.name,
        "street": point.street,
        "building": point.building,
        "coordinates": [point.lon, point.lat],
    })
}

pub(crate) fn pricing_request_body(
    origin: &RoutePoint,
    destination: &RoutePoint,
    cargo_weight_kg: f64,
) -> serde_json::Value {
    serde_json::json!({
        "items": [
            {
                "quantity": 1,
                "weight": cargo_weight_kg,
                "pickup_point": 1,
                "dropoff_point": 2,
            }
        ],
        "route_points": [
            route_point_json(origin, 1),
            route_point_json(destination, 2),
        ],
    })
}

/// The provider encodes `price` as a decimal string; tolerate a bare number
/// too. Rounded up so the quoted total never undercharges.
pub(crate) fn parse_fee(payload: &serde_json::Value) -> Option<i64> {
    let price = payload.get("price")?;
    let value = match price {
        serde_json::Value::String(text) => text.parse::<f64>().ok()?,
        serde_json::Value::Number(number) => number.as_f64()?,
        _ => return None,
    };
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value.ceil() as i64)
}
