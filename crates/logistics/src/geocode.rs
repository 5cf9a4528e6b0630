use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use rentatool_core::config::GeocoderConfig;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Resolves a free-text address to coordinates. An unresolvable address is a
/// normal outcome, not an error: transport failures and malformed payloads
/// all come back as `None`.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, address: &str) -> Option<GeoPoint>;
}

pub struct YandexGeocoder {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl YandexGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Geocoder for YandexGeocoder {
    async fn resolve(&self, address: &str) -> Option<GeoPoint> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("apikey", self.api_key.expose_secret()),
                ("format", "json"),
                ("geocode", address),
            ])
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                warn!(error = %error, "geocoder request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "geocoder rejected the request");
            return None;
        }

        let payload: serde_json::Value = match response.json().await {
            Ok(payload) => payload,
            Err(error) => {
                warn!(error = %error, "geocoder response was not valid json");
                return None;
            }
        };

        let point = extract_position(&payload);
        if point.is_none() {
            warn!("geocoder returned no usable candidate");
        }
        point
    }
}

/// Pulls the first candidate's `Point.pos` out of the provider payload. The
/// field is a two-number string in "lon lat" order.
pub(crate) fn extract_position(payload: &serde_json::Value) -> Option<GeoPoint> {
    let pos = payload
        .get("response")?
        .get("GeoObjectCollection")?
        .get("featureMember")?
        .get(0)?
        .get("GeoObject")?
        .get("Point")?
        .get("pos")?
        .as_str()?;

    let mut parts = pos.split_whitespace();
    let lon: f64 = parts.next()?.parse().ok()?;
    let lat: f64 = parts.next()?.parse().ok()?;
    Some(GeoPoint { lat, lon })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn well_formed_payload() -> serde_json::Value {
        serde_json::json!({
            "response": {
                "GeoObjectCollection": {
                    "featureMember": [
                        {
                            "GeoObject": {
                                "name": "Sikeirosa, 20",
                                "Point": { "pos": "30.321386 60.009813" }
                            }
                        }
                    ]
                }
            }
        })
    }

    #[test]
    fn extracts_lat_lon_from_lon_lat_string() {
        let point = extract_position(&well_formed_payload()).expect("point");
        assert_eq!(point.lat, 60.009813);
        assert_eq!(point.lon, 30.321386);
    }

    #[test]
    fn empty_candidate_list_is_unresolved() {
        let payload = serde_json::json!({
            "response": { "GeoObjectCollection": { "featureMember": [] } }
        });
        assert_eq!(extract_position(&payload), None);
    }

    #[test]
    fn malformed_payloads_are_unresolved() {
        for payload in [
            serde_json::json!({}),
            serde_json::json!({"response": {}}),
            serde_json::json!({"response": {"GeoObjectCollection": {"featureMember": [
                {"GeoObject": {"Point": {"pos": "not numbers"}}}
            ]}}}),
            serde_json::json!({"response": {"GeoObjectCollection": {"featureMember": [
                {"GeoObject": {"Point": {"pos": "30.1"}}}
            ]}}}),
        ] {
            assert_eq!(extract_position(&payload), None, "payload: {payload}");
        }
    }
}
