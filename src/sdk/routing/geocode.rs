use super::error::RoutingError;
use super::geo::Coordinate;
use super::provider::types::NominatimPlace;
use super::service::Geocoder;
use crate::sdk::config::GeocoderConfig;
use crate::sdk::util::rate_limit::Limiter;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// One hit of a free-text place search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceCandidate {
    pub coordinate: Coordinate,
    pub label: String,
    pub kind: Option<String>,
}

pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    limiter: Limiter,
}

impl NominatimGeocoder {
    pub fn new(
        config: &GeocoderConfig,
        timeout: Duration,
        limiter: Limiter,
    ) -> Result<Self, RoutingError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiter,
        })
    }

    /// General place search; returns at most `limit` candidates, best first.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<PlaceCandidate>, RoutingError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RoutingError::InvalidInput(
                "search query must not be empty".to_string(),
            ));
        }
        self.query(query, limit.max(1)).await
    }

    async fn query(&self, text: &str, limit: usize) -> Result<Vec<PlaceCandidate>, RoutingError> {
        self.limiter.until_ready().await;

        let url = format!("{}/search", self.base_url);
        log::debug!("[GEOCODER] Searching \"{}\" (limit {})", text, limit);

        let limit = limit.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[("format", "json"), ("q", text), ("limit", limit.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            log::error!("Geocoder returned non-success status: {}. Body: {}", status, body);
            return Err(RoutingError::RawApiError {
                status: status.as_u16(),
                body,
            });
        }

        let places: Vec<NominatimPlace> = serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "Failed to parse geocoder response. URL: {}\nError: {}. Body: {}",
                url,
                e,
                body
            );
            e
        })?;

        places.into_iter().map(into_candidate).collect()
    }
}

fn into_candidate(place: NominatimPlace) -> Result<PlaceCandidate, RoutingError> {
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| RoutingError::MalformedResponse(format!("bad coordinate \"{}\": {}", v, e)))
    };
    let coordinate = Coordinate::new(parse(&place.lat)?, parse(&place.lon)?)
        .map_err(|e| RoutingError::MalformedResponse(e.to_string()))?;
    Ok(PlaceCandidate {
        coordinate,
        label: place.display_name,
        kind: place.kind.or(place.class),
    })
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn resolve(&self, address: &str) -> Result<Coordinate, RoutingError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(RoutingError::InvalidInput(
                "address must not be empty".to_string(),
            ));
        }

        let candidates = self.query(address, 1).await?;
        let top = candidates.into_iter().next().ok_or_else(|| RoutingError::NotFound {
            query: address.to_string(),
        })?;
        log::debug!("[GEOCODER] \"{}\" -> {} ({})", address, top.coordinate, top.label);
        Ok(top.coordinate)
    }
}
