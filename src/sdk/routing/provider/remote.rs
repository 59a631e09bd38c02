use super::types::DirectionsResponse;
use crate::sdk::config::{DirectionsConfig, DistanceUnit};
use crate::sdk::routing::error::{OrsErrorPayload, RoutingError};
use crate::sdk::routing::geo::Coordinate;
use crate::sdk::routing::route::ProviderRoute;
use crate::sdk::routing::service::RouteClient;
use crate::sdk::util::rate_limit::Limiter;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Directions from openrouteservice, hosted or self-hosted.
pub struct OrsRouteClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    profile: String,
    language: String,
    units: DistanceUnit,
    limiter: Limiter,
}

impl OrsRouteClient {
    pub fn new(
        config: &DirectionsConfig,
        timeout: Duration,
        limiter: Limiter,
    ) -> Result<Self, RoutingError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: config.ors.api_key().map(str::to_string),
            base_url: config.ors.base_url().trim_end_matches('/').to_string(),
            profile: config.profile.clone(),
            language: config.language.clone(),
            units: config.units,
            limiter,
        })
    }

    fn directions_url(&self) -> String {
        format!("{}/v2/directions/{}", self.base_url, self.profile)
    }
}

#[async_trait]
impl RouteClient for OrsRouteClient {
    async fn fetch_route(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<ProviderRoute, RoutingError> {
        self.limiter.until_ready().await;
        log::debug!(
            "[PROVIDER] Calling ORS directions for {} -> {}",
            start,
            end
        );

        let url = self.directions_url();
        let start_param = start.to_lng_lat_param();
        let end_param = end.to_lng_lat_param();
        let mut request = self.client.get(&url).query(&[
            ("start", start_param.as_str()),
            ("end", end_param.as_str()),
            ("format", "geojson"),
            ("instructions", "true"),
            ("language", self.language.as_str()),
            ("units", self.units.as_query()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", key);
        }

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                log::error!("Failed to send directions request. URL: {}\nError: {}", url, e);
                return Err(e.into());
            }
        };

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            // Try to parse the structured error first
            if let Ok(payload) = serde_json::from_str::<OrsErrorPayload>(&text) {
                return Err(RoutingError::ApiError {
                    code: payload.error.code,
                    message: payload.error.message,
                });
            }
            log::error!(
                "API returned non-success status: {}. Unparseable Body: {}",
                status,
                text
            );
            return Err(RoutingError::RawApiError {
                status: status.as_u16(),
                body: text,
            });
        }

        let route_response: DirectionsResponse = serde_json::from_str(&text).map_err(|e| {
            log::error!(
                "Failed to parse DirectionsResponse. URL: {}\nError: {}. Body: {}",
                url,
                e,
                text
            );
            e
        })?;

        route_response.into_provider_route(self.units)
    }
}
