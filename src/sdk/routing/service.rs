use super::error::RoutingError;
use super::geo::Coordinate;
use super::route::ProviderRoute;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolves free-text address to the top match. One attempt, no retries.
    async fn resolve(&self, address: &str) -> Result<Coordinate, RoutingError>;
}

#[async_trait]
pub trait RouteClient: Send + Sync {
    /// Requests a routed path with turn instructions. One attempt, no retries.
    async fn fetch_route(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<ProviderRoute, RoutingError>;
}

#[async_trait]
impl<T: Geocoder + ?Sized> Geocoder for Arc<T> {
    async fn resolve(&self, address: &str) -> Result<Coordinate, RoutingError> {
        (**self).resolve(address).await
    }
}

#[async_trait]
impl<T: RouteClient + ?Sized> RouteClient for Arc<T> {
    async fn fetch_route(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<ProviderRoute, RoutingError> {
        (**self).fetch_route(start, end).await
    }
}
