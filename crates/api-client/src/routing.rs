//! OSRM driving-route lookups behind a circuit breaker

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use findixi_core::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use findixi_discovery::{RouteSummary, RoutingError, RoutingService};
use findixi_geo::Coordinate;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RouteResponse {
    #[serde(default)]
    routes: Vec<RouteEntry>,
}

#[derive(Debug, Deserialize)]
struct RouteEntry {
    distance: Option<f64>,
    duration: Option<f64>,
}

/// Routing client for an OSRM server.
///
/// Consecutive failures open the breaker; while it is open lookups fail fast
/// with [`RoutingError::CircuitOpen`] and callers use their analytic fallback.
#[derive(Clone)]
pub struct OsrmClient {
    inner: Client,
    base_url: String,
    timeout: Duration,
    breaker: Arc<CircuitBreaker>,
}

impl std::fmt::Debug for OsrmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsrmClient")
            .field("base_url", &self.base_url)
            .field("breaker", &self.breaker.state())
            .finish_non_exhaustive()
    }
}

impl OsrmClient {
    /// Create a routing client from the client configuration
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        Self::with_breaker(config, CircuitBreakerConfig::default())
    }

    /// Create a routing client with a specific breaker configuration
    pub fn with_breaker(config: &ClientConfig, breaker: CircuitBreakerConfig) -> ApiResult<Self> {
        if !config.routing_url.starts_with("http://") && !config.routing_url.starts_with("https://") {
            return Err(ApiError::InvalidUrl(config.routing_url.clone()));
        }
        let inner = Client::builder()
            .timeout(config.routing_timeout)
            .build()
            .map_err(ApiError::Request)?;

        Ok(Self {
            inner,
            base_url: config.routing_url.trim_end_matches('/').to_string(),
            timeout: config.routing_timeout,
            breaker: Arc::new(CircuitBreaker::new(breaker)),
        })
    }

    /// The breaker guarding this client
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn route_url(&self, origin: Coordinate, destination: Coordinate) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=false",
            self.base_url, origin.longitude, origin.latitude, destination.longitude, destination.latitude
        )
    }

    async fn fetch(&self, url: &str) -> ApiResult<RouteResponse> {
        let response = match self.inner.get(url).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Err(ApiError::Timeout(self.timeout)),
            Err(e) => return Err(ApiError::Request(e)),
        };

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::api_response(status.as_u16(), message));
        }
        Ok(response.json().await?)
    }
}

/// First route of an OSRM response, if it has usable numbers.
fn first_route(response: &RouteResponse) -> Option<RouteSummary> {
    let route = response.routes.first()?;
    let summary = RouteSummary {
        distance_meters: route.distance?,
        duration_seconds: route.duration?,
    };
    (summary.distance_meters.is_finite() && summary.duration_seconds.is_finite()).then_some(summary)
}

impl RoutingService for OsrmClient {
    async fn driving_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<RouteSummary, RoutingError> {
        let url = self.route_url(origin, destination);
        // The server answering without a route is not a service failure.
        let response = self.breaker.call(|| self.fetch(&url)).await.map_err(|e| match e {
            CircuitBreakerError::CircuitOpen => RoutingError::CircuitOpen,
            CircuitBreakerError::ExecutionFailed(e) => {
                debug!(error = %e, "Routing lookup failed");
                RoutingError::from(e)
            }
        })?;
        first_route(&response).ok_or(RoutingError::NoRoute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use findixi_core::circuit_breaker::CircuitState;

    fn client(url: &str) -> OsrmClient {
        let config = ClientConfig::development().with_routing_url(url);
        OsrmClient::with_breaker(
            &config,
            CircuitBreakerConfig {
                failure_threshold: 2,
                success_threshold: 1,
                reset_timeout: Duration::from_secs(60),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_route_url() {
        let osrm = client("https://osrm.example.com/");
        let url = osrm.route_url(Coordinate::new(18.4655, -66.1057), Coordinate::new(18.0111, -66.6141));
        assert_eq!(
            url,
            "https://osrm.example.com/route/v1/driving/-66.1057,18.4655;-66.6141,18.0111?overview=false"
        );
    }

    #[test]
    fn test_first_route() {
        let response: RouteResponse = serde_json::from_value(serde_json::json!({
            "code": "Ok",
            "routes": [{"distance": 12034.5, "duration": 901.2}, {"distance": 1.0, "duration": 1.0}]
        }))
        .unwrap();
        let summary = first_route(&response).unwrap();
        assert!((summary.distance_meters - 12034.5).abs() < f64::EPSILON);
        assert!((summary.duration_seconds - 901.2).abs() < f64::EPSILON);

        let empty: RouteResponse = serde_json::from_value(serde_json::json!({"code": "NoRoute"})).unwrap();
        assert!(first_route(&empty).is_none());

        let partial: RouteResponse =
            serde_json::from_value(serde_json::json!({"routes": [{"distance": 10.0}]})).unwrap();
        assert!(first_route(&partial).is_none());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let config = ClientConfig::development().with_routing_url("osrm.local");
        assert!(matches!(OsrmClient::new(&config), Err(ApiError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_breaker_opens_on_unreachable_server() {
        // Nothing listens on port 9 (discard) on loopback in test environments.
        let osrm = client("http://127.0.0.1:9");
        let a = Coordinate::new(18.4655, -66.1057);
        let b = Coordinate::new(18.4700, -66.1100);

        assert!(osrm.driving_route(a, b).await.is_err());
        assert!(osrm.driving_route(a, b).await.is_err());
        assert_eq!(osrm.breaker().state(), CircuitState::Open);
        assert!(matches!(osrm.driving_route(a, b).await, Err(RoutingError::CircuitOpen)));
    }
}
