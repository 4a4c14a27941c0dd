//! Main API client implementation

use crate::config::ClientConfig;
use crate::endpoints::{FavoritesApi, NearbyApi, SessionApi};
use crate::error::{ApiError, ApiResult, ErrorContext};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Request correlation ID header
const X_REQUEST_ID: &str = "X-Request-ID";

/// API key header for Supabase
const APIKEY_HEADER: &str = "apikey";

/// Client for the hosted record store (PostgREST tables and RPCs plus the
/// auth endpoint).
///
/// Requests carry the anon key, the user's bearer token when signed in, and a
/// correlation id. Nothing is retried here; retry is a user action.
#[derive(Clone)]
pub struct FindixiClient {
    inner: Client,
    config: Arc<ClientConfig>,
}

impl std::fmt::Debug for FindixiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FindixiClient")
            .field("base_url", &self.config.base_url)
            .field("signed_in", &self.config.access_token.is_some())
            .finish_non_exhaustive()
    }
}

impl FindixiClient {
    /// Create a new client with configuration from environment
    pub fn new() -> ApiResult<Self> {
        let config = ClientConfig::from_env()?;
        Self::with_config(config)
    }

    /// Create a new client with specific configuration
    pub fn with_config(config: ClientConfig) -> ApiResult<Self> {
        config.validate()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(USER_AGENT, HeaderValue::from_static("findixi-api-client/1.0"));

        if let Some(ref key) = config.anon_key {
            if let Ok(value) = HeaderValue::from_str(key) {
                default_headers.insert(APIKEY_HEADER, value);
            }
        }

        let inner = Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(ApiError::Request)?;

        Ok(Self {
            inner,
            config: Arc::new(config),
        })
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the project URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    // -------------------------------------------------------------------------
    // Endpoint API accessors
    // -------------------------------------------------------------------------

    /// Access the nearby search RPC
    #[must_use]
    pub fn nearby(&self) -> NearbyApi {
        NearbyApi::new(self.clone())
    }

    /// Access the favorites table
    #[must_use]
    pub fn favorites(&self) -> FavoritesApi {
        FavoritesApi::new(self.clone())
    }

    /// Access the auth session
    #[must_use]
    pub fn session(&self) -> SessionApi {
        SessionApi::new(self.clone())
    }

    // -------------------------------------------------------------------------
    // Low-level HTTP methods
    // -------------------------------------------------------------------------

    /// Perform a GET request relative to the project URL
    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request(Method::GET, path, Option::<&()>::None).await
    }

    /// Perform a POST request relative to the project URL
    #[instrument(skip(self, body))]
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> ApiResult<T> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Perform a GET request and return the raw response, for callers that
    /// treat some error statuses as data
    pub async fn get_raw(&self, path: &str) -> ApiResult<Response> {
        let url = self.url(path);
        let request_id = Uuid::new_v4().to_string();
        let response = self
            .authorized(self.inner.get(&url))
            .header(X_REQUEST_ID, &request_id)
            .send()
            .await?;
        Ok(response)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.access_token.as_deref().or(self.config.anon_key.as_deref()) {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ApiResult<T> {
        let url = self.url(path);
        let request_id = Uuid::new_v4().to_string();
        let mut request = self
            .authorized(self.inner.request(method.clone(), &url))
            .header(X_REQUEST_ID, &request_id);

        if let Some(b) = body {
            request = request.json(b);
        }

        let start = Instant::now();
        let result = match request.send().await {
            Ok(response) => handle_response(response).await,
            Err(e) if e.is_timeout() => Err(ApiError::Timeout(self.config.timeout)),
            Err(e) => Err(ApiError::Request(e)),
        };

        match &result {
            Ok(_) => debug!(
                request_id = %request_id,
                elapsed_ms = start.elapsed().as_millis(),
                "Request succeeded"
            ),
            Err(e) => {
                let context = ErrorContext {
                    request_id: Some(request_id.clone()),
                    endpoint: path.to_string(),
                    method: method.to_string(),
                };
                warn!(context = %context, error = %e, "Request failed");
            }
        }
        result
    }
}

/// Handle HTTP response and deserialize
async fn handle_response<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();

    if status.is_success() {
        response.json().await.map_err(ApiError::Request)
    } else {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(ApiError::api_response(status.as_u16(), message))
    }
}
