//! Auth session endpoint

use crate::client::FindixiClient;
use crate::error::{ApiError, ApiResult};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

const USER_PATH: &str = "auth/v1/user";

/// The signed-in user as returned by the auth service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthUser {
    /// User id
    pub id: String,
}

/// Session API interface
#[derive(Clone)]
pub struct SessionApi {
    client: FindixiClient,
}

impl SessionApi {
    /// Create a new session API interface
    pub(crate) fn new(client: FindixiClient) -> Self {
        Self { client }
    }

    /// The user the access token belongs to.
    ///
    /// GET /auth/v1/user
    ///
    /// Returns `None` without an access token or when the token is rejected.
    pub async fn current(&self) -> ApiResult<Option<AuthUser>> {
        if self.client.config().access_token.is_none() {
            return Ok(None);
        }

        let response = self.client.get_raw(USER_PATH).await?;
        let status = response.status();
        if is_signed_out(status) {
            debug!(status = status.as_u16(), "Access token rejected, treating as signed out");
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::api_response(status.as_u16(), message));
        }

        let user: AuthUser = response.json().await?;
        Ok((!user.id.is_empty()).then_some(user))
    }
}

fn is_signed_out(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}
