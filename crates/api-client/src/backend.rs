//! Discovery collaborators over HTTP
//!
//! [`FindixiClient`] serves as the record store, the session provider and the
//! remote favorites source of a `ProximityQueryEngine`.

use crate::client::FindixiClient;
use findixi_discovery::{
    BackendError, FavoritesBackend, NearbyQuery, PointOfInterest, ProximityBackend, SessionProvider, UserSession,
};

impl ProximityBackend for FindixiClient {
    async fn query_nearby(&self, query: &NearbyQuery) -> Result<Vec<PointOfInterest>, BackendError> {
        Ok(self.nearby().search(query).await?)
    }
}

impl SessionProvider for FindixiClient {
    async fn current_session(&self) -> Result<Option<UserSession>, BackendError> {
        let user = self.session().current().await?;
        Ok(user.map(|u| UserSession { user_id: u.id }))
    }
}

impl FavoritesBackend for FindixiClient {
    async fn favorite_ids(&self, user_id: &str) -> Result<Vec<i64>, BackendError> {
        Ok(self.favorites().ids(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    #[tokio::test]
    async fn test_signed_out_without_token() {
        let client = FindixiClient::with_config(ClientConfig::development()).unwrap();
        assert_eq!(client.current_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        let config = ClientConfig::development()
            .with_base_url("http://127.0.0.1:9")
            .with_timeout(std::time::Duration::from_secs(2));
        let client = FindixiClient::with_config(config).unwrap();
        let err = client.favorite_ids("user-1").await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
    }
}
