//! HTTP permission fetcher
//!
//! `GET <permissions_url>` with the actor's bearer token. The body is a
//! permission set in wire form (see `permissions::PermissionSet`).

use reqwest::Client;

use crate::core::{ActorContext, LoadError};
use crate::permissions::PermissionSet;

use super::fetcher::PermissionFetcher;

/// Header carrying the actor id
pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";

/// Header carrying the actor role
pub const ACTOR_ROLE_HEADER: &str = "X-Actor-Role";

/// Fetches permission sets from the console's REST endpoint
#[derive(Debug, Clone)]
pub struct HttpPermissionFetcher {
    client: Client,
    url: String,
}

impl HttpPermissionFetcher {
    /// Create a fetcher for the given endpoint
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    /// Create a fetcher sharing an existing client
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Endpoint this fetcher calls
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Map a non-success HTTP status to a load error
///
/// Returns `None` for 2xx.
pub fn classify_status(status: u16) -> Option<LoadError> {
    match status {
        200..=299 => None,
        401 | 403 => Some(LoadError::auth_expired(format!(
            "permission service rejected credentials ({})",
            status
        ))),
        _ => Some(LoadError::network(format!(
            "permission service returned status {}",
            status
        ))),
    }
}

#[async_trait::async_trait]
impl PermissionFetcher for HttpPermissionFetcher {
    async fn fetch(&self, actor: &ActorContext) -> Result<PermissionSet, LoadError> {
        let mut request = self
            .client
            .get(&self.url)
            .header(ACTOR_ID_HEADER, actor.actor_id.as_str())
            .header(ACTOR_ROLE_HEADER, actor.role.as_str());

        if let Some(token) = &actor.access_token {
            request = request.bearer_auth(token);
        }

        tracing::debug!("GET {} for actor {}", self.url, actor.actor_id);

        let response = request
            .send()
            .await
            .map_err(|e| LoadError::network(e.to_string()))?;

        if let Some(err) = classify_status(response.status().as_u16()) {
            return Err(err);
        }

        let body = response
            .text()
            .await
            .map_err(|e| LoadError::network(e.to_string()))?;

        PermissionSet::from_json(&body)
    }
}
