//! HTTP adapter for the ordering API.
//!
//! All outbound calls go through [`ApiClient`]. It attaches the bearer
//! credential when one is held, decodes successful JSON bodies and turns
//! every failure into an [`ApiError`]. Failures are always returned to the
//! caller; notifications and session invalidation are published on the
//! [`EventBus`] as side effects.

use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::events::{ClientEvent, EventBus};
use crate::session::SessionState;

/// Client for the ordering REST API.
///
/// Cheap to clone; clones share the connection pool, session state and
/// event bus.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    config: ClientConfig,
    session: Arc<SessionState>,
    events: EventBus,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Client` if the HTTP client cannot be created.
    pub fn new(
        config: ClientConfig,
        session: Arc<SessionState>,
        events: EventBus,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ApiError::Client)?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                config,
                session,
                events,
            }),
        })
    }

    /// Configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Session state whose credential is attached to requests.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionState> {
        &self.inner.session
    }

    /// Event bus failures are published on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    // =========================================================================
    // Request helpers
    // =========================================================================

    /// `GET` a JSON resource.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body cannot be decoded.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(Method::GET, path, |request| request).await
    }

    /// `GET` a JSON resource with query parameters.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body cannot be decoded.
    pub async fn get_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + Sync + ?Sized,
    {
        self.send(Method::GET, path, |request| request.query(query))
            .await
    }

    /// `POST` a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body cannot be decoded.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        self.send(Method::POST, path, |request| request.json(body))
            .await
    }

    /// `POST` without a body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body cannot be decoded.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(Method::POST, path, |request| request).await
    }

    /// `PATCH` a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body cannot be decoded.
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        self.send(Method::PATCH, path, |request| request.json(body))
            .await
    }

    /// `DELETE` a resource.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body cannot be decoded.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(Method::DELETE, path, |request| request).await
    }

    // =========================================================================
    // Core
    // =========================================================================

    #[instrument(skip(self, build), fields(method = %method, path = %path))]
    async fn send<T, F>(&self, method: Method, path: &str, build: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> RequestBuilder + Send,
    {
        let url = self.inner.config.endpoint(path)?;
        let mut request = build(self.inner.client.request(method, url));
        if let Some(credential) = self.inner.session.credential() {
            request = request.header(AUTHORIZATION, credential.bearer());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => return Err(ApiError::Client(e)),
            Err(e) => return Err(self.fail(ApiError::NetworkUnavailable(e))),
        };

        let status = response.status();
        if status.is_success() {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| self.fail(ApiError::NetworkUnavailable(e)))?;
            tracing::debug!(status = status.as_u16(), len = bytes.len(), "Request succeeded");

            // 204 and friends decode as JSON null so `()` callers work
            let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
            return Ok(serde_json::from_slice(body)?);
        }

        let body = response.json::<Value>().await.ok();
        Err(self.fail(ApiError::from_status(status, body.as_ref())))
    }

    /// Publish the side effects of a failed request and hand the error back.
    fn fail(&self, error: ApiError) -> ApiError {
        if error.is_unauthorized() {
            tracing::warn!("Credential rejected, invalidating session");
            self.inner.session.clear();
            self.inner.events.emit(ClientEvent::SessionInvalidated {
                login_path: self.inner.config.login_path.clone(),
            });
        } else if let Some(notification) = error.notification() {
            tracing::warn!(error = %error, "Request failed");
            self.inner.events.notify(notification);
        }
        error
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.config.api_base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;
    use crate::error::NETWORK_UNAVAILABLE_MESSAGE;
    use crate::events::Notification;
    use crate::storage::MemoryStorage;

    fn unreachable_base() -> Url {
        // Bind then drop so nothing is listening on the port
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        Url::parse(&format!("http://127.0.0.1:{port}/api")).unwrap()
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_unavailable() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let session = Arc::new(SessionState::new(Arc::new(MemoryStorage::new())));
        let client = ApiClient::new(ClientConfig::new(unreachable_base()), session, events).unwrap();

        let err = client.get::<Value>("/auth/me/").await.unwrap_err();
        assert!(matches!(err, ApiError::NetworkUnavailable(_)));
        assert_eq!(
            rx.recv().await.unwrap(),
            ClientEvent::Notify(Notification::new(NETWORK_UNAVAILABLE_MESSAGE))
        );
    }
}
