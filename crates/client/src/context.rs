//! Application context.
//!
//! [`Zdrink`] wires the client together once at startup and hands out the
//! individual contexts. There is no global state: everything reachable from
//! a `Zdrink` was built by [`Zdrink::new`] and is dropped with it.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::cart::CartContext;
use crate::catalog::CatalogApi;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::events::{ClientEvent, EventBus};
use crate::guard::NavigationGuard;
use crate::http::ApiClient;
use crate::orders::OrdersApi;
use crate::session::{SessionContext, SessionState};
use crate::storage::{FileStorage, TokenStorage};

/// Everything the application needs to talk to the ordering API.
#[derive(Clone)]
pub struct Zdrink {
    api: ApiClient,
    session: SessionContext,
    cart: CartContext,
    catalog: CatalogApi,
    orders: OrdersApi,
    guard: NavigationGuard,
}

impl Zdrink {
    /// Build the client, restoring any credential held by `storage`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if storage cannot be read or the HTTP client
    /// cannot be created.
    pub fn new(config: ClientConfig, storage: Arc<dyn TokenStorage>) -> Result<Self, ApiError> {
        let events = EventBus::new();
        let state = Arc::new(SessionState::restore(storage)?);
        let catalog_ttl = config.catalog_cache_ttl;
        let api = ApiClient::new(config, Arc::clone(&state), events)?;

        Ok(Self {
            session: SessionContext::new(api.clone()),
            cart: CartContext::new(api.clone()),
            catalog: CatalogApi::new(api.clone(), catalog_ttl),
            orders: OrdersApi::new(api.clone()),
            guard: NavigationGuard::new(state),
            api,
        })
    }

    /// Build the client with credentials kept in `config.state_file`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the state file is unreadable or the HTTP client
    /// cannot be created.
    pub fn from_config(config: ClientConfig) -> Result<Self, ApiError> {
        let storage = Arc::new(FileStorage::new(config.state_file.clone()));
        Self::new(config, storage)
    }

    /// Fetch the identity for a restored credential. Never fails; see
    /// [`SessionContext::initialize`].
    pub async fn initialize(&self) {
        self.session.initialize().await;
    }

    /// Subscribe to notifications and session invalidation.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.api.events().subscribe()
    }

    #[must_use]
    pub const fn session(&self) -> &SessionContext {
        &self.session
    }

    #[must_use]
    pub const fn cart(&self) -> &CartContext {
        &self.cart
    }

    #[must_use]
    pub const fn catalog(&self) -> &CatalogApi {
        &self.catalog
    }

    #[must_use]
    pub const fn orders(&self) -> &OrdersApi {
        &self.orders
    }

    #[must_use]
    pub const fn guard(&self) -> &NavigationGuard {
        &self.guard
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Log out locally and forget cached data.
    pub fn logout(&self) {
        self.session.logout();
        self.cart.reset();
        self.catalog.invalidate_all();
    }

    /// Release the context. In-memory caches are dropped; the persisted
    /// credential is kept for the next start.
    pub fn shutdown(self) {
        self.catalog.invalidate_all();
        tracing::debug!("Client context shut down");
    }
}

impl std::fmt::Debug for Zdrink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zdrink")
            .field("api", &self.api)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;
    use crate::guard::GuardDecision;
    use crate::storage::MemoryStorage;

    fn config() -> ClientConfig {
        ClientConfig::new(Url::parse("http://127.0.0.1:9/api").unwrap())
    }

    #[test]
    fn test_restores_credential_from_storage() {
        let storage = Arc::new(MemoryStorage::with_entries([("token", "a1")]));
        let app = Zdrink::new(config(), storage).unwrap();

        assert!(app.session().is_authenticated());
        assert!(matches!(app.guard().check("/cart"), GuardDecision::Proceed(_)));
    }

    #[test]
    fn test_logout_shares_state_with_guard() {
        let storage = Arc::new(MemoryStorage::with_entries([("token", "a1")]));
        let app = Zdrink::new(config(), storage.clone()).unwrap();

        app.logout();
        assert!(storage.is_empty());
        assert!(matches!(
            app.guard().check("/cart"),
            GuardDecision::Redirect { .. }
        ));
    }

    #[tokio::test]
    async fn test_initialize_without_credential_is_noop() {
        let app = Zdrink::new(config(), Arc::new(MemoryStorage::new())).unwrap();
        app.initialize().await;
        assert!(app.session().identity().is_none());
    }
}
