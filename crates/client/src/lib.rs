//! Zdrink Client - session, cart and catalog access for the ordering API.
//!
//! # Architecture
//!
//! - [`ApiClient`] is the single chokepoint for outbound HTTP. It attaches
//!   the bearer credential, classifies failures into [`ApiError`], and
//!   publishes [`ClientEvent`]s (notifications, session invalidation).
//! - [`SessionContext`] owns the credential and the current user identity.
//! - [`CartContext`] owns the cached cart snapshot. Every mutation is a
//!   write-through to the backend followed by a full re-fetch.
//! - [`CatalogApi`] and [`OrdersApi`] are thin typed wrappers over the
//!   remaining endpoints. Catalog reads are cached via `moka`.
//! - [`Zdrink`] builds all of the above from a [`ClientConfig`] and a
//!   [`TokenStorage`]. There are no global singletons; consumers receive the
//!   contexts they need.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use zdrink_client::{ClientConfig, LoginCredentials, MemoryStorage, Zdrink};
//!
//! let app = Zdrink::new(ClientConfig::from_env()?, Arc::new(MemoryStorage::new()))?;
//! app.initialize().await;
//!
//! app.session().login(&LoginCredentials::new("alice", "hunter2")).await?;
//! app.cart().fetch().await?;
//! println!("{} items", app.cart().total_quantity());
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod guard;
pub mod http;
pub mod orders;
pub mod session;
pub mod storage;

pub use cart::{AddItem, Cart, CartContext, CartLine};
pub use catalog::{CatalogApi, ProductQuery, ShopQuery};
pub use config::{ClientConfig, ConfigError};
pub use context::Zdrink;
pub use error::ApiError;
pub use events::{ClientEvent, EventBus, Notification};
pub use guard::{GuardDecision, NavigationGuard, RouteMatch};
pub use http::ApiClient;
pub use orders::{NewOrder, OrderValidationError, OrdersApi, PaymentRequest};
pub use session::{
    LoginCredentials, PasswordChange, ProfileUpdate, Registered, Registration, SessionContext,
    SessionState, UserIdentity,
};
pub use storage::{FileStorage, MemoryStorage, StorageError, TokenStorage};
