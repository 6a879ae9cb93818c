//! Server-synchronized shopping cart.
//!
//! The backend owns the cart. [`CartContext`] keeps the last fetched
//! [`Cart`] and never patches it locally: every mutation is sent to the
//! backend and, once it succeeds, the whole cart is fetched again and the
//! snapshot replaced. A failed mutation leaves the snapshot as it was and
//! skips the fetch.
//!
//! Operations on one context are serialized, so a mutation and its
//! follow-up fetch are never interleaved with another operation's.
//!
//! A snapshot belongs to the session that fetched it. Once that session
//! ends, including a forced logout after a 401, the snapshot reads as absent.

mod types;

pub use types::{AddItem, Cart, CartLine, SkuInfo, SkuSpecification};

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::instrument;
use zdrink_core::{CartLineId, Price};

use crate::error::ApiError;
use crate::http::ApiClient;
use types::QuantityUpdate;

const MY_CART_PATH: &str = "/orders/carts/my_cart/";
const ADD_ITEM_PATH: &str = "/orders/carts/add_item/";
const CLEAR_PATH: &str = "/orders/carts/clear/";

/// Largest quantity the backend stores for one line.
pub const MAX_LINE_QUANTITY: u32 = i32::MAX.unsigned_abs();

/// A fetched cart tagged with the session generation it was fetched under.
struct Snapshot {
    generation: u64,
    cart: Cart,
}

fn item_path(id: CartLineId) -> String {
    format!("/orders/carts/items/{id}/")
}

/// Cached view of the server cart.
///
/// Cheap to clone; clones share the snapshot and the operation lock.
#[derive(Clone)]
pub struct CartContext {
    inner: Arc<CartContextInner>,
}

struct CartContextInner {
    api: ApiClient,
    snapshot: RwLock<Option<Snapshot>>,
    /// Held for the whole mutate-then-fetch sequence.
    operations: Mutex<()>,
}

impl CartContext {
    /// Create a context with no snapshot.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            inner: Arc::new(CartContextInner {
                api,
                snapshot: RwLock::new(None),
                operations: Mutex::new(()),
            }),
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Fetch the cart and install it as the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the fetch fails; the snapshot is unchanged.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Cart, ApiError> {
        let _guard = self.inner.operations.lock().await;
        self.refetch().await
    }

    /// Add a product, then refresh.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the add or the refresh fails.
    #[instrument(skip(self, item), fields(product_id = %item.product_id, quantity = item.quantity))]
    pub async fn add_item(&self, item: &AddItem) -> Result<Cart, ApiError> {
        let _guard = self.inner.operations.lock().await;
        self.inner.api.post::<Value, _>(ADD_ITEM_PATH, item).await?;
        self.refetch().await
    }

    /// Set a line's quantity, then refresh.
    ///
    /// A quantity of zero or less removes the line instead.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidQuantity` without calling the backend if
    /// `quantity` exceeds [`MAX_LINE_QUANTITY`], otherwise any error from the
    /// update (or removal) or the refresh.
    #[instrument(skip(self))]
    pub async fn update_item(&self, line_id: CartLineId, quantity: i64) -> Result<Cart, ApiError> {
        if quantity <= 0 {
            return self.remove_item(line_id).await;
        }
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q <= MAX_LINE_QUANTITY)
            .ok_or(ApiError::InvalidQuantity(quantity))?;

        let _guard = self.inner.operations.lock().await;
        self.inner
            .api
            .patch::<Value, _>(&item_path(line_id), &QuantityUpdate { quantity })
            .await?;
        self.refetch().await
    }

    /// Remove a line, then refresh.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the removal or the refresh fails.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, line_id: CartLineId) -> Result<Cart, ApiError> {
        let _guard = self.inner.operations.lock().await;
        self.inner.api.delete::<Value>(&item_path(line_id)).await?;
        self.refetch().await
    }

    /// Empty the cart on the backend and drop the snapshot without fetching.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the clear call fails; the snapshot is unchanged.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), ApiError> {
        let _guard = self.inner.operations.lock().await;
        self.inner.api.post_empty::<Value>(CLEAR_PATH).await?;
        self.drop_snapshot();
        tracing::debug!("Cart cleared");
        Ok(())
    }

    /// Forget the snapshot locally, e.g. after the user signs out.
    pub fn reset(&self) {
        self.drop_snapshot();
    }

    // =========================================================================
    // Derived reads
    // =========================================================================

    /// The last fetched cart, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<Cart> {
        self.read(Cart::clone)
    }

    /// Lines of the current snapshot, in server order.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        self.snapshot().map(|cart| cart.items).unwrap_or_default()
    }

    /// Sum of quantities over the current snapshot.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.read(Cart::total_quantity).unwrap_or(0)
    }

    /// Sum of line totals over the current snapshot.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.read(Cart::total_price).unwrap_or(Price::ZERO)
    }

    /// Whether there is no snapshot or it has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read(Cart::is_empty).unwrap_or(true)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Fetch and install. Callers hold the operation lock.
    async fn refetch(&self) -> Result<Cart, ApiError> {
        // Taken before the request so a logout racing the fetch wins
        let generation = self.generation();
        let cart: Cart = self.inner.api.get(MY_CART_PATH).await?;
        tracing::debug!(lines = cart.items.len(), "Cart fetched");
        self.install(generation, cart.clone());
        Ok(cart)
    }

    fn generation(&self) -> u64 {
        self.inner.api.session().generation()
    }

    fn install(&self, generation: u64, cart: Cart) {
        *self
            .inner
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Snapshot { generation, cart });
    }

    fn drop_snapshot(&self) {
        *self
            .inner
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn read<T>(&self, f: impl FnOnce(&Cart) -> T) -> Option<T> {
        let current = self.generation();
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|snapshot| snapshot.generation == current)
            .map(|snapshot| f(&snapshot.cart))
    }
}

impl std::fmt::Debug for CartContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartContext")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}
