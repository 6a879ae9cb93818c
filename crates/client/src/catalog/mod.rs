//! Shops, categories and products.
//!
//! Read-only and cached: list and detail responses are kept for the
//! configured TTL (five minutes by default, up to 1000 entries). The
//! "current shops" listing depends on the signed-in user and is never
//! cached.

mod cache;
mod types;

pub use types::{
    AttributeOption, Category, Listing, Page, ProductAttribute, ProductDetail, ProductSummary,
    Shop, Sku,
};

use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use tracing::{debug, instrument};
use zdrink_core::{CategoryId, ProductId, ShopId};

use crate::error::ApiError;
use crate::http::ApiClient;
use cache::{CacheKey, CacheValue};

const CACHE_CAPACITY: u64 = 1000;

/// Filters for the shop list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShopQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// Filters for a shop's product list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

#[derive(Serialize)]
struct ShopParam {
    shop_id: ShopId,
}

#[derive(Serialize)]
struct ProductParams<'a> {
    shop_id: ShopId,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<CategoryId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
}

/// Catalog reads with a shared response cache.
#[derive(Clone)]
pub struct CatalogApi {
    api: ApiClient,
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogApi {
    /// Create a catalog client whose entries live for `ttl`.
    #[must_use]
    pub fn new(api: ApiClient, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self { api, cache }
    }

    /// List shops.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn shops(&self, query: &ShopQuery) -> Result<Vec<Shop>, ApiError> {
        let key = CacheKey::Shops {
            query: serde_json::to_string(query)?,
        };
        if let Some(CacheValue::Shops(shops)) = self.cache.get(&key).await {
            debug!("Cache hit for shops");
            return Ok(shops);
        }

        let shops = self
            .api
            .get_query::<Listing<Shop>, _>("/shops/", query)
            .await?
            .into_items();
        self.cache.insert(key, CacheValue::Shops(shops.clone())).await;
        Ok(shops)
    }

    /// Get one shop.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self), fields(shop_id = %id))]
    pub async fn shop(&self, id: ShopId) -> Result<Shop, ApiError> {
        let key = CacheKey::Shop(id);
        if let Some(CacheValue::Shop(shop)) = self.cache.get(&key).await {
            debug!("Cache hit for shop");
            return Ok(*shop);
        }

        let shop: Shop = self.api.get(&format!("/shops/{id}/")).await?;
        self.cache
            .insert(key, CacheValue::Shop(Box::new(shop.clone())))
            .await;
        Ok(shop)
    }

    /// Shops associated with the signed-in user. Not cached.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn current_shops(&self) -> Result<Vec<Shop>, ApiError> {
        Ok(self
            .api
            .get::<Listing<Shop>>("/shops/current/")
            .await?
            .into_items())
    }

    /// Menu categories of a shop.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self), fields(shop_id = %shop_id))]
    pub async fn categories(&self, shop_id: ShopId) -> Result<Vec<Category>, ApiError> {
        let key = CacheKey::Categories(shop_id);
        if let Some(CacheValue::Categories(categories)) = self.cache.get(&key).await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories = self
            .api
            .get_query::<Listing<Category>, _>("/products/categories/", &ShopParam { shop_id })
            .await?
            .into_items();
        self.cache
            .insert(key, CacheValue::Categories(categories.clone()))
            .await;
        Ok(categories)
    }

    /// Public products of a shop.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self, query), fields(shop_id = %shop_id))]
    pub async fn products(
        &self,
        shop_id: ShopId,
        query: &ProductQuery,
    ) -> Result<Vec<ProductSummary>, ApiError> {
        let key = CacheKey::Products {
            shop: shop_id,
            query: serde_json::to_string(query)?,
        };
        if let Some(CacheValue::Products(products)) = self.cache.get(&key).await {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let params = ProductParams {
            shop_id,
            category: query.category,
            search: query.search.as_deref(),
            page: query.page,
        };
        let products = self
            .api
            .get_query::<Listing<ProductSummary>, _>("/products/public/products/", &params)
            .await?
            .into_items();
        self.cache
            .insert(key, CacheValue::Products(products.clone()))
            .await;
        Ok(products)
    }

    /// Product detail with SKUs and attributes.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: ProductId) -> Result<ProductDetail, ApiError> {
        let key = CacheKey::Product(id);
        if let Some(CacheValue::Product(product)) = self.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product: ProductDetail = self.api.get(&format!("/products/products/{id}/")).await?;
        self.cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// Drop every cached entry.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

impl std::fmt::Debug for CatalogApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogApi")
            .field("cached_entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}
