//! Cache types for catalog responses.

use zdrink_core::{ProductId, ShopId};

use super::types::{Category, ProductDetail, ProductSummary, Shop};

/// Cache key for shops, categories and products.
///
/// List keys carry the serialized query so different filters do not share
/// an entry.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Shops { query: String },
    Shop(ShopId),
    Categories(ShopId),
    Products { shop: ShopId, query: String },
    Product(ProductId),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Shops(Vec<Shop>),
    Shop(Box<Shop>),
    Categories(Vec<Category>),
    Products(Vec<ProductSummary>),
    Product(Box<ProductDetail>),
}
