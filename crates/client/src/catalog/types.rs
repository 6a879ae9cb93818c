//! Shop and product types.

use serde::{Deserialize, Serialize};
use zdrink_core::{AttributeOptionId, CategoryId, Price, ProductId, ShopId, SkuId};

/// A list endpoint response: either a DRF page or a bare array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Page(Page<T>),
    Plain(Vec<T>),
}

impl<T> Listing<T> {
    /// The items, regardless of shape.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Page(page) => page.results,
            Self::Plain(items) => items,
        }
    }

    /// Total count across all pages, when the backend paginates.
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::Page(page) => page.count,
            Self::Plain(items) => items.len(),
        }
    }
}

/// One page of a paginated list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: usize,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// A shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    pub id: ShopId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub shop_type: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub allow_delivery: Option<bool>,
    #[serde(default)]
    pub allow_pickup: Option<bool>,
    #[serde(default)]
    pub allow_dine_in: Option<bool>,
    #[serde(default)]
    pub delivery_fee: Option<Price>,
    #[serde(default)]
    pub minimum_order_amount: Option<Price>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
}

/// A menu category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent: Option<CategoryId>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub products_count: Option<u32>,
}

/// A product as listed on a menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub category: Option<CategoryId>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub base_price: Option<Price>,
    #[serde(default)]
    pub min_price: Option<Price>,
    #[serde(default)]
    pub max_price: Option<Price>,
    #[serde(default)]
    pub main_image: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub has_variants: bool,
}

impl ProductSummary {
    /// Lowest price to show on a menu card.
    #[must_use]
    pub fn display_price(&self) -> Price {
        self.min_price
            .or(self.base_price)
            .unwrap_or(Price::ZERO)
    }
}

/// Full product with SKUs and selectable attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetail {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub base_price: Option<Price>,
    #[serde(default)]
    pub main_image: Option<String>,
    #[serde(default)]
    pub skus: Vec<Sku>,
    #[serde(default)]
    pub attributes: Vec<ProductAttribute>,
}

impl ProductDetail {
    /// Find a SKU by id.
    #[must_use]
    pub fn sku(&self, id: SkuId) -> Option<&Sku> {
        self.skus.iter().find(|sku| sku.id == id)
    }

    /// Attributes the customer must choose an option for.
    pub fn required_attributes(&self) -> impl Iterator<Item = &ProductAttribute> {
        self.attributes.iter().filter(|a| a.is_required)
    }
}

/// A purchasable variant of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sku {
    pub id: SkuId,
    #[serde(default)]
    pub sku_code: Option<String>,
    pub price: Price,
    #[serde(default)]
    pub stock_quantity: Option<i64>,
    #[serde(default)]
    pub is_in_stock: Option<bool>,
}

/// A selectable attribute such as sweetness or temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAttribute {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub attribute_type: Option<String>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub options: Vec<AttributeOption>,
}

/// One option of a [`ProductAttribute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeOption {
    pub id: AttributeOptionId,
    pub value: String,
    #[serde(default)]
    pub additional_price: Price,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_listing_accepts_page_and_plain() {
        let page: Listing<Category> = serde_json::from_value(json!({
            "count": 41,
            "next": "http://x/api/products/categories/?page=2",
            "previous": null,
            "results": [{"id": 1, "name": "Tea"}]
        }))
        .unwrap();
        assert_eq!(page.count(), 41);
        assert_eq!(page.into_items().len(), 1);

        let plain: Listing<Category> =
            serde_json::from_value(json!([{"id": 1, "name": "Tea"}, {"id": 2, "name": "Coffee"}]))
                .unwrap();
        assert_eq!(plain.count(), 2);
    }

    #[test]
    fn test_product_detail_decodes() {
        let product: ProductDetail = serde_json::from_value(json!({
            "id": 5,
            "name": "Milk Tea",
            "base_price": "16.00",
            "category": {"id": 1, "name": "Tea"},
            "skus": [{"id": 7, "price": "18.00", "stock_quantity": 20}],
            "attributes": [{
                "id": 3,
                "name": "Sweetness",
                "is_required": true,
                "options": [{"id": 9, "value": "Half", "additional_price": "0.00"}]
            }]
        }))
        .unwrap();

        assert_eq!(product.sku(SkuId::new(7)).unwrap().price, Price::from_fen(1800));
        assert_eq!(product.required_attributes().count(), 1);
    }

    #[test]
    fn test_display_price_prefers_min_price() {
        let summary: ProductSummary = serde_json::from_value(json!({
            "id": 1, "name": "Latte", "base_price": "20.00", "min_price": "18.00"
        }))
        .unwrap();
        assert_eq!(summary.display_price().display(), "¥18.00");
    }
}
