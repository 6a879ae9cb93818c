//! Cart wire types.
//!
//! The backend is lenient about which fields it includes, so everything but
//! the identifiers the client needs to act on is optional.

use serde::{Deserialize, Deserializer, Serialize};
use zdrink_core::{AttributeOptionId, CartId, CartLineId, Price, ProductId, SkuId, UserId};

/// Last-known server state of the cart.
///
/// Totals are always derived from `items`; the backend's own summary is kept
/// only for display and diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub id: Option<CartId>,
    /// Lines in server order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<CartLine>,
    /// Backend-computed total, as reported.
    #[serde(default, rename = "total_price")]
    pub reported_total_price: Option<Price>,
    /// Backend-computed quantity, as reported.
    #[serde(default, rename = "total_quantity")]
    pub reported_total_quantity: Option<u32>,
    #[serde(default)]
    pub user: Option<UserId>,
    #[serde(default)]
    pub session_key: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Cart {
    /// Sum of line quantities. Widened so that any number of lines at the
    /// backend's per-line maximum cannot overflow.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Sum of line totals.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.items.iter().map(CartLine::line_total).sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find a line by id.
    #[must_use]
    pub fn line(&self, id: CartLineId) -> Option<&CartLine> {
        self.items.iter().find(|line| line.id == id)
    }
}

/// One product entry in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub quantity: u32,
    #[serde(default)]
    pub cart: Option<CartId>,
    #[serde(default)]
    pub product: Option<ProductId>,
    #[serde(default)]
    pub sku: Option<SkuId>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub attribute_options: Vec<AttributeOptionId>,
    #[serde(default)]
    pub customization: Option<String>,
    #[serde(default)]
    pub unit_price: Option<Price>,
    #[serde(default)]
    pub total_price: Option<Price>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_image: Option<String>,
    #[serde(default)]
    pub sku_info: Option<SkuInfo>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl CartLine {
    /// Line total: the backend's figure, else unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.total_price
            .or_else(|| self.unit_price.map(|unit| unit * self.quantity))
            .unwrap_or(Price::ZERO)
    }
}

/// SKU summary attached to a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuInfo {
    pub id: SkuId,
    #[serde(default)]
    pub specifications: Vec<SkuSpecification>,
}

/// One specification of a SKU, e.g. `size: large`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuSpecification {
    pub name: String,
    pub value: String,
}

/// Input for adding a product to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddItem {
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku_id: Option<SkuId>,
    pub quantity: u32,
    pub attribute_option_ids: Vec<AttributeOptionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customization: Option<String>,
}

impl AddItem {
    /// One unit of `product_id` with no options.
    #[must_use]
    pub const fn new(product_id: ProductId) -> Self {
        Self {
            product_id,
            sku_id: None,
            quantity: 1,
            attribute_option_ids: Vec::new(),
            customization: None,
        }
    }

    #[must_use]
    pub const fn quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    #[must_use]
    pub const fn sku(mut self, sku_id: SkuId) -> Self {
        self.sku_id = Some(sku_id);
        self
    }

    #[must_use]
    pub fn option(mut self, option: AttributeOptionId) -> Self {
        self.attribute_option_ids.push(option);
        self
    }

    #[must_use]
    pub fn customization(mut self, text: impl Into<String>) -> Self {
        self.customization = Some(text.into());
        self
    }
}

#[derive(Serialize)]
pub(super) struct QuantityUpdate {
    pub quantity: u32,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_cart_without_items_is_empty() {
        let cart: Cart = serde_json::from_value(json!({"id": 3})).unwrap();
        assert!(cart.is_empty());

        let cart: Cart = serde_json::from_value(json!({"id": 3, "items": null})).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.total_quantity(), 0);
        assert_eq!(cart.total_price(), Price::ZERO);
    }

    #[test]
    fn test_totals_are_derived_from_lines() {
        let cart: Cart = serde_json::from_value(json!({
            "id": 1,
            "total_price": "999.00",
            "total_quantity": 99,
            "items": [
                {"id": 10, "quantity": 2, "unit_price": "12.00", "total_price": "24.00"},
                {"id": 11, "quantity": 3, "unit_price": "5.50"}
            ]
        }))
        .unwrap();

        assert_eq!(cart.total_quantity(), 5);
        assert_eq!(cart.total_price(), "40.50".parse().unwrap());
        assert_eq!(cart.reported_total_quantity, Some(99));
        assert_eq!(cart.line(CartLineId::new(11)).map(|l| l.quantity), Some(3));
    }

    #[test]
    fn test_total_quantity_at_backend_maximum() {
        let max = i64::from(i32::MAX);
        let cart: Cart = serde_json::from_value(json!({
            "id": 1,
            "items": [
                {"id": 1, "quantity": max},
                {"id": 2, "quantity": max},
                {"id": 3, "quantity": max}
            ]
        }))
        .unwrap();

        assert_eq!(cart.total_quantity(), 3 * 2_147_483_647_u64);
    }

    #[test]
    fn test_full_line_decodes() {
        let line: CartLine = serde_json::from_value(json!({
            "id": 10,
            "cart": 1,
            "product": 5,
            "sku": 7,
            "quantity": 1,
            "attribute_options": [1, 2],
            "customization": "less ice",
            "unit_price": "18.00",
            "product_name": "Milk Tea",
            "product_image": "/media/tea.png",
            "sku_info": {"id": 7, "specifications": [{"name": "Size", "value": "Large"}]},
            "total_price": "18.00",
            "created_at": "2024-05-01T10:00:00+08:00",
            "updated_at": "2024-05-01T10:00:00+08:00"
        }))
        .unwrap();

        assert_eq!(line.product, Some(ProductId::new(5)));
        assert_eq!(line.attribute_options.len(), 2);
        assert_eq!(line.sku_info.unwrap().specifications[0].value, "Large");
    }

    #[test]
    fn test_add_item_wire_format() {
        let item = AddItem::new(ProductId::new(1))
            .quantity(2)
            .option(AttributeOptionId::new(4));
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({"product_id": 1, "quantity": 2, "attribute_option_ids": [4]})
        );
    }
}
