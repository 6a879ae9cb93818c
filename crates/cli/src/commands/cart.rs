//! Cart commands.
//!
//! Every mutating command prints the cart as fetched after the change.

use zdrink_client::{AddItem, Cart, Zdrink};
use zdrink_core::{AttributeOptionId, CartLineId, ProductId, SkuId};

use super::account::require_session;
use super::{CommandError, print_line};

pub async fn show(app: &Zdrink) -> Result<(), CommandError> {
    require_session(app)?;
    let cart = app.cart().fetch().await?;
    render(&cart);
    Ok(())
}

pub async fn add(
    app: &Zdrink,
    product: i64,
    sku: Option<i64>,
    quantity: u32,
    options: &[i64],
    note: Option<String>,
) -> Result<(), CommandError> {
    require_session(app)?;
    if quantity == 0 {
        return Err(CommandError::InvalidArgument(
            "quantity must be at least 1".to_string(),
        ));
    }

    let mut item = AddItem::new(ProductId::new(product)).quantity(quantity);
    if let Some(sku) = sku {
        item = item.sku(SkuId::new(sku));
    }
    for option in options {
        item = item.option(AttributeOptionId::new(*option));
    }
    if let Some(note) = note {
        item = item.customization(note);
    }

    let cart = app.cart().add_item(&item).await?;
    render(&cart);
    Ok(())
}

/// Set a line's quantity; zero or less removes it.
pub async fn update(app: &Zdrink, line: i64, quantity: i64) -> Result<(), CommandError> {
    require_session(app)?;
    let cart = app
        .cart()
        .update_item(CartLineId::new(line), quantity)
        .await?;
    render(&cart);
    Ok(())
}

pub async fn remove(app: &Zdrink, line: i64) -> Result<(), CommandError> {
    require_session(app)?;
    let cart = app.cart().remove_item(CartLineId::new(line)).await?;
    render(&cart);
    Ok(())
}

pub async fn clear(app: &Zdrink) -> Result<(), CommandError> {
    require_session(app)?;
    app.cart().clear().await?;
    print_line("Cart cleared");
    Ok(())
}

fn render(cart: &Cart) {
    if cart.is_empty() {
        print_line("Cart is empty");
        return;
    }

    for line in &cart.items {
        let name = line.product_name.as_deref().unwrap_or("(unnamed)");
        let options = line
            .sku_info
            .as_ref()
            .map(|sku| {
                sku.specifications
                    .iter()
                    .map(|spec| format!("{}: {}", spec.name, spec.value))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .filter(|s| !s.is_empty())
            .map(|s| format!(" [{s}]"))
            .unwrap_or_default();
        print_line(format_args!(
            "#{:<6} {} x{}{}  {}",
            line.id,
            name,
            line.quantity,
            options,
            line.line_total()
        ));
    }
    print_line(format_args!(
        "Total: {} item(s), {}",
        cart.total_quantity(),
        cart.total_price()
    ));
}
