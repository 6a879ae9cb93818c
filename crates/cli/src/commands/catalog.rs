//! Shop and menu browsing.

use zdrink_client::{ProductQuery, ShopQuery, Zdrink};
use zdrink_core::{CategoryId, ProductId, ShopId};

use super::{CommandError, print_json, print_line};

pub async fn shops(app: &Zdrink, search: Option<String>, mine: bool) -> Result<(), CommandError> {
    let shops = if mine {
        app.catalog().current_shops().await?
    } else {
        app.catalog()
            .shops(&ShopQuery { search, page: None })
            .await?
    };

    if shops.is_empty() {
        print_line("No shops found");
    }
    for shop in &shops {
        let status = if shop.is_active.unwrap_or(true) { "open" } else { "closed" };
        print_line(format_args!(
            "{:>4}  {}  ({status})  {}",
            shop.id,
            shop.name,
            shop.address.as_deref().unwrap_or("")
        ));
    }
    Ok(())
}

pub async fn shop(app: &Zdrink, id: i64) -> Result<(), CommandError> {
    let shop = app.catalog().shop(ShopId::new(id)).await?;
    print_json(&shop)
}

/// Print a shop's menu grouped by category.
pub async fn menu(
    app: &Zdrink,
    shop: i64,
    category: Option<i64>,
    search: Option<String>,
) -> Result<(), CommandError> {
    let shop_id = ShopId::new(shop);
    let query = ProductQuery {
        category: category.map(CategoryId::new),
        search,
        page: None,
    };
    let (categories, products) = tokio::try_join!(
        app.catalog().categories(shop_id),
        app.catalog().products(shop_id, &query),
    )?;

    for category in &categories {
        let items: Vec<_> = products
            .iter()
            .filter(|p| p.category == Some(category.id))
            .collect();
        if items.is_empty() {
            continue;
        }
        print_line(format_args!("== {} ==", category.name));
        for product in items {
            print_line(format_args!(
                "{:>6}  {}  {}",
                product.id,
                product.name,
                product.display_price()
            ));
        }
    }

    let uncategorized: Vec<_> = products
        .iter()
        .filter(|p| !p.category.is_some_and(|c| categories.iter().any(|k| k.id == c)))
        .collect();
    if !uncategorized.is_empty() {
        print_line("== Other ==");
        for product in uncategorized {
            print_line(format_args!(
                "{:>6}  {}  {}",
                product.id,
                product.name,
                product.display_price()
            ));
        }
    }
    Ok(())
}

pub async fn product(app: &Zdrink, id: i64) -> Result<(), CommandError> {
    let product = app.catalog().product(ProductId::new(id)).await?;
    print_json(&product)
}
