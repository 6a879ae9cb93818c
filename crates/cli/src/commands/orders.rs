//! Order and payment commands.

use chrono::{DateTime, FixedOffset};
use zdrink_client::orders::{NewOrder, Order};
use zdrink_client::{PaymentRequest, Zdrink};
use zdrink_core::{OrderId, OrderType, PaymentMethodId};

use super::account::require_session;
use super::{CommandError, print_json, print_line};

/// Details for placing an order from the current cart.
#[derive(Debug)]
pub struct CheckoutArgs {
    pub order_type: String,
    pub name: String,
    pub phone: String,
    pub notes: Option<String>,
    pub address: Option<String>,
    pub pickup_time: Option<String>,
    pub table: Option<String>,
}

pub async fn list(app: &Zdrink, page: Option<u32>) -> Result<(), CommandError> {
    require_session(app)?;
    let orders = app.orders().my_orders(page).await?;
    if orders.is_empty() {
        print_line("No orders yet");
    }
    for order in &orders {
        render_summary(order);
    }
    Ok(())
}

pub async fn show(app: &Zdrink, id: i64) -> Result<(), CommandError> {
    require_session(app)?;
    let order = app.orders().order(OrderId::new(id)).await?;
    print_json(&order)
}

/// Place an order for everything in the cart.
pub async fn checkout(app: &Zdrink, args: CheckoutArgs) -> Result<(), CommandError> {
    require_session(app)?;
    let order_type: OrderType = args
        .order_type
        .parse()
        .map_err(CommandError::InvalidArgument)?;
    let pickup_time = args.pickup_time.as_deref().map(parse_time).transpose()?;

    let cart = app.cart().fetch().await?;
    if cart.is_empty() {
        return Err(CommandError::InvalidArgument("cart is empty".to_string()));
    }

    let new_order = NewOrder {
        order_type,
        customer_name: args.name,
        customer_phone: args.phone,
        customer_notes: args.notes,
        delivery_address: args.address,
        delivery_time: None,
        pickup_time,
        table_number: args.table,
        cart_id: cart.id,
        items: Vec::new(),
    };
    let order = app.orders().create(&new_order).await?;

    // The backend empties the cart once the order holds its lines
    app.cart().reset();
    render_summary(&order);
    Ok(())
}

pub async fn cancel(app: &Zdrink, id: i64, notes: Option<String>) -> Result<(), CommandError> {
    require_session(app)?;
    let order = app
        .orders()
        .cancel(OrderId::new(id), notes.as_deref())
        .await?;
    render_summary(&order);
    Ok(())
}

pub async fn pay(
    app: &Zdrink,
    id: i64,
    method: i64,
    openid: Option<String>,
) -> Result<(), CommandError> {
    require_session(app)?;
    let ticket = app
        .orders()
        .create_payment(&PaymentRequest {
            order_id: OrderId::new(id),
            payment_method_id: PaymentMethodId::new(method),
            openid,
        })
        .await?;
    print_line(format_args!(
        "Payment started: transaction {}",
        ticket.transaction_no.as_deref().unwrap_or("-")
    ));
    print_json(&ticket.payment_data)
}

fn parse_time(raw: &str) -> Result<DateTime<FixedOffset>, CommandError> {
    DateTime::parse_from_rfc3339(raw)
        .map_err(|e| CommandError::InvalidArgument(format!("pickup time '{raw}': {e}")))
}

fn render_summary(order: &Order) {
    print_line(format_args!(
        "{:>6}  {}  {:<10} {}  {}",
        order.id,
        order.order_number.as_deref().unwrap_or("-"),
        order.status.to_string(),
        order.total_amount.map(|p| p.display()).unwrap_or_default(),
        order.created_at.as_deref().unwrap_or("")
    ));
}
