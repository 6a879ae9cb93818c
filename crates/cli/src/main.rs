//! Zdrink CLI - order from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in
//! zdrink login -u alice -p hunter2
//!
//! # Browse a shop's menu and fill the cart
//! zdrink shops
//! zdrink menu 1
//! zdrink cart add 12 --sku 30 --qty 2
//! zdrink cart update 7 0        # zero removes the line
//!
//! # Place and pay for an order
//! zdrink order checkout --type takeaway --name Alice --phone 13800000000 \
//!     --pickup-time 2024-05-01T12:30:00+08:00
//! zdrink order pay 42 --method 1
//! ```
//!
//! # Commands
//!
//! - `login`, `logout`, `whoami`, `register`, `passwd`, `profile`, `refresh` - Account
//! - `cart` - Show and change the cart
//! - `shops`, `shop`, `menu`, `product` - Browse the catalog
//! - `order` - List, place, cancel and pay for orders
//! - `open` - Check whether a view is reachable without signing in

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zdrink_client::{ClientEvent, ProfileUpdate, Zdrink};

mod commands;
mod config;

use commands::orders::CheckoutArgs;
use config::CliConfig;

#[derive(Parser)]
#[command(name = "zdrink")]
#[command(author, version, about = "Zdrink ordering client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "ZDRINK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out
    Logout {
        /// Also end the session on the backend
        #[arg(long)]
        remote: bool,
    },
    /// Show the signed-in user
    Whoami,
    /// Create an account
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "ZDRINK_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(short, long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        /// Account type (`customer`, `shop_owner`, `shop_staff`)
        #[arg(long, default_value = "customer")]
        user_type: String,
    },
    /// Change password
    Passwd {
        #[arg(long)]
        old: String,

        #[arg(long)]
        new: String,
    },
    /// Update profile fields
    Profile {
        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        avatar: Option<String>,
    },
    /// Renew the access token
    Refresh,
    /// Show or change the cart
    Cart {
        #[command(subcommand)]
        action: Option<CartAction>,
    },
    /// List shops
    Shops {
        #[arg(short, long)]
        search: Option<String>,

        /// Only shops linked to the signed-in user
        #[arg(long)]
        mine: bool,
    },
    /// Show a shop
    Shop { id: i64 },
    /// Show a shop's menu
    Menu {
        shop: i64,

        #[arg(short, long)]
        category: Option<i64>,

        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show a product with its options
    Product { id: i64 },
    /// Orders and payments
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Resolve an application path through the navigation guard
    Open { path: String },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add a product
    Add {
        product: i64,

        #[arg(long)]
        sku: Option<i64>,

        #[arg(short, long, default_value_t = 1)]
        qty: u32,

        /// Attribute option id (repeatable)
        #[arg(short, long = "option")]
        options: Vec<i64>,

        /// Free-text customization
        #[arg(short, long)]
        note: Option<String>,
    },
    /// Set a line's quantity (zero or less removes it)
    Update {
        line: i64,

        #[arg(allow_hyphen_values = true)]
        qty: i64,
    },
    /// Remove a line
    Remove { line: i64 },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum OrderAction {
    /// List my orders
    List {
        #[arg(long)]
        page: Option<u32>,
    },
    /// Show an order
    Show { id: i64 },
    /// Order everything in the cart
    Checkout {
        /// `dine_in`, `takeaway` or `delivery`
        #[arg(long = "type", default_value = "dine_in")]
        order_type: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        phone: String,

        #[arg(long)]
        notes: Option<String>,

        /// Required for delivery
        #[arg(long)]
        address: Option<String>,

        /// RFC 3339 time; required for takeaway
        #[arg(long)]
        pickup_time: Option<String>,

        #[arg(long)]
        table: Option<String>,
    },
    /// Cancel an order
    Cancel {
        id: i64,

        #[arg(long)]
        notes: Option<String>,
    },
    /// Start paying for an order
    Pay {
        id: i64,

        /// Payment method id
        #[arg(long)]
        method: i64,

        #[arg(long)]
        openid: Option<String>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CliConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Map tracing levels to Sentry: warnings and errors become events,
/// info and debug become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match CliConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "zdrink_client=info,zdrink_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: CliConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app = Zdrink::from_config(config.client)?;
    let mut events = app.subscribe();

    app.initialize().await;
    if let Some(identity) = app.session().identity() {
        commands::account::set_sentry_user(&identity);
    }

    let result = dispatch(&app, cli.command).await;
    report_events(&mut events);
    app.shutdown();

    Ok(result?)
}

async fn dispatch(app: &Zdrink, command: Commands) -> Result<(), commands::CommandError> {
    use commands::{account, cart, catalog, navigate, orders};

    match command {
        Commands::Login { username, password } => account::login(app, &username, password).await?,
        Commands::Logout { remote } => account::logout(app, remote).await,
        Commands::Whoami => account::whoami(app)?,
        Commands::Register {
            username,
            password,
            email,
            phone,
            user_type,
        } => account::register(app, username, password, email, phone, &user_type).await?,
        Commands::Passwd { old, new } => account::change_password(app, old, new).await?,
        Commands::Profile {
            first_name,
            last_name,
            email,
            phone,
            avatar,
        } => {
            let update = ProfileUpdate {
                first_name,
                last_name,
                email,
                phone,
                avatar,
            };
            account::update_profile(app, update).await?;
        }
        Commands::Refresh => account::refresh(app).await?,
        Commands::Cart { action } => match action.unwrap_or(CartAction::Show) {
            CartAction::Show => cart::show(app).await?,
            CartAction::Add {
                product,
                sku,
                qty,
                options,
                note,
            } => cart::add(app, product, sku, qty, &options, note).await?,
            CartAction::Update { line, qty } => cart::update(app, line, qty).await?,
            CartAction::Remove { line } => cart::remove(app, line).await?,
            CartAction::Clear => cart::clear(app).await?,
        },
        Commands::Shops { search, mine } => catalog::shops(app, search, mine).await?,
        Commands::Shop { id } => catalog::shop(app, id).await?,
        Commands::Menu {
            shop,
            category,
            search,
        } => catalog::menu(app, shop, category, search).await?,
        Commands::Product { id } => catalog::product(app, id).await?,
        Commands::Order { action } => match action {
            OrderAction::List { page } => orders::list(app, page).await?,
            OrderAction::Show { id } => orders::show(app, id).await?,
            OrderAction::Checkout {
                order_type,
                name,
                phone,
                notes,
                address,
                pickup_time,
                table,
            } => {
                let args = CheckoutArgs {
                    order_type,
                    name,
                    phone,
                    notes,
                    address,
                    pickup_time,
                    table,
                };
                orders::checkout(app, args).await?;
            }
            OrderAction::Cancel { id, notes } => orders::cancel(app, id, notes).await?,
            OrderAction::Pay { id, method, openid } => orders::pay(app, id, method, openid).await?,
        },
        Commands::Open { path } => navigate::open(app, &path),
    }
    Ok(())
}

/// Surface client events raised while the command ran.
fn report_events(events: &mut broadcast::Receiver<ClientEvent>) {
    loop {
        match events.try_recv() {
            Ok(ClientEvent::Notify(notification)) => {
                tracing::warn!("{}", notification.message);
            }
            Ok(ClientEvent::SessionInvalidated { login_path }) => {
                sentry::configure_scope(|scope| scope.set_user(None));
                tracing::warn!(%login_path, "Session expired. Run `zdrink login` to sign in again.");
            }
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Dropped client events");
            }
            Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => {
                break;
            }
        }
    }
}
