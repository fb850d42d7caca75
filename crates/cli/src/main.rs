//! Techland CLI - inspect and drive a file-backed browser profile.
//!
//! Every invocation opens a fresh tab on the profile, so consecutive commands
//! behave like page reloads: the cart and local session are read back from
//! the persisted store each time.
//!
//! # Usage
//!
//! ```bash
//! # Add a product and show the cart
//! techland cart add p1 --name Mouse --price 20000 --image /img/mouse.png
//! techland cart show
//!
//! # Log in through the credential endpoint (TECHLAND_AUTH_URL)
//! techland session login -u ana -p secret1
//! techland session show
//! techland session logout
//!
//! # Dump every stored record
//! techland store dump
//! ```
//!
//! # Commands
//!
//! - `cart` - Add, remove, set quantity, clear, show
//! - `session` - Log in, log out, show the current user
//! - `store dump` - Print the raw profile entries

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use techland_core::{Price, ProductId};
use techland_storefront::config::ClientConfig;

mod commands;

use commands::CliError;

/// Profile file used when neither `--profile` nor `TECHLAND_PROFILE_PATH` is set.
const DEFAULT_PROFILE_PATH: &str = ".techland-profile.json";

#[derive(Parser)]
#[command(name = "techland")]
#[command(author, version, about = "Techland storefront client state tools")]
struct Cli {
    /// JSON file backing the browser profile
    #[arg(long, global = true)]
    profile: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage the local session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Inspect the persisted store
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Add one unit of a product
    Add {
        /// Product identifier
        product_id: String,

        /// Product name
        #[arg(short, long)]
        name: String,

        /// Unit price in pesos
        #[arg(short, long)]
        price: Price,

        /// Image reference
        #[arg(short, long, default_value = "")]
        image: String,
    },
    /// Remove a product's line
    Remove {
        /// Product identifier
        product_id: String,
    },
    /// Set a line's quantity; zero or less removes it
    Set {
        /// Product identifier
        product_id: String,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove every line
    Clear,
    /// Print the cart
    Show,
}

#[derive(Subcommand)]
enum SessionAction {
    /// Log in with a username and password
    Login {
        /// Username
        #[arg(short, long)]
        username: String,

        /// Password
        #[arg(short, long)]
        password: String,
    },
    /// Log out of the current session
    Logout,
    /// Print the current user
    Show,
}

#[derive(Subcommand)]
enum StoreAction {
    /// Print every stored key and raw value
    Dump,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
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

/// Map tracing levels to Sentry: warnings and errors become events, the rest breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Load configuration from environment (needed for Sentry init)
    let config = ClientConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "techland_storefront=info,techland_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(CliError::from(e)),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, mut config: ClientConfig) -> Result<(), CliError> {
    if let Some(path) = cli.profile {
        config.storage.profile_path = Some(path);
    }
    if config.storage.profile_path.is_none() {
        config.storage.profile_path = Some(PathBuf::from(DEFAULT_PROFILE_PATH));
    }

    let shell = commands::Shell::open(config)?;

    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Add {
                product_id,
                name,
                price,
                image,
            } => shell.cart_add(ProductId::new(product_id), name, price, image),
            CartAction::Remove { product_id } => shell.cart_remove(&ProductId::new(product_id)),
            CartAction::Set {
                product_id,
                quantity,
            } => shell.cart_set(&ProductId::new(product_id), quantity),
            CartAction::Clear => shell.cart_clear(),
            CartAction::Show => shell.cart_show(),
        },
        Commands::Session { action } => match action {
            SessionAction::Login { username, password } => {
                shell.session_login(username, password).await?;
            }
            SessionAction::Logout => shell.session_logout().await?,
            SessionAction::Show => shell.session_show(),
        },
        Commands::Store { action } => match action {
            StoreAction::Dump => shell.store_dump()?,
        },
    }
    Ok(())
}
