//! Till CLI - operator front end for the POS terminal library.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password from --password or TILL_PASSWORD)
//! till login -u clerk@example.com
//!
//! # Look up a product
//! till product p-100
//!
//! # Ring up a sale: two of p-100 and one of p-205, 10% discount, 18% tax
//! till sell -c "Walk-in" -d 10 -t 18 p-100:2 p-205:1
//!
//! # Sign out
//! till logout
//! ```
//!
//! # Environment Variables
//!
//! - `TILL_API_BASE_URL` - Base URL of the POS API (required)
//! - `TILL_PASSWORD` - Password for `till login` when `--password` is omitted
//! - `TILL_TOKEN_PATH` - Where the session tokens are persisted

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "till")]
#[command(author, version, about = "Till point-of-sale CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and persist the session tokens
    Login {
        /// Username (clerk email or terminal account)
        #[arg(short, long)]
        username: String,

        /// Password; falls back to the `TILL_PASSWORD` environment variable
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Sign out and drop the persisted session tokens
    Logout,
    /// Look up a product by id
    Product {
        /// Product id
        id: String,
    },
    /// Ring up a sale
    Sell {
        /// Customer label for the receipt
        #[arg(short, long)]
        customer: String,

        /// Payment method (cash, card, transfer)
        #[arg(short, long, default_value = "cash")]
        payment: String,

        /// Discount percent [0, 100]
        #[arg(short, long, default_value = "0")]
        discount: String,

        /// Tax percent
        #[arg(short, long, default_value = "0")]
        tax: String,

        /// Line items as `product-id:quantity` pairs
        #[arg(required = true)]
        items: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Login { username, password } => {
            commands::session::login(&username, password).await?;
        }
        Commands::Logout => commands::session::logout().await?,
        Commands::Product { id } => commands::product::show(&id).await?,
        Commands::Sell {
            customer,
            payment,
            discount,
            tax,
            items,
        } => {
            commands::sell::run(&customer, &payment, &discount, &tax, &items).await?;
        }
    }
    Ok(())
}
