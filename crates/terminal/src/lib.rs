//! Till Terminal - point-of-sale client library.
//!
//! This crate owns the parts of a POS terminal with real invariants:
//!
//! - [`auth`] - token pair storage with atomic replace/clear and pluggable
//!   persistence
//! - [`client`] - authenticated API access: bearer attachment, 401
//!   detection, single-flight token refresh, one retry, terminal
//!   auth-failure signaling
//! - [`catalog`] - product reads with a cached local stock view
//! - [`cart`] - the in-memory sale: line items, stock ceilings, fixed-point
//!   totals
//! - [`checkout`] - snapshot, submit, local stock decrement, receipt
//!
//! Everything presentational (screens, printing, navigation) lives in the
//! callers; this crate only exposes the operations they invoke.
//!
//! # Example
//!
//! ```rust,ignore
//! use till_terminal::{ApiClient, CartEngine, CatalogGateway, CheckoutCoordinator, TokenStore};
//!
//! let config = TerminalConfig::from_env()?;
//! let tokens = TokenStore::new(Arc::new(FsTokenPersistence::new(config.token_path.clone())));
//! tokens.init().await?;
//!
//! let api = ApiClient::new(&config, tokens);
//! let catalog = CatalogGateway::new(api.clone());
//! let checkout = CheckoutCoordinator::new(api.clone(), catalog.clone());
//!
//! let product = catalog.fetch_product(&"p-100".into()).await?;
//! let mut cart = CartEngine::new();
//! cart.add_item(&product, 2)?;
//! let receipt = checkout.checkout(&cart, PaymentMethod::Cash, "Walk-in").await?;
//! cart.clear();
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod client;
pub mod config;
pub mod error;

pub use auth::persist::{FsTokenPersistence, MemoryTokenPersistence, TokenPersistence};
pub use auth::store::TokenStore;
pub use auth::TokenPair;
pub use cart::{CartEngine, CartError, CartLine, Totals};
pub use catalog::{CatalogGateway, ProductSnapshot};
pub use checkout::{CheckoutCoordinator, CheckoutError, Receipt, ReceiptLine};
pub use client::{ApiClient, ApiRequest, ApiResponse};
pub use config::{ConfigError, TerminalConfig};
pub use error::ApiError;
