//! CLI command implementations.

pub mod product;
pub mod sell;
pub mod session;

use std::sync::Arc;

use till_terminal::{ApiClient, FsTokenPersistence, TerminalConfig, TokenStore};

/// Build the shared client stack from the environment.
///
/// Loads the terminal config, restores any persisted session, and returns
/// a ready-to-use [`ApiClient`].
pub async fn build_client() -> Result<ApiClient, Box<dyn std::error::Error>> {
    let config = TerminalConfig::from_env()?;

    let tokens = TokenStore::new(Arc::new(FsTokenPersistence::new(config.token_path.clone())));
    tokens.init().await?;

    Ok(ApiClient::new(&config, tokens))
}
