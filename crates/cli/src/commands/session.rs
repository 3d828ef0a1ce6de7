//! Session commands: login and logout.

use secrecy::SecretString;
use thiserror::Error;

use super::build_client;

/// Errors specific to session commands.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No password given and `TILL_PASSWORD` is not set.
    #[error("no password: pass --password or set TILL_PASSWORD")]
    MissingPassword,
}

/// Sign in and persist the returned token pair.
pub async fn login(
    username: &str,
    password: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let password = password
        .or_else(|| std::env::var("TILL_PASSWORD").ok())
        .map(SecretString::from)
        .ok_or(SessionError::MissingPassword)?;

    let client = build_client().await?;
    client.login(username, &password).await?;

    tracing::info!("Signed in as {username}");
    Ok(())
}

/// Sign out and drop persisted tokens.
pub async fn logout() -> Result<(), Box<dyn std::error::Error>> {
    let client = build_client().await?;
    client.logout().await;

    tracing::info!("Signed out");
    Ok(())
}
