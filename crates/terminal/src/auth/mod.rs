//! Session tokens for the POS API.
//!
//! The API issues a short-lived access token plus a longer-lived refresh
//! token. The access token rides on every authenticated request as a bearer
//! credential; when the server rejects it with a 401, the refresh token is
//! exchanged for a new pair (see [`crate::client`] for the single-flight
//! protocol around that exchange).
//!
//! Tokens live in a [`store::TokenStore`] and survive restarts through a
//! pluggable [`persist::TokenPersistence`] backend.

pub mod persist;
pub mod store;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use persist::PersistedTokens;

/// The current access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Bearer credential attached to authenticated requests.
    pub access_token: SecretString,
    /// Credential exchanged for a new access token. Absent for sessions the
    /// server issued without refresh support; such sessions end at the
    /// first 401.
    pub refresh_token: Option<SecretString>,
    /// When the access token expires, if the server said.
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenPair {
    /// Check if the access token is expired (with 60s buffer).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Utc::now() >= expires_at - TimeDelta::seconds(60))
    }

    /// Whether a refresh can even be attempted.
    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    pub(crate) fn to_persisted(&self) -> PersistedTokens {
        PersistedTokens {
            access_token: self.access_token.expose_secret().to_owned(),
            refresh_token: self
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_owned()),
            expires_at: self.expires_at,
        }
    }

    pub(crate) fn from_persisted(persisted: PersistedTokens) -> Self {
        Self {
            access_token: SecretString::from(persisted.access_token),
            refresh_token: persisted.refresh_token.map(SecretString::from),
            expires_at: persisted.expires_at,
        }
    }
}

/// Raw token response from the login and refresh endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access-token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    /// Convert into a [`TokenPair`], anchoring `expires_in` at the moment
    /// the response was received.
    pub(crate) fn into_pair(self, obtained_at: DateTime<Utc>) -> TokenPair {
        TokenPair {
            access_token: SecretString::from(self.access_token),
            refresh_token: self.refresh_token.map(SecretString::from),
            expires_at: self
                .expires_in
                .map(|secs| obtained_at + TimeDelta::seconds(secs)),
        }
    }
}
