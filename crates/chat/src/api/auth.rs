//! Bearer-token authentication for the relay backend
//!
//! Tokens come from `POST /api/token/` (username + password) and are kept
//! in the Herald config directory. When the backend rejects the access
//! token, the refresh token is tried once before giving up.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;

use super::wire::{RefreshRequest, TokenRequest, TokenResponse};
use crate::error::ApiError;

/// Token filename in the Herald config directory
const TOKEN_FILE: &str = "token.json";

/// Stored token data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access: String,
    pub refresh: Option<String>,
    /// Unix seconds when the access token was obtained
    pub obtained_at: i64,
}

/// Token storage and refresh for the relay backend
pub struct RelayAuth {
    token_path: Option<PathBuf>,
    token: RwLock<Option<StoredToken>>,
}

impl RelayAuth {
    /// Auth backed by the default token file; loads any saved token
    pub fn new() -> Result<Self> {
        let token_path =
            config::config_path(TOKEN_FILE).context("Could not determine config directory")?;
        Ok(Self::with_token_path(token_path))
    }

    /// Auth backed by an explicit token file; loads any saved token
    pub fn with_token_path(token_path: PathBuf) -> Self {
        let token = if token_path.exists() {
            match config::load_json_file::<StoredToken>(&token_path) {
                Ok(token) => Some(token),
                Err(e) => {
                    warn!("Ignoring unreadable token file: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            token_path: Some(token_path),
            token: RwLock::new(token),
        }
    }

    /// Auth with a fixed access token that is never persisted
    pub fn with_access_token(access: impl Into<String>) -> Self {
        Self {
            token_path: None,
            token: RwLock::new(Some(StoredToken {
                access: access.into(),
                refresh: None,
                obtained_at: chrono::Utc::now().timestamp(),
            })),
        }
    }

    /// Whether an access token is available
    pub fn is_authenticated(&self) -> bool {
        self.token.read().map(|t| t.is_some()).unwrap_or(false)
    }

    /// Current access token, or `Unauthorized` when logged out
    pub fn access_token(&self) -> Result<String, ApiError> {
        self.token
            .read()
            .ok()
            .and_then(|t| t.as_ref().map(|t| t.access.clone()))
            .ok_or(ApiError::Unauthorized)
    }

    /// Exchange username and password for a token pair and store it
    pub fn login(
        &self,
        agent: &ureq::Agent,
        base_url: &str,
        username: &str,
        password: &str,
    ) -> Result<()> {
        let url = format!("{}/api/token/", base_url);
        let mut response = agent
            .post(&url)
            .send_json(&TokenRequest { username, password })
            .context("Failed to send login request")?;

        let status = response.status().as_u16();
        anyhow::ensure!(
            (200..300).contains(&status),
            "Login rejected by backend (status {})",
            status
        );

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse login response")?;

        self.store(StoredToken {
            access: token.access,
            refresh: token.refresh,
            obtained_at: chrono::Utc::now().timestamp(),
        })?;
        info!("Logged in as {}", username);
        Ok(())
    }

    /// Try to obtain a new access token with the stored refresh token.
    ///
    /// Returns `Ok(false)` when there is no refresh token or the backend
    /// refuses it.
    pub fn refresh(&self, agent: &ureq::Agent, base_url: &str) -> Result<bool> {
        let Some(current) = self.token.read().ok().and_then(|t| t.clone()) else {
            return Ok(false);
        };
        let Some(refresh) = current.refresh.clone() else {
            return Ok(false);
        };

        let url = format!("{}/api/token/refresh/", base_url);
        let mut response = agent
            .post(&url)
            .send_json(&RefreshRequest { refresh: &refresh })
            .context("Failed to send token refresh request")?;

        if !response.status().is_success() {
            debug!("Token refresh rejected with {}", response.status());
            return Ok(false);
        }

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token refresh response")?;

        self.store(StoredToken {
            access: token.access,
            refresh: token.refresh.or(Some(refresh)),
            obtained_at: chrono::Utc::now().timestamp(),
        })?;
        debug!("Access token refreshed");
        Ok(true)
    }

    /// Forget the token in memory and on disk
    pub fn logout(&self) -> Result<()> {
        if let Ok(mut guard) = self.token.write() {
            *guard = None;
        }
        if let Some(path) = &self.token_path {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to remove {}", path.display()));
                }
            }
        }
        info!("Logged out");
        Ok(())
    }

    fn store(&self, token: StoredToken) -> Result<()> {
        if let Some(path) = &self.token_path {
            config::save_json_file(path, &token)?;
        }
        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token);
        }
        Ok(())
    }
}
