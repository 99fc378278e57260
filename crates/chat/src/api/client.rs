//! Relay backend HTTP client
//!
//! Provides the [`Backend`] operations over the relay's REST API.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use std::time::Duration;
use ureq::http::Response;
use ureq::{Agent, Body};

use super::normalize::{
    normalize_contact_profile, normalize_conversations, normalize_message, normalize_messages,
    normalize_stats, normalize_user_profile,
};
use super::wire::{
    ContactProfileResponse, ConversationsResponse, ErrorBody, MessagesResponse, SendRequest,
    StatsResponse, UserProfileResponse, WireMessage,
};
use super::{Backend, MessagePage, RelayAuth};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::models::{
    ContactId, ContactProfile, Conversation, Message, MessageId, Stats, UserProfile,
};

/// HTTP client for the relay backend
pub struct RelayClient {
    agent: Agent,
    base_url: String,
    auth: RelayAuth,
}

impl RelayClient {
    /// Create a client for `base_url` (without the `/api` suffix)
    pub fn new(base_url: impl Into<String>, auth: RelayAuth, timeout: Option<Duration>) -> Self {
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .into();

        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    /// Create a client from loaded configuration
    pub fn from_config(config: &ClientConfig, auth: RelayAuth) -> Self {
        Self::new(config.api_url.clone(), auth, config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> &RelayAuth {
        &self.auth
    }

    /// Log in with username and password, storing the returned tokens
    pub fn login(&self, username: &str, password: &str) -> anyhow::Result<()> {
        self.auth.login(&self.agent, &self.base_url, username, password)
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Run an authorized request, refreshing the token once on 401
    fn authorized<F>(&self, send: F) -> Result<Response<Body>, ApiError>
    where
        F: Fn(&Agent, &str) -> Result<Response<Body>, ureq::Error>,
    {
        let token = self.auth.access_token()?;
        let bearer = format!("Bearer {}", token);
        let response = send(&self.agent, &bearer).map_err(transport_error)?;

        if response.status().as_u16() != 401 {
            return Ok(response);
        }

        match self.auth.refresh(&self.agent, &self.base_url) {
            Ok(true) => {
                let token = self.auth.access_token()?;
                let bearer = format!("Bearer {}", token);
                let retried = send(&self.agent, &bearer).map_err(transport_error)?;
                if retried.status().as_u16() == 401 {
                    return Err(ApiError::Unauthorized);
                }
                Ok(retried)
            }
            Ok(false) => Err(ApiError::Unauthorized),
            Err(e) => {
                warn!("Token refresh failed: {:#}", e);
                Err(ApiError::Unauthorized)
            }
        }
    }

    /// Check status and decode a JSON body
    fn read<T: DeserializeOwned>(mut response: Response<Body>) -> Result<T, ApiError> {
        check_status(&mut response)?;
        response
            .body_mut()
            .read_json::<T>()
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self.authorized(|agent, bearer| {
            agent.get(&url).header("Authorization", bearer).call()
        })?;
        Self::read(response)
    }

    fn list_conversations_at(&self, path: &str) -> Result<Vec<Conversation>, ApiError> {
        let resp: ConversationsResponse = self.get_json(path)?;
        Ok(normalize_conversations(resp.conversations))
    }
}

impl Backend for RelayClient {
    fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.list_conversations_at("/api/conversations/")
    }

    fn list_groups(&self) -> Result<Vec<Conversation>, ApiError> {
        self.list_conversations_at("/api/groups/")
    }

    fn list_messages(&self, contact_id: &ContactId) -> Result<MessagePage, ApiError> {
        let path = format!(
            "/api/messages/?contact={}",
            urlencoding::encode(contact_id.as_str())
        );
        let resp: MessagesResponse = self.get_json(&path)?;
        Ok(normalize_messages(resp.messages))
    }

    fn get_message(&self, id: &MessageId) -> Result<Message, ApiError> {
        let path = format!("/api/messages/{}/", urlencoding::encode(id.as_str()));
        let row: WireMessage = self.get_json(&path)?;
        normalize_message(row).ok_or_else(|| ApiError::Decode("message without id".to_string()))
    }

    fn contact_profile(&self, contact_id: &ContactId) -> Result<ContactProfile, ApiError> {
        let path = format!(
            "/api/contact/profile/?contact={}",
            urlencoding::encode(contact_id.as_str())
        );
        let resp: ContactProfileResponse = self.get_json(&path)?;
        Ok(normalize_contact_profile(contact_id, resp))
    }

    fn send_message(&self, contact_id: &ContactId, body: &str) -> Result<(), ApiError> {
        let url = self.url("/api/send/");
        debug!("POST {} to {}", url, contact_id);
        let request = SendRequest {
            to: contact_id.as_str(),
            message: body,
        };
        let mut response = self.authorized(|agent, bearer| {
            agent
                .post(&url)
                .header("Authorization", bearer)
                .send_json(&request)
        })?;
        check_status(&mut response)
    }

    fn user_profile(&self) -> Result<UserProfile, ApiError> {
        let resp: UserProfileResponse = self.get_json("/api/profile/")?;
        Ok(normalize_user_profile(resp))
    }

    fn stats(&self) -> Result<Stats, ApiError> {
        let resp: StatsResponse = self.get_json("/api/stats/")?;
        Ok(normalize_stats(resp))
    }
}

/// Map a non-success status to [`ApiError`], using the backend's error body if any
fn check_status(response: &mut Response<Body>) -> Result<(), ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    if status.as_u16() == 401 {
        return Err(ApiError::Unauthorized);
    }

    let message = response
        .body_mut()
        .read_to_string()
        .ok()
        .and_then(|text| error_message(&text))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Extract `{"error": "..."}` from a failure body
fn error_message(text: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(text)
        .ok()
        .and_then(|body| body.error)
        .filter(|e| !e.is_empty())
}

fn transport_error(e: ureq::Error) -> ApiError {
    ApiError::Transport(e.to_string())
}
