use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use crate::config::GatewaySettings;

/// Errors from the messaging gateway.
///
/// All of them are recorded as a failed dispatch; none are surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Gateway transport error: {0}")]
    Transport(String),

    #[error("Gateway rejected message (HTTP {status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Gateway timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// Message body as understood by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayBody {
    Text(String),
    /// Pre-approved content template with positional variables
    Template {
        content_sid: String,
        variables: BTreeMap<String, String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Canonical recipient phone, without channel prefix
    pub to: String,
    /// Sender identity
    pub from: String,
    pub body: GatewayBody,
}

/// Credentials and endpoint for the gateway client.
#[derive(Clone)]
pub struct GatewayConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub base_url: String,
    /// Prepended to both addresses, e.g. "whatsapp:"
    pub channel_prefix: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self {
            account_sid: settings.account_sid.clone(),
            auth_token: settings.auth_token.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            channel_prefix: settings.channel_prefix.clone(),
            timeout: Duration::from_secs(settings.timeout_seconds),
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"***")
            .field("base_url", &self.base_url)
            .field("channel_prefix", &self.channel_prefix)
            .field("timeout", &self.timeout)
            .finish()
    }
}
