//! Twilio Messages API client

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::types::{GatewayBody, GatewayConfig, GatewayError, OutboundMessage};
use super::MessagingGateway;
use crate::metrics::DispatchMetrics;

/// Longest raw response body echoed into an error detail
const MAX_DETAIL_LEN: usize = 200;

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct VendorError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Sends messages through `POST /2010-04-01/Accounts/{sid}/Messages.json`.
pub struct TwilioGateway {
    config: GatewayConfig,
    client: Client,
}

impl TwilioGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        tracing::info!(
            base_url = %config.base_url,
            channel_prefix = %config.channel_prefix,
            timeout_secs = config.timeout.as_secs(),
            "Messaging gateway client created"
        );

        Ok(Self { config, client })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.base_url, self.config.account_sid
        )
    }

    /// Apply the channel prefix unless the address already carries it.
    fn address(&self, phone: &str) -> String {
        if phone.starts_with(&self.config.channel_prefix) {
            phone.to_string()
        } else {
            format!("{}{}", self.config.channel_prefix, phone)
        }
    }

    fn form(&self, message: &OutboundMessage) -> Result<Vec<(&'static str, String)>, GatewayError> {
        let mut form = vec![
            ("To", self.address(&message.to)),
            ("From", self.address(&message.from)),
        ];

        match &message.body {
            GatewayBody::Text(text) => form.push(("Body", text.clone())),
            GatewayBody::Template {
                content_sid,
                variables,
            } => {
                let variables = serde_json::to_string(variables)
                    .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
                form.push(("ContentSid", content_sid.clone()));
                form.push(("ContentVariables", variables));
            }
        }

        Ok(form)
    }
}

#[async_trait]
impl MessagingGateway for TwilioGateway {
    async fn send(&self, message: &OutboundMessage) -> Result<String, GatewayError> {
        let form = self.form(message)?;
        let started = Instant::now();

        let result = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await;

        // Observed for every call, failed ones included
        DispatchMetrics::record_gateway_latency(started.elapsed().as_secs_f64());

        let response = result.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout(self.config.timeout)
            } else {
                GatewayError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<VendorError>(&body) {
                Ok(VendorError {
                    message: Some(message),
                    code,
                }) => match code {
                    Some(code) => format!("{} (code {})", message, code),
                    None => message,
                },
                _ => body.chars().take(MAX_DETAIL_LEN).collect(),
            };

            tracing::warn!(status = status.as_u16(), detail = %detail, "Gateway rejected message");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let resource: MessageResource = serde_json::from_str(&body)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        tracing::debug!(external_id = %resource.sid, "Gateway accepted message");
        Ok(resource.sid)
    }

    fn name(&self) -> &'static str {
        "twilio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn gateway() -> TwilioGateway {
        TwilioGateway::new(GatewayConfig {
            account_sid: "AC123".to_string(),
            auth_token: "token".to_string(),
            base_url: "https://api.twilio.com".to_string(),
            channel_prefix: "whatsapp:".to_string(),
            timeout: Duration::from_secs(10),
        })
        .unwrap()
    }

    #[test]
    fn test_messages_url() {
        assert_eq!(
            gateway().messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[test]
    fn test_address_prefix_applied_once() {
        let gw = gateway();
        assert_eq!(gw.address("+919876543210"), "whatsapp:+919876543210");
        assert_eq!(gw.address("whatsapp:+14155238886"), "whatsapp:+14155238886");
    }

    #[test]
    fn test_template_form_fields() {
        let mut variables = BTreeMap::new();
        variables.insert("1".to_string(), "2025-06-01".to_string());
        variables.insert("2".to_string(), "4:30 PM".to_string());

        let message = OutboundMessage {
            to: "+919876543210".to_string(),
            from: "+14155238886".to_string(),
            body: GatewayBody::Template {
                content_sid: "HX123".to_string(),
                variables,
            },
        };

        let form = gateway().form(&message).unwrap();
        assert!(form.contains(&("ContentSid", "HX123".to_string())));
        assert!(form.contains(&(
            "ContentVariables",
            r#"{"1":"2025-06-01","2":"4:30 PM"}"#.to_string()
        )));
        assert!(!form.iter().any(|(k, _)| *k == "Body"));
    }
}
