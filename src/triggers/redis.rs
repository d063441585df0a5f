use std::sync::Arc;

use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::config::RedisConfig;
use crate::notification::{DispatchError, DispatchRequest, MessageBody, MessageType, NotificationDispatcher};
use crate::phone::mask_phone;
use crate::template::MessageParams;

use super::backoff::ReconnectBackoff;

/// Channel subscribed to when none are configured
const DEFAULT_CHANNEL: &str = "notifications:dispatch";

/// Message format received from Redis Pub/Sub.
///
/// `params` carries structured parameters; `text` carries pre-rendered text
/// and then requires `message_type`. The type defaults to the one implied by
/// `params`.
#[derive(Debug, Deserialize)]
pub struct RedisDispatchMessage {
    pub phone: String,
    #[serde(default)]
    pub message_type: Option<MessageType>,
    #[serde(default)]
    pub params: Option<MessageParams>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub student_id: Option<i64>,
    #[serde(default)]
    pub teacher_id: Option<i64>,
}

impl RedisDispatchMessage {
    /// Turn the wire message into a dispatch request.
    pub fn into_request(self) -> Result<DispatchRequest, String> {
        let mut request = match (self.params, self.text) {
            (Some(params), None) => {
                let mut request = DispatchRequest::new(self.phone, params);
                if let Some(message_type) = self.message_type {
                    request.message_type = message_type;
                }
                request
            }
            (None, Some(text)) => {
                let message_type = self
                    .message_type
                    .ok_or_else(|| "message_type is required with text".to_string())?;
                DispatchRequest::rendered(self.phone, message_type, text)
            }
            (Some(_), Some(_)) => return Err("params and text are mutually exclusive".to_string()),
            (None, None) => return Err("one of params or text is required".to_string()),
        };

        request.related_student = self.student_id;
        request.related_teacher = self.teacher_id;
        Ok(request)
    }
}

/// Redis Pub/Sub subscriber feeding dispatch requests to the dispatcher
pub struct RedisSubscriber {
    config: RedisConfig,
    dispatcher: Arc<NotificationDispatcher>,
    shutdown: broadcast::Sender<()>,
}

impl RedisSubscriber {
    pub fn new(config: RedisConfig, dispatcher: Arc<NotificationDispatcher>) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            config,
            dispatcher,
            shutdown,
        }
    }

    /// Get a shutdown signal sender
    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    /// Run until shutdown, reconnecting with backoff on failures.
    pub async fn start(&self) -> anyhow::Result<()> {
        if !self.config.enabled {
            tracing::info!("Redis trigger disabled");
            return Ok(());
        }

        let channels = self.channels();
        tracing::info!(channels = ?channels, "Starting Redis subscriber");

        let mut backoff = ReconnectBackoff::default();
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            match self.run_subscription_loop(&channels, &mut backoff).await {
                Ok(()) => {
                    tracing::info!("Redis subscriber stopped gracefully");
                    break;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::error!(
                        error = %e,
                        attempt = backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "Redis subscription error, reconnecting"
                    );
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        Ok(())
    }

    fn channels(&self) -> Vec<String> {
        if self.config.channels.is_empty() {
            vec![DEFAULT_CHANNEL.to_string()]
        } else {
            self.config.channels.clone()
        }
    }

    async fn run_subscription_loop(
        &self,
        channels: &[String],
        backoff: &mut ReconnectBackoff,
    ) -> anyhow::Result<()> {
        let client = redis::Client::open(self.config.url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        for channel in channels {
            if channel.contains('*') || channel.contains('?') || channel.contains('[') {
                pubsub.psubscribe(channel).await?;
                tracing::debug!(pattern = %channel, "Subscribed to pattern");
            } else {
                pubsub.subscribe(channel).await?;
                tracing::debug!(channel = %channel, "Subscribed to channel");
            }
        }

        tracing::info!("Redis subscription established");
        backoff.reset();

        let mut message_stream = pubsub.on_message();
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Received shutdown signal");
                    return Ok(());
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(msg) => {
                            let channel: String = msg.get_channel_name().to_string();
                            let payload: String = match msg.get_payload() {
                                Ok(p) => p,
                                Err(e) => {
                                    tracing::warn!(error = %e, "Failed to get message payload");
                                    continue;
                                }
                            };

                            self.handle_message(&channel, &payload).await;
                        }
                        None => {
                            return Err(anyhow::anyhow!("Redis message stream ended"));
                        }
                    }
                }
            }
        }
    }

    /// Parse and dispatch one message. Malformed messages are logged and dropped.
    async fn handle_message(&self, channel: &str, payload: &str) {
        tracing::debug!(channel = %channel, "Received Redis message");

        let request = match serde_json::from_str::<RedisDispatchMessage>(payload)
            .map_err(|e| e.to_string())
            .and_then(RedisDispatchMessage::into_request)
        {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    channel = %channel,
                    "Failed to parse Redis dispatch message"
                );
                return;
            }
        };

        let recipient = mask_phone(&request.raw_phone);
        let rendered = matches!(request.body, MessageBody::Rendered(_));

        match self.dispatcher.dispatch(request).await {
            Ok(record) => {
                tracing::debug!(
                    channel = %channel,
                    id = record.id,
                    status = %record.status,
                    "Dispatched notification from Redis"
                );
            }
            Err(DispatchError::Misuse(reason)) => {
                tracing::warn!(
                    channel = %channel,
                    recipient = %recipient,
                    rendered = rendered,
                    reason = %reason,
                    "Rejected Redis dispatch message"
                );
            }
            Err(e) => {
                tracing::error!(channel = %channel, error = %e, "Dispatch from Redis failed");
            }
        }
    }
}
