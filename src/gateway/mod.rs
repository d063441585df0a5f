//! Outbound messaging gateway.
//!
//! `MessagingGateway` is the seam between the dispatcher and the vendor API.
//! `TwilioGateway` is the production implementation; tests provide their own.

mod twilio;
mod types;

use async_trait::async_trait;

pub use twilio::TwilioGateway;
pub use types::{GatewayBody, GatewayConfig, GatewayError, OutboundMessage};

#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Hand a message to the vendor, returning its external message id.
    async fn send(&self, message: &OutboundMessage) -> Result<String, GatewayError>;

    /// Gateway name for logs
    fn name(&self) -> &'static str;
}
