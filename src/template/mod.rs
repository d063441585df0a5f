//! Message composition.
//!
//! One fixed template per message type. Parameters are strongly typed per
//! type, and composition yields both the free-form text and the positional
//! variables used when the gateway sends an approved content template.

mod composer;
mod params;
mod types;

pub use composer::{compose, PASS_THRESHOLD};
pub use params::MessageParams;
pub use types::{ComposeError, ComposeResult, ComposedMessage};
