//! Composer output and error definitions

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

pub type ComposeResult<T> = Result<T, ComposeError>;

/// A rendered message.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedMessage {
    /// Free-form text body
    pub text: String,

    /// Positional variables ("1", "2", ...) for gateways sending approved templates
    pub variables: BTreeMap<String, String>,
}
