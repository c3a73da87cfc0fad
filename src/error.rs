//! Error types for the tabrelay coordination layer.

use crate::channel::{ControlMessage, TabId};
use thiserror::Error;

/// Durable store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error for key '{key}': {message}")]
    Serialization { key: String, message: String },
}

/// Outbound model-provider errors
///
/// Whether a failure is retried is decided by the classifier handed to
/// [`crate::retry::RetryPolicy`], which inspects the rendered message.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Control channel errors
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("No surface is listening on tab {0}")]
    NoReceiver(TabId),

    #[error("Tab {0} is closed")]
    TabClosed(TabId),

    #[error("Surface injection failed for tab {tab}: {reason}")]
    InjectionFailed { tab: TabId, reason: String },

    #[error("Surface on tab {0} closed the channel without replying")]
    ReplyDropped(TabId),

    #[error("Message '{}' for tab {tab} dropped: {cause}", .message.action())]
    Dropped {
        tab: TabId,
        message: ControlMessage,
        cause: Box<ChannelError>,
    },

    #[error("Action '{0}' is not handled by this endpoint")]
    Unsupported(&'static str),

    #[error("No controller is accepting requests")]
    ControllerUnavailable,

    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl ChannelError {
    /// True when the failure means nobody was listening on the tab.
    pub fn is_no_receiver(&self) -> bool {
        matches!(self, ChannelError::NoReceiver(_))
    }
}

/// Top-level errors for configuration, logging and the CLI
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),

    #[error("Channel error: {0}")]
    ChannelError(#[from] ChannelError),

    #[error("Unknown setting '{0}'")]
    UnknownSetting(String),

    #[error("Model '{0}' is not offered by the configured provider")]
    UnknownModel(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

pub(crate) fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::IoError(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("sled: {}", err),
    ))
}

pub(crate) fn to_storage_data(key: &str, err: serde_json::Error) -> StorageError {
    StorageError::Serialization {
        key: key.to_string(),
        message: err.to_string(),
    }
}
