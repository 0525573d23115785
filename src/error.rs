//! Error handling module for registry transfers
//!
//! Every failure is returned to the immediate caller. Nothing in this crate
//! retries on its own; retry policy belongs to whoever drives the transfer.

use crate::image::manifest::MultiPlatformImage;
use crate::image::platform::PlatformSpec;
use crate::registry::transport::Direction;
use std::fmt;
use thiserror::Error;

/// A reference string that could not be split into host, repository and
/// qualifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid image reference '{reference}': {reason}")]
pub struct InvalidReferenceError {
    pub reference: String,
    pub reason: String,
}

impl InvalidReferenceError {
    pub fn new(reference: &str, reason: impl Into<String>) -> Self {
        Self {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }
}

/// No available manifest in the index satisfies the requested platform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "platform {requested} not found in image {index_digest} (available: {})",
    list_or_none(.available)
)]
pub struct PlatformNotFoundError {
    pub requested: PlatformSpec,
    pub index_digest: String,
    pub available: Vec<String>,
}

impl PlatformNotFoundError {
    pub fn new(requested: &PlatformSpec, image: &MultiPlatformImage) -> Self {
        Self {
            requested: requested.clone(),
            index_digest: image.index_digest().to_string(),
            available: image.available_platforms(),
        }
    }
}

/// A platform or resolver mode string that could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidPlatformError {
    #[error("invalid platform '{0}': expected os/arch[/variant] or 'any'")]
    Format(String),
    #[error("invalid platform '{0}': empty component")]
    EmptyComponent(String),
    #[error("unknown platform fallback mode '{0}'")]
    UnknownMode(String),
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// Failure reported by a transport or inventory collaborator.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("registry unreachable: {0}")]
    Unreachable(String),
    #[error("authentication rejected: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transport error: {0}")]
    Other(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a failed transfer was doing when it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferScope {
    pub direction: Direction,
    pub reference: String,
    pub platform: Option<PlatformSpec>,
}

impl fmt::Display for TransferScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of '{}'", self.direction, self.reference)?;
        if let Some(platform) = &self.platform {
            write!(f, " ({})", platform)?;
        }
        Ok(())
    }
}

fn layer_suffix(layer: &Option<String>) -> String {
    match layer {
        Some(id) => format!(" at layer {}", id),
        None => String::new(),
    }
}

#[derive(Error, Debug)]
pub enum TransferError {
    /// The transport refused to begin (auth failure, unreachable host).
    #[error("{scope} could not start: {source}")]
    Start {
        scope: TransferScope,
        #[source]
        source: TransportError,
    },

    /// The registry reported a failure; `message` is its text verbatim.
    #[error("{scope} failed{}: {message}", layer_suffix(.layer))]
    Remote {
        scope: TransferScope,
        layer: Option<String>,
        message: String,
    },

    /// The status stream could not be decoded.
    #[error("{scope} produced an unreadable status stream: {message}")]
    Protocol { scope: TransferScope, message: String },

    #[error("transfer cancelled")]
    Cancelled,
}

impl TransferError {
    /// Cancellation is requested by the caller, not a failure of the transfer.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransferError::Cancelled)
    }

    /// The registry-reported message, when the failure came from the registry.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            TransferError::Remote { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Crate-wide error for operations that combine several components.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    InvalidReference(#[from] InvalidReferenceError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    PlatformNotFound(#[from] PlatformNotFoundError),
    #[error(transparent)]
    InvalidPlatform(#[from] InvalidPlatformError),
    #[error("inventory lookup failed: {0}")]
    Inventory(#[from] TransportError),
    #[error(transparent)]
    Image(#[from] crate::image::ImageError),
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, Error>;
