//! Collaborator interfaces consumed by the transfer core
//!
//! The core never talks to a registry or a daemon directly. A [`Transport`]
//! starts a push or pull and hands back its status stream, a
//! [`RegistryInventory`] lists the manifests a store holds for a reference,
//! and a [`CredentialProvider`] supplies the opaque credential blob. All three
//! are injected; none is a process-wide singleton.

use crate::error::TransportError;
use crate::image::{ImageReference, MultiPlatformImage, PlatformSpec};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use std::fmt;
use tokio::io::AsyncRead;

/// Byte stream of JSON status frames produced by a running transfer
pub type TransferStream = Box<dyn AsyncRead + Send + Unpin>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Push,
    Pull,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Push => f.write_str("push"),
            Direction::Pull => f.write_str("pull"),
        }
    }
}

/// Opaque credential blob passed straight through to the transport.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials(String);

impl Credentials {
    pub fn new(blob: impl Into<String>) -> Self {
        Self(blob.into())
    }

    /// Blob for registries that need no authentication: URL-safe base64 of
    /// an empty JSON object, which the Docker engine accepts as "no auth".
    pub fn anonymous() -> Self {
        Self(URL_SAFE.encode(b"{}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

/// Options for one transfer
#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    /// Restrict the transfer to one platform
    pub platform: Option<PlatformSpec>,
    pub credentials: Credentials,
}

impl TransferOptions {
    pub fn with_platform(mut self, platform: PlatformSpec) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}

/// Starts push/pull operations and exposes their status streams.
///
/// An `Err` means the transfer never began (bad credentials, unreachable
/// host). Failures after that point arrive as error frames in the stream.
/// Connection teardown on cancellation is the transport's own business.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn start_transfer(
        &self,
        direction: Direction,
        reference: &ImageReference,
        options: &TransferOptions,
    ) -> Result<TransferStream, TransportError>;
}

/// Lists the manifests a store holds for a reference.
#[async_trait]
pub trait RegistryInventory: Send + Sync {
    async fn list_manifests(
        &self,
        reference: &ImageReference,
    ) -> Result<MultiPlatformImage, TransportError>;
}

/// Supplies credentials for a reference.
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self, reference: &ImageReference) -> Credentials;
}

/// Provider that always returns [`Credentials::anonymous`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousCredentials;

impl CredentialProvider for AnonymousCredentials {
    fn credentials(&self, _reference: &ImageReference) -> Credentials {
        Credentials::anonymous()
    }
}

/// Provider that hands out one fixed blob
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl CredentialProvider for StaticCredentials {
    fn credentials(&self, _reference: &ImageReference) -> Credentials {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_credentials_blob() {
        assert_eq!(Credentials::anonymous().as_str(), "e30=");
        assert_eq!(Credentials::default(), Credentials::anonymous());
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials::new("c2VjcmV0");
        assert!(!format!("{:?}", creds).contains("c2VjcmV0"));
    }
}
