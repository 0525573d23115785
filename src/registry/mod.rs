//! Registry transfer module
//!
//! This module drives push and pull operations against an OCI registry and
//! turns their status streams into typed events and human-readable results.
//! The registry, daemon and credential store are reached only through the
//! collaborator traits in [`transport`].

pub mod cancel;
pub mod client;
pub mod executor;
pub mod progress;
pub mod transport;

pub use cancel::CancellationToken;
pub use client::{RegistryClient, RegistryClientBuilder};
pub use executor::{TransferExecutor, TransferResult};
pub use progress::{EventDecoder, FailureKind, TransferEvent};
pub use transport::{
    AnonymousCredentials, CredentialProvider, Credentials, Direction, RegistryInventory,
    StaticCredentials, TransferOptions, TransferStream, Transport,
};
