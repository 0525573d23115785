//! Registry Transfer Library
//!
//! Client core for moving images to and from OCI-compatible registries:
//! cancellable push/pull execution over a server-streamed status feed,
//! platform resolution for multi-platform images, and reconciliation of the
//! manifest sets on both sides of a transfer.

pub mod config;
pub mod digest;
pub mod error;
pub mod image;
pub mod logging;
pub mod registry;

pub use config::TransferConfig;
pub use error::{
    Error, InvalidPlatformError, InvalidReferenceError, PlatformNotFoundError, Result,
    TransferError, TransportError,
};
pub use image::{ImageReference, ManifestDescriptor, MultiPlatformImage, PlatformSpec};
pub use logging::Logger;
pub use registry::{
    CancellationToken, Direction, RegistryClient, TransferExecutor, TransferOptions, TransferResult,
};
