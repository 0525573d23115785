//! Image identity: references, manifests and multi-platform reconciliation
//!
//! This module covers everything about *which* image a transfer is about:
//!
//! - [`reference`] parses `host/repository[:tag][@digest]` and derives the
//!   transport policy for the host.
//! - [`manifest`] models the descriptors the registry inventory reports.
//! - [`platform`] picks the platform-specific manifest a pull targets.
//! - [`reconcile`] checks that two sides of a transfer hold the same
//!   manifests.
//!
//! # Examples
//!
//! ```
//! use registry_transfer::image::{ImageReference, PlatformSpec};
//!
//! let reference = ImageReference::parse("localhost:5000/busybox:1.37.0-musl").unwrap();
//! assert_eq!(reference.repository(), "busybox");
//! assert_eq!(PlatformSpec::parse("any").unwrap(), PlatformSpec::Any);
//! ```

pub mod manifest;
pub mod platform;
pub mod reconcile;
pub mod reference;

pub use manifest::{ManifestDescriptor, ManifestKind, MultiPlatformImage, Platform};
pub use platform::{PlatformResolver, PlatformSpec, Resolution, ResolverMode, resolve};
pub use reconcile::{
    ImageComparison, ReconcileOptions, ReconcileResult, compare, compare_images, compare_with,
};
pub use reference::{ImageReference, TlsPolicy};

/// Errors raised while assembling image metadata
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("image {index_digest} lists manifest {digest} more than once")]
    DuplicateManifest { index_digest: String, digest: String },
}
