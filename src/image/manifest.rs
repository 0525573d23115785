//! Manifest descriptors and multi-platform images
//!
//! These are the shapes the registry inventory hands back. The crate never
//! fetches or parses raw manifest JSON itself.

use crate::digest::DigestUtils;
use crate::image::ImageError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Target platform of a platform-specific manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Platform {
    pub fn new(os: &str, architecture: &str, variant: Option<&str>) -> Self {
        Self {
            os: os.to_string(),
            architecture: architecture.to_string(),
            variant: variant.map(str::to_string),
        }
    }

    /// Architecture in OCI spelling (`x86_64` → `amd64`, `aarch64` → `arm64`)
    pub fn normalized_architecture(&self) -> &str {
        match self.architecture.as_str() {
            "x86_64" | "x86-64" => "amd64",
            "aarch64" => "arm64",
            "armhf" => "arm",
            other => other,
        }
    }

    /// Variant with the implied `arm64` default (`v8`) filled in
    pub fn normalized_variant(&self) -> Option<&str> {
        match (self.normalized_architecture(), self.variant.as_deref()) {
            ("arm64", None) => Some("v8"),
            (_, variant) => variant,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{}", variant)?;
        }
        Ok(())
    }
}

/// What a manifest in an index describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    Image,
    Attestation,
    Unknown,
}

/// One entry of an image index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDescriptor {
    pub digest: String,
    #[serde(default)]
    pub platform: Option<Platform>,
    pub kind: ManifestKind,
    /// `false` when the index references the manifest but its content is not
    /// materialized in the store that produced this descriptor.
    pub available: bool,
}

impl ManifestDescriptor {
    pub fn image(digest: &str, platform: Platform, available: bool) -> Self {
        Self {
            digest: digest.to_string(),
            platform: Some(platform),
            kind: ManifestKind::Image,
            available,
        }
    }

    pub fn attestation(digest: &str, available: bool) -> Self {
        Self {
            digest: digest.to_string(),
            platform: None,
            kind: ManifestKind::Attestation,
            available,
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == ManifestKind::Image
    }
}

/// A multi-platform image: an index and the manifests it references.
///
/// Manifest digests are unique within one image. The index digest identifies
/// the set of manifests and does not change when they are listed in a
/// different order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMultiPlatformImage")]
pub struct MultiPlatformImage {
    index_digest: String,
    manifests: Vec<ManifestDescriptor>,
}

/// Wire shape of [`MultiPlatformImage`], validated on conversion
#[derive(Deserialize)]
struct RawMultiPlatformImage {
    index_digest: String,
    manifests: Vec<ManifestDescriptor>,
}

impl TryFrom<RawMultiPlatformImage> for MultiPlatformImage {
    type Error = ImageError;

    fn try_from(raw: RawMultiPlatformImage) -> Result<Self, Self::Error> {
        Self::new(&raw.index_digest, raw.manifests)
    }
}

impl MultiPlatformImage {
    /// Build an image from an index digest reported by the inventory.
    pub fn new(index_digest: &str, manifests: Vec<ManifestDescriptor>) -> Result<Self, ImageError> {
        let mut seen = HashSet::with_capacity(manifests.len());
        for manifest in &manifests {
            if !seen.insert(manifest.digest.as_str()) {
                return Err(ImageError::DuplicateManifest {
                    index_digest: index_digest.to_string(),
                    digest: manifest.digest.clone(),
                });
            }
        }
        Ok(Self {
            index_digest: index_digest.to_string(),
            manifests,
        })
    }

    /// Build an image whose index digest is derived from its manifest set.
    pub fn from_manifests(manifests: Vec<ManifestDescriptor>) -> Result<Self, ImageError> {
        let index_digest = DigestUtils::set_digest(manifests.iter().map(|m| m.digest.as_str()));
        Self::new(&index_digest, manifests)
    }

    pub fn index_digest(&self) -> &str {
        &self.index_digest
    }

    pub fn manifests(&self) -> &[ManifestDescriptor] {
        &self.manifests
    }

    pub fn available(&self) -> impl Iterator<Item = &ManifestDescriptor> {
        self.manifests.iter().filter(|m| m.available)
    }

    /// Platforms of the materialized image manifests, in index order
    pub fn available_platforms(&self) -> Vec<String> {
        self.available()
            .filter(|m| m.is_image())
            .filter_map(|m| m.platform.as_ref().map(Platform::to_string))
            .collect()
    }
}
