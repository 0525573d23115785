//! Platform resolution for multi-platform images
//!
//! Decides which platform-specific manifest a pull should materialize. Only
//! image manifests whose content is available are candidates.
//!
//! Stores disagree about a requested platform they do not hold: the
//! distribution registry answers "not found", while Docker backed by the
//! containerd image store reports "Image is up to date". The second behavior
//! is opt-in through [`ResolverMode::ReportUpToDate`].

use crate::error::{InvalidPlatformError, PlatformNotFoundError};
use crate::image::manifest::{ManifestDescriptor, MultiPlatformImage, Platform};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platform requested by a pull.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlatformSpec {
    Exact(Platform),
    /// Whatever platform the image already has materialized
    Any,
}

impl PlatformSpec {
    pub fn exact(os: &str, architecture: &str, variant: Option<&str>) -> Self {
        PlatformSpec::Exact(Platform::new(os, architecture, variant))
    }

    /// Parse `os/arch[/variant]` or `any`.
    pub fn parse(text: &str) -> Result<Self, InvalidPlatformError> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("any") {
            return Ok(PlatformSpec::Any);
        }
        let parts: Vec<&str> = text.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(InvalidPlatformError::EmptyComponent(text.to_string()));
        }
        match parts.as_slice() {
            [os, arch] => Ok(Self::exact(os, arch, None)),
            [os, arch, variant] => Ok(Self::exact(os, arch, Some(variant))),
            _ => Err(InvalidPlatformError::Format(text.to_string())),
        }
    }

    /// Whether `candidate` satisfies this spec. An absent requested variant
    /// matches any variant.
    pub fn matches(&self, candidate: &Platform) -> bool {
        match self {
            PlatformSpec::Any => true,
            PlatformSpec::Exact(wanted) => {
                wanted.os == candidate.os
                    && wanted.normalized_architecture() == candidate.normalized_architecture()
                    && (wanted.variant.is_none()
                        || wanted.normalized_variant() == candidate.normalized_variant())
            }
        }
    }
}

impl fmt::Display for PlatformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformSpec::Exact(platform) => platform.fmt(f),
            PlatformSpec::Any => f.write_str("any"),
        }
    }
}

impl FromStr for PlatformSpec {
    type Err = InvalidPlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// How a missing platform is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolverMode {
    /// Fail with [`PlatformNotFoundError`]
    #[default]
    Strict,
    /// Report success without a target, like the containerd image store
    ReportUpToDate,
}

impl FromStr for ResolverMode {
    type Err = InvalidPlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ResolverMode::Strict),
            "up-to-date" | "report-up-to-date" | "containerd" => Ok(ResolverMode::ReportUpToDate),
            other => Err(InvalidPlatformError::UnknownMode(other.to_string())),
        }
    }
}

/// Outcome of resolving a platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Manifest(ManifestDescriptor),
    /// Nothing matched and the resolver reports the image as up to date
    UpToDate,
}

impl Resolution {
    pub fn manifest(&self) -> Option<&ManifestDescriptor> {
        match self {
            Resolution::Manifest(m) => Some(m),
            Resolution::UpToDate => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformResolver {
    mode: ResolverMode,
}

impl PlatformResolver {
    pub fn new(mode: ResolverMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ResolverMode {
        self.mode
    }

    /// First available image manifest satisfying `requested`, in index order.
    ///
    /// `Any` therefore returns the same manifest on every call for one image.
    pub fn find<'a>(
        image: &'a MultiPlatformImage,
        requested: &PlatformSpec,
    ) -> Option<&'a ManifestDescriptor> {
        image
            .available()
            .filter(|m| m.is_image())
            .find(|m| match (&m.platform, requested) {
                (_, PlatformSpec::Any) => true,
                (Some(platform), spec) => spec.matches(platform),
                (None, _) => false,
            })
    }

    /// Pick the manifest for `requested`, applying this resolver's mode when
    /// nothing matches.
    pub fn resolve(
        &self,
        image: &MultiPlatformImage,
        requested: &PlatformSpec,
    ) -> Result<Resolution, PlatformNotFoundError> {
        if let Some(manifest) = Self::find(image, requested) {
            tracing::debug!(
                platform = %requested,
                digest = %manifest.digest,
                "resolved platform manifest"
            );
            return Ok(Resolution::Manifest(manifest.clone()));
        }

        match self.mode {
            ResolverMode::ReportUpToDate => {
                tracing::debug!(
                    platform = %requested,
                    "platform missing, reporting image as up to date"
                );
                Ok(Resolution::UpToDate)
            }
            ResolverMode::Strict => Err(PlatformNotFoundError::new(requested, image)),
        }
    }
}

/// Strict resolution: the matching manifest or [`PlatformNotFoundError`].
pub fn resolve(
    image: &MultiPlatformImage,
    requested: &PlatformSpec,
) -> Result<ManifestDescriptor, PlatformNotFoundError> {
    PlatformResolver::find(image, requested)
        .cloned()
        .ok_or_else(|| PlatformNotFoundError::new(requested, image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::manifest::ManifestDescriptor;

    fn linux(
        digest: &str,
        arch: &str,
        variant: Option<&str>,
        available: bool,
    ) -> ManifestDescriptor {
        ManifestDescriptor::image(digest, Platform::new("linux", arch, variant), available)
    }

    fn partially_available() -> MultiPlatformImage {
        MultiPlatformImage::new(
            "sha256:index",
            vec![
                linux("sha256:amd64", "amd64", None, true),
                linux("sha256:arm64", "arm64", Some("v8"), true),
                linux("sha256:armv7", "arm", Some("v7"), false),
                ManifestDescriptor::attestation("sha256:att", true),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_exact_match() {
        let image = partially_available();
        let spec = PlatformSpec::parse("linux/amd64").unwrap();
        assert_eq!(resolve(&image, &spec).unwrap().digest, "sha256:amd64");
    }

    #[test]
    fn test_variant_optional_and_normalized() {
        let image = partially_available();
        let no_variant = PlatformSpec::parse("linux/arm64").unwrap();
        assert_eq!(resolve(&image, &no_variant).unwrap().digest, "sha256:arm64");
        let aarch64 = PlatformSpec::exact("linux", "aarch64", Some("v8"));
        assert_eq!(resolve(&image, &aarch64).unwrap().digest, "sha256:arm64");
        let wrong_variant = PlatformSpec::parse("linux/arm64/v9").unwrap();
        assert!(resolve(&image, &wrong_variant).is_err());
    }

    #[test]
    fn test_unavailable_platform_fails_in_strict_mode() {
        let image = partially_available();
        let spec = PlatformSpec::parse("linux/arm/v7").unwrap();
        let err = resolve(&image, &spec).unwrap_err();
        assert_eq!(err.requested, spec);
        assert_eq!(err.available, vec!["linux/amd64", "linux/arm64/v8"]);
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_unavailable_platform_up_to_date_mode() {
        let image = partially_available();
        let resolver = PlatformResolver::new(ResolverMode::ReportUpToDate);
        let spec = PlatformSpec::parse("linux/arm/v7").unwrap();
        assert_eq!(resolver.resolve(&image, &spec).unwrap(), Resolution::UpToDate);
        let present = PlatformSpec::parse("linux/amd64").unwrap();
        assert_eq!(
            resolver.resolve(&image, &present).unwrap().manifest().map(|m| m.digest.as_str()),
            Some("sha256:amd64")
        );
    }

    #[test]
    fn test_platform_absent_from_index() {
        let image = partially_available();
        let s390x = PlatformSpec::exact("linux", "s390x", None);

        let err = PlatformResolver::new(ResolverMode::Strict)
            .resolve(&image, &s390x)
            .unwrap_err();
        assert_eq!(err.requested, s390x);
        assert_eq!(err.index_digest, "sha256:index");
        assert!(err.to_string().contains("linux/s390x not found"));
        assert_eq!(resolve(&image, &s390x).unwrap_err(), err);

        let resolver = PlatformResolver::new(ResolverMode::ReportUpToDate);
        assert_eq!(resolver.resolve(&image, &s390x).unwrap(), Resolution::UpToDate);
    }

    #[test]
    fn test_any_is_first_available_image() {
        let image = MultiPlatformImage::new(
            "sha256:index",
            vec![
                ManifestDescriptor::attestation("sha256:att", true),
                linux("sha256:s390x", "s390x", None, false),
                linux("sha256:arm64", "arm64", None, true),
                linux("sha256:amd64", "amd64", None, true),
            ],
        )
        .unwrap();
        for _ in 0..3 {
            assert_eq!(resolve(&image, &PlatformSpec::Any).unwrap().digest, "sha256:arm64");
        }
    }

    #[test]
    fn test_any_without_available_manifest() {
        let amd64 = linux("sha256:amd64", "amd64", None, false);
        let image = MultiPlatformImage::new("sha256:index", vec![amd64]).unwrap();
        assert!(resolve(&image, &PlatformSpec::Any).is_err());
    }

    #[test]
    fn test_parse_platform_spec() {
        assert_eq!(PlatformSpec::parse("any").unwrap(), PlatformSpec::Any);
        assert_eq!(
            PlatformSpec::parse("linux/arm/v7").unwrap(),
            PlatformSpec::exact("linux", "arm", Some("v7"))
        );
        assert_eq!(
            PlatformSpec::parse("linux"),
            Err(InvalidPlatformError::Format("linux".to_string()))
        );
        assert_eq!(
            PlatformSpec::parse("linux//v7"),
            Err(InvalidPlatformError::EmptyComponent("linux//v7".to_string()))
        );
        assert!(matches!(PlatformSpec::parse("a/b/c/d"), Err(InvalidPlatformError::Format(_))));
    }

    #[test]
    fn test_parse_resolver_mode() {
        assert_eq!("up-to-date".parse::<ResolverMode>().unwrap(), ResolverMode::ReportUpToDate);
        assert_eq!("Strict".parse::<ResolverMode>().unwrap(), ResolverMode::Strict);
        let err = "lenient".parse::<ResolverMode>().unwrap_err();
        assert_eq!(err, InvalidPlatformError::UnknownMode("lenient".to_string()));
        assert_eq!(err.to_string(), "unknown platform fallback mode 'lenient'");
    }
}
