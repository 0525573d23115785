//! Manifest set reconciliation
//!
//! Compares the manifests on two sides of a transfer (local store vs. remote
//! registry) as sets keyed by digest. Transfer order and duplicate-content
//! elision do not affect the result.

use crate::image::manifest::{ManifestDescriptor, MultiPlatformImage};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcileResult {
    pub digests_match: bool,
    pub only_in_a: BTreeSet<String>,
    pub only_in_b: BTreeSet<String>,
    /// Digests referenced on either side whose content is not materialized
    pub unavailable: BTreeSet<String>,
}

impl ReconcileResult {
    /// Both sides hold the same manifests and all of them are materialized.
    pub fn is_identical(&self) -> bool {
        self.digests_match && self.unavailable.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Compare image manifests only, skipping attestation and unknown kinds
    pub images_only: bool,
}

/// Compare two descriptor collections by digest.
pub fn compare(a: &[ManifestDescriptor], b: &[ManifestDescriptor]) -> ReconcileResult {
    compare_with(a, b, ReconcileOptions::default())
}

pub fn compare_with(
    a: &[ManifestDescriptor],
    b: &[ManifestDescriptor],
    options: ReconcileOptions,
) -> ReconcileResult {
    let keep = |m: &&ManifestDescriptor| !options.images_only || m.is_image();

    let digests_a: BTreeSet<String> = a.iter().filter(keep).map(|m| m.digest.clone()).collect();
    let digests_b: BTreeSet<String> = b.iter().filter(keep).map(|m| m.digest.clone()).collect();

    let only_in_a: BTreeSet<String> = digests_a.difference(&digests_b).cloned().collect();
    let only_in_b: BTreeSet<String> = digests_b.difference(&digests_a).cloned().collect();
    let unavailable: BTreeSet<String> = a
        .iter()
        .chain(b.iter())
        .filter(keep)
        .filter(|m| !m.available)
        .map(|m| m.digest.clone())
        .collect();

    ReconcileResult {
        digests_match: only_in_a.is_empty() && only_in_b.is_empty(),
        only_in_a,
        only_in_b,
        unavailable,
    }
}

/// Reconciliation of two whole images
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageComparison {
    pub index_match: bool,
    pub manifests: ReconcileResult,
}

impl ImageComparison {
    pub fn is_identical(&self) -> bool {
        self.index_match && self.manifests.is_identical()
    }
}

/// Compare two images: index digests and their manifest sets.
pub fn compare_images(
    a: &MultiPlatformImage,
    b: &MultiPlatformImage,
    options: ReconcileOptions,
) -> ImageComparison {
    ImageComparison {
        index_match: a.index_digest() == b.index_digest(),
        manifests: compare_with(a.manifests(), b.manifests(), options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::manifest::Platform;
    use proptest::prelude::*;

    fn image(digest: &str, available: bool) -> ManifestDescriptor {
        ManifestDescriptor::image(digest, Platform::new("linux", "amd64", None), available)
    }

    #[test]
    fn test_reordered_sets_match() {
        let (d1, d2, d3) = (
            image("sha256:1", true),
            image("sha256:2", true),
            image("sha256:3", true),
        );
        let result = compare(
            &[d1.clone(), d2.clone(), d3.clone()],
            &[d3, d1, d2],
        );
        assert!(result.digests_match);
        assert!(result.only_in_a.is_empty());
        assert!(result.only_in_b.is_empty());
        assert!(result.is_identical());
    }

    #[test]
    fn test_differences_and_unavailable() {
        let a = [image("sha256:1", true), image("sha256:2", false)];
        let b = [image("sha256:2", true), image("sha256:3", true)];
        let result = compare(&a, &b);
        assert!(!result.digests_match);
        assert_eq!(result.only_in_a, BTreeSet::from(["sha256:1".to_string()]));
        assert_eq!(result.only_in_b, BTreeSet::from(["sha256:3".to_string()]));
        assert_eq!(result.unavailable, BTreeSet::from(["sha256:2".to_string()]));
    }

    #[test]
    fn test_matching_but_unavailable_is_not_identical() {
        let a = [image("sha256:1", true)];
        let b = [image("sha256:1", false)];
        let result = compare(&a, &b);
        assert!(result.digests_match);
        assert!(!result.is_identical());
    }

    #[test]
    fn test_images_only_skips_attestations() {
        let a = [image("sha256:1", true), ManifestDescriptor::attestation("sha256:att", false)];
        let b = [image("sha256:1", true)];
        assert!(!compare(&a, &b).is_identical());
        let result = compare_with(&a, &b, ReconcileOptions { images_only: true });
        assert!(result.is_identical());
    }

    #[test]
    fn test_compare_images_checks_index() {
        let a = MultiPlatformImage::from_manifests(vec![image("sha256:1", true)]).unwrap();
        let b = MultiPlatformImage::new("sha256:other", vec![image("sha256:1", true)]).unwrap();
        let comparison = compare_images(&a, &b, ReconcileOptions::default());
        assert!(comparison.manifests.is_identical());
        assert!(!comparison.is_identical());
    }

    fn descriptors() -> impl Strategy<Value = Vec<ManifestDescriptor>> {
        prop::collection::vec((0u8..12, any::<bool>()), 0..10).prop_map(|entries| {
            entries
                .into_iter()
                .map(|(n, available)| image(&format!("sha256:{:02x}", n), available))
                .collect()
        })
    }

    type Shuffled = (Vec<ManifestDescriptor>, Vec<ManifestDescriptor>);

    fn with_shuffled(v: Vec<ManifestDescriptor>) -> impl Strategy<Value = Shuffled> {
        (Just(v.clone()), Just(v).prop_shuffle())
    }

    proptest! {
        #[test]
        fn prop_compare_is_order_independent(
            (a, shuffled_a) in descriptors().prop_flat_map(with_shuffled),
            (b, shuffled_b) in descriptors().prop_flat_map(with_shuffled),
        ) {
            prop_assert_eq!(compare(&a, &b), compare(&shuffled_a, &shuffled_b));
        }
    }
}
