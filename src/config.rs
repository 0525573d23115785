//! Configuration for the transfer client
//!
//! Values come from code or from the environment:
//!
//! | Variable                     | Meaning                                   |
//! |------------------------------|-------------------------------------------|
//! | `REGISTRY_INSECURE_HOSTS`    | comma separated hosts reached without TLS |
//! | `REGISTRY_PLATFORM_FALLBACK` | `strict` or `up-to-date`                  |
//! | `REGISTRY_EVENT_BUFFER`      | status event channel capacity             |
//! | `REGISTRY_DEFAULT_TAG`       | tag applied to unqualified references     |
//! | `REGISTRY_VERIFY_ALL_KINDS`  | `true` to include attestations in checks  |

use crate::error::{Error, Result};
use crate::image::ResolverMode;
use crate::registry::executor::DEFAULT_EVENT_BUFFER;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub insecure_hosts: Vec<String>,
    pub platform_fallback: ResolverMode,
    pub event_buffer: usize,
    pub default_tag: Option<String>,
    /// Compare only image manifests when verifying a transfer
    pub verify_images_only: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            insecure_hosts: Vec::new(),
            platform_fallback: ResolverMode::Strict,
            event_buffer: DEFAULT_EVENT_BUFFER,
            default_tag: None,
            verify_images_only: true,
        }
    }
}

impl TransferConfig {
    /// Defaults overridden by whatever `REGISTRY_*` variables are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(hosts) = lookup("REGISTRY_INSECURE_HOSTS") {
            config.insecure_hosts = hosts
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(mode) = lookup("REGISTRY_PLATFORM_FALLBACK") {
            config.platform_fallback = mode
                .parse::<ResolverMode>()
                .map_err(|e| Error::Configuration(format!("REGISTRY_PLATFORM_FALLBACK: {}", e)))?;
        }
        if let Some(buffer) = lookup("REGISTRY_EVENT_BUFFER") {
            config.event_buffer = match buffer.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(Error::Configuration(format!(
                        "REGISTRY_EVENT_BUFFER must be a positive integer, got '{}'",
                        buffer
                    )));
                }
            };
        }
        if let Some(tag) = lookup("REGISTRY_DEFAULT_TAG") {
            let tag = tag.trim();
            config.default_tag = (!tag.is_empty()).then(|| tag.to_string());
        }
        if let Some(all) = lookup("REGISTRY_VERIFY_ALL_KINDS") {
            config.verify_images_only = !matches!(all.trim(), "true" | "1" | "yes");
        }

        Ok(config)
    }
}
