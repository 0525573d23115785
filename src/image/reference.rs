//! Image reference parsing and transport policy
//!
//! A reference names a repository on a registry host, optionally qualified by
//! a tag or a digest:
//!
//! - `localhost:5000/busybox:1.37.0-musl`
//! - `registry.example.com/team/app@sha256:...`
//! - `localhost:5000/ghcr.io/containerd/busybox:1.36` (the repository keeps the
//!   upstream registry prefix)
//!
//! Unlike the Docker CLI, nothing is inferred: the host is always the first
//! path component and a missing tag stays missing.

use crate::digest::DigestUtils;
use crate::error::InvalidReferenceError;
use std::fmt;
use url::Url;

/// Hosts that are reached without TLS unless configured otherwise
const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1", "[::1]"];

/// A parsed registry image reference. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    host: String,
    repository: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageReference {
    /// Parse `host/repository[:tag][@digest]`.
    ///
    /// When both a tag and a digest are given the digest wins and the tag is
    /// dropped, so a parsed reference never carries two qualifiers.
    pub fn parse(text: &str) -> Result<Self, InvalidReferenceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(InvalidReferenceError::new(text, "reference is empty"));
        }

        let (host, remainder) = text
            .split_once('/')
            .ok_or_else(|| {
                InvalidReferenceError::new(text, "missing '/' between host and repository")
            })?;
        if host.is_empty() {
            return Err(InvalidReferenceError::new(text, "host is empty"));
        }

        let (name, digest) = match remainder.split_once('@') {
            Some((name, digest)) => {
                if !DigestUtils::is_valid_digest(digest) {
                    return Err(InvalidReferenceError::new(
                        text,
                        format!("malformed digest '{}'", digest),
                    ));
                }
                (name, Some(digest.to_string()))
            }
            None => (remainder, None),
        };

        // A tag colon can only follow the last path separator.
        let last_slash = name.rfind('/').map(|pos| pos + 1).unwrap_or(0);
        let (repository, tag) = match name[last_slash..].rfind(':') {
            Some(pos) => {
                let colon = last_slash + pos;
                let tag = &name[colon + 1..];
                if tag.is_empty() {
                    return Err(InvalidReferenceError::new(text, "tag is empty"));
                }
                (&name[..colon], Some(tag.to_string()))
            }
            None => (name, None),
        };

        if repository.is_empty() {
            return Err(InvalidReferenceError::new(text, "repository path is empty"));
        }
        if repository.split('/').any(str::is_empty) {
            return Err(InvalidReferenceError::new(
                text,
                "repository path contains an empty component",
            ));
        }

        Ok(Self {
            host: host.to_string(),
            repository: repository.to_string(),
            tag: if digest.is_some() { None } else { tag },
            digest,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// True when a tag or digest names a concrete image rather than the
    /// whole repository.
    pub fn is_qualified(&self) -> bool {
        self.tag.is_some() || self.digest.is_some()
    }

    /// Copy of this reference carrying `tag` when it has no qualifier yet.
    pub fn with_default_tag(&self, tag: &str) -> Self {
        if self.is_qualified() {
            return self.clone();
        }
        Self {
            tag: Some(tag.to_string()),
            ..self.clone()
        }
    }

    /// Base URL of the registry API for this reference.
    pub fn registry_url(&self, policy: TlsPolicy) -> Result<Url, InvalidReferenceError> {
        let scheme = match policy {
            TlsPolicy::Enabled => "https",
            TlsPolicy::Disabled => "http",
        };
        Url::parse(&format!("{}://{}/v2/", scheme, self.host)).map_err(|e| {
            InvalidReferenceError::new(&self.to_string(), format!("invalid registry host: {}", e))
        })
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ImageReference {
    type Err = InvalidReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Whether the registry is reached over TLS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsPolicy {
    Enabled,
    Disabled,
}

impl TlsPolicy {
    /// Default policy for `host`: loopback registries and configured insecure
    /// hosts are plain HTTP, everything else uses TLS. A port suffix is
    /// ignored when matching loopback names.
    pub fn for_host<S: AsRef<str>>(host: &str, insecure_hosts: &[S]) -> Self {
        if insecure_hosts.iter().any(|h| h.as_ref() == host) {
            return TlsPolicy::Disabled;
        }
        let bare = strip_port(host);
        if LOOPBACK_HOSTS.contains(&bare) {
            TlsPolicy::Disabled
        } else {
            TlsPolicy::Enabled
        }
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // [::1]:5000
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}
