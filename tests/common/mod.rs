//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use registry_transfer::image::{
    ImageReference, ManifestDescriptor, MultiPlatformImage, Platform, PlatformSpec,
};
use registry_transfer::registry::{
    Direction, RegistryInventory, TransferOptions, TransferStream, Transport,
};
use registry_transfer::TransportError;
use serde_json::json;
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncWriteExt, DuplexStream};

pub fn reference(text: &str) -> ImageReference {
    ImageReference::parse(text).unwrap()
}

pub fn frames_to_bytes(frames: &[serde_json::Value]) -> Vec<u8> {
    frames.iter().map(|f| format!("{}\r\n", f)).collect::<String>().into_bytes()
}

/// Registry that remembers which layers it holds and answers pushes the way
/// the Docker engine reports them.
pub struct FakeRegistry {
    layers: Vec<String>,
    present: Mutex<HashSet<String>>,
    starts: AtomicUsize,
    seen_platforms: Mutex<Vec<Option<PlatformSpec>>>,
}

impl FakeRegistry {
    pub fn new(layers: &[&str]) -> Self {
        Self {
            layers: layers.iter().map(|l| l.to_string()).collect(),
            present: Mutex::new(HashSet::new()),
            starts: AtomicUsize::new(0),
            seen_platforms: Mutex::new(Vec::new()),
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn seen_platforms(&self) -> Vec<Option<PlatformSpec>> {
        self.seen_platforms.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeRegistry {
    async fn start_transfer(
        &self,
        direction: Direction,
        reference: &ImageReference,
        options: &TransferOptions,
    ) -> Result<TransferStream, TransportError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.seen_platforms.lock().unwrap().push(options.platform.clone());

        let mut present = self.present.lock().unwrap();
        let mut frames = Vec::new();
        match direction {
            Direction::Push => {
                let repository = format!("{}/{}", reference.host(), reference.repository());
                frames.push(json!({
                    "status": format!("The push refers to repository [{}]", repository)
                }));
                for layer in &self.layers {
                    frames.push(json!({"status": "Preparing", "progressDetail": {}, "id": layer}));
                }
                for layer in &self.layers {
                    if present.contains(layer) {
                        frames.push(json!({
                            "status": "Layer already exists",
                            "progressDetail": {},
                            "id": layer
                        }));
                    } else {
                        frames.push(json!({
                            "status": "Pushing",
                            "progressDetail": {"current": 512, "total": 1024},
                            "progress": "[=========>        ]     512B/1.024kB",
                            "id": layer
                        }));
                        frames.push(json!({"status": "Pushed", "progressDetail": {}, "id": layer}));
                        present.insert(layer.clone());
                    }
                }
                let tag = reference.tag().unwrap_or("latest");
                let digest = format!("sha256:{}", "f".repeat(64));
                frames.push(json!({
                    "status": format!("{}: digest: {} size: 527", tag, digest)
                }));
                frames.push(json!({
                    "progressDetail": {},
                    "aux": {"Tag": tag, "Digest": digest, "Size": 527}
                }));
            }
            Direction::Pull => {
                frames.push(json!({
                    "status": format!("Pulling from {}", reference.repository()),
                    "id": reference.tag().unwrap_or("latest")
                }));
                for layer in &self.layers {
                    frames.push(json!({
                        "status": "Pull complete",
                        "progressDetail": {},
                        "id": layer
                    }));
                }
                frames.push(json!({
                    "status": format!("Status: Downloaded newer image for {}", reference)
                }));
            }
        }

        Ok(Box::new(Cursor::new(frames_to_bytes(&frames))))
    }
}

/// Transport that replays a fixed byte stream
pub struct ScriptedTransport(pub Vec<u8>);

#[async_trait]
impl Transport for ScriptedTransport {
    async fn start_transfer(
        &self,
        _direction: Direction,
        _reference: &ImageReference,
        _options: &TransferOptions,
    ) -> Result<TransferStream, TransportError> {
        Ok(Box::new(Cursor::new(self.0.clone())))
    }
}

/// Transport that writes a prefix and then keeps the stream open forever
pub struct StalledTransport {
    prefix: Vec<u8>,
    writers: tokio::sync::Mutex<Vec<DuplexStream>>,
}

impl StalledTransport {
    pub fn new(prefix: Vec<u8>) -> Self {
        Self {
            prefix,
            writers: tokio::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Transport for StalledTransport {
    async fn start_transfer(
        &self,
        _direction: Direction,
        _reference: &ImageReference,
        _options: &TransferOptions,
    ) -> Result<TransferStream, TransportError> {
        let (mut writer, reader) = tokio::io::duplex(64 * 1024);
        writer.write_all(&self.prefix).await?;
        self.writers.lock().await.push(writer);
        Ok(Box::new(reader))
    }
}

/// Transport whose transfers never begin
pub struct RefusingTransport;

#[async_trait]
impl Transport for RefusingTransport {
    async fn start_transfer(
        &self,
        _direction: Direction,
        _reference: &ImageReference,
        _options: &TransferOptions,
    ) -> Result<TransferStream, TransportError> {
        Err(TransportError::Unauthorized("invalid credentials".to_string()))
    }
}

/// Inventory returning one fixed image
pub struct FixedInventory(pub MultiPlatformImage);

#[async_trait]
impl RegistryInventory for FixedInventory {
    async fn list_manifests(
        &self,
        _reference: &ImageReference,
    ) -> Result<MultiPlatformImage, TransportError> {
        Ok(self.0.clone())
    }
}

/// busybox:1.37.0-glibc as held by a store that pulled only amd64 and arm64
pub fn partially_pulled_busybox() -> MultiPlatformImage {
    MultiPlatformImage::new(
        "sha256:210ce53959959e79523b8cb0f0bb1cf1c49bf9747cdedb47db1cf0db8e642f61",
        vec![
            ManifestDescriptor::image(
                "sha256:7c0ffe5751238c8479f952f3fbc3b719d47bccac0e9bf0a21c77a27cba9ef12d",
                Platform::new("linux", "amd64", None),
                true,
            ),
            ManifestDescriptor::image(
                "sha256:68a0d55a75c935e1101d16ded1c748babb7f96a9af43f7533ba83b87e2508b82",
                Platform::new("linux", "arm64", Some("v8")),
                true,
            ),
            ManifestDescriptor::image(
                "sha256:0b1a5e5e1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6",
                Platform::new("linux", "arm", Some("v7")),
                false,
            ),
        ],
    )
    .unwrap()
}
