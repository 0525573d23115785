//! Registry client facade
//!
//! Wires the collaborators (transport, inventories, credentials) to the
//! transfer core. A pull that names a platform is resolved against the
//! remote inventory before anything is transferred, and a finished push can
//! be verified by reconciling the local and remote manifest sets.

use crate::config::TransferConfig;
use crate::digest::DigestUtils;
use crate::error::{Error, Result};
use crate::image::{
    ImageComparison, ImageReference, PlatformResolver, PlatformSpec, ReconcileOptions, Resolution,
    TlsPolicy, compare_images,
};
use crate::logging::Logger;
use crate::registry::cancel::CancellationToken;
use crate::registry::executor::{TransferExecutor, TransferResult};
use crate::registry::transport::{
    AnonymousCredentials, CredentialProvider, Direction, RegistryInventory, TransferOptions,
    Transport,
};
use std::sync::Arc;
use std::time::Instant;

pub struct RegistryClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    local_inventory: Option<Arc<dyn RegistryInventory>>,
    remote_inventory: Option<Arc<dyn RegistryInventory>>,
    credentials: Arc<dyn CredentialProvider>,
    config: TransferConfig,
    logger: Logger,
}

impl RegistryClientBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            local_inventory: None,
            remote_inventory: None,
            credentials: Arc::new(AnonymousCredentials),
            config: TransferConfig::default(),
            logger: Logger::default(),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Inventory of the store images are pushed from and pulled into
    pub fn with_local_inventory(mut self, inventory: Arc<dyn RegistryInventory>) -> Self {
        self.local_inventory = Some(inventory);
        self
    }

    /// Inventory of the registry side
    pub fn with_remote_inventory(mut self, inventory: Arc<dyn RegistryInventory>) -> Self {
        self.remote_inventory = Some(inventory);
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_config(mut self, config: TransferConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn build(self) -> Result<RegistryClient> {
        let transport = self
            .transport
            .ok_or_else(|| Error::Configuration("a transport is required".to_string()))?;
        let executor = TransferExecutor::new(transport).with_event_buffer(self.config.event_buffer);

        Ok(RegistryClient {
            executor,
            local_inventory: self.local_inventory,
            remote_inventory: self.remote_inventory,
            credentials: self.credentials,
            resolver: PlatformResolver::new(self.config.platform_fallback),
            config: self.config,
            logger: self.logger,
        })
    }
}

impl Default for RegistryClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RegistryClient {
    executor: TransferExecutor,
    local_inventory: Option<Arc<dyn RegistryInventory>>,
    remote_inventory: Option<Arc<dyn RegistryInventory>>,
    credentials: Arc<dyn CredentialProvider>,
    resolver: PlatformResolver,
    config: TransferConfig,
    logger: Logger,
}

impl RegistryClient {
    pub fn builder() -> RegistryClientBuilder {
        RegistryClientBuilder::new()
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Parse a reference, applying the configured default tag.
    pub fn parse_reference(&self, text: &str) -> Result<ImageReference> {
        let reference = ImageReference::parse(text)?;
        Ok(match &self.config.default_tag {
            Some(tag) => reference.with_default_tag(tag),
            None => reference,
        })
    }

    pub fn tls_policy(&self, reference: &ImageReference) -> TlsPolicy {
        TlsPolicy::for_host(reference.host(), &self.config.insecure_hosts)
    }

    fn options_for(
        &self,
        reference: &ImageReference,
        platform: Option<PlatformSpec>,
    ) -> TransferOptions {
        TransferOptions {
            platform,
            credentials: self.credentials.credentials(reference),
        }
    }

    /// Push `reference`, optionally restricted to one platform.
    pub async fn push(
        &self,
        reference: &ImageReference,
        platform: Option<PlatformSpec>,
        cancel: &CancellationToken,
    ) -> Result<TransferResult> {
        let options = self.options_for(reference, platform);
        self.transfer(Direction::Push, reference, &options, cancel).await
    }

    /// Pull `reference`.
    ///
    /// With a platform and a remote inventory the platform is resolved first:
    /// a strict resolver fails without starting a transfer, an up-to-date
    /// resolver returns an "up to date" result. `Any` is narrowed to the
    /// resolved manifest's platform so the transfer fetches exactly that one.
    pub async fn pull(
        &self,
        reference: &ImageReference,
        platform: Option<PlatformSpec>,
        cancel: &CancellationToken,
    ) -> Result<TransferResult> {
        let mut platform = platform;

        if let (Some(requested), Some(inventory)) = (platform.clone(), &self.remote_inventory) {
            let image = inventory.list_manifests(reference).await?;
            match self.resolver.resolve(&image, &requested)? {
                Resolution::UpToDate => {
                    self.logger.warning(&format!(
                        "{} is not held for {} in {}, reporting image as up to date",
                        requested,
                        reference,
                        DigestUtils::short(image.index_digest())
                    ));
                    return Ok(TransferResult::up_to_date(reference));
                }
                Resolution::Manifest(manifest) => {
                    self.logger.detail(&format!(
                        "{} resolves to manifest {}",
                        requested,
                        DigestUtils::short(&manifest.digest)
                    ));
                    if requested == PlatformSpec::Any {
                        platform = manifest.platform.map(PlatformSpec::Exact);
                    }
                }
            }
        }

        let options = self.options_for(reference, platform);
        self.transfer(Direction::Pull, reference, &options, cancel).await
    }

    async fn transfer(
        &self,
        direction: Direction,
        reference: &ImageReference,
        options: &TransferOptions,
        cancel: &CancellationToken,
    ) -> Result<TransferResult> {
        self.logger.detail(&format!(
            "{} {} over {}",
            direction,
            reference,
            match self.tls_policy(reference) {
                TlsPolicy::Enabled => "TLS",
                TlsPolicy::Disabled => "plain HTTP",
            }
        ));

        let started = Instant::now();
        match self.executor.execute(direction, reference, options, cancel).await {
            Ok(result) => {
                self.logger.success(&format!(
                    "{} of {} finished in {}: {} transferred, {} already present",
                    direction,
                    reference,
                    self.logger.format_duration(started.elapsed()),
                    result.pushed_count(),
                    result.already_exists_count()
                ));
                Ok(result)
            }
            Err(e) if e.is_cancelled() => {
                self.logger.info(&format!("{} of {} cancelled", direction, reference));
                Err(e.into())
            }
            Err(e) => {
                self.logger.error(&e.to_string());
                Err(e.into())
            }
        }
    }

    /// Reconcile the local and remote manifest sets of `reference`.
    pub async fn verify(&self, reference: &ImageReference) -> Result<ImageComparison> {
        let (Some(local), Some(remote)) = (&self.local_inventory, &self.remote_inventory) else {
            return Err(Error::Configuration(
                "verification needs both a local and a remote inventory".to_string(),
            ));
        };

        let (local_image, remote_image) =
            tokio::try_join!(local.list_manifests(reference), remote.list_manifests(reference))?;
        let comparison = compare_images(
            &local_image,
            &remote_image,
            ReconcileOptions {
                images_only: self.config.verify_images_only,
            },
        );

        if comparison.is_identical() {
            self.logger.success(&format!("{} is identical on both sides", reference));
        } else {
            let mut items: Vec<String> = Vec::new();
            if !comparison.index_match {
                items.push(format!(
                    "index digest {} vs {}",
                    DigestUtils::short(local_image.index_digest()),
                    DigestUtils::short(remote_image.index_digest())
                ));
            }
            let manifests = &comparison.manifests;
            items.extend(manifests.only_in_a.iter().map(|d| format!("only local: {}", d)));
            items.extend(manifests.only_in_b.iter().map(|d| format!("only remote: {}", d)));
            items.extend(manifests.unavailable.iter().map(|d| format!("unavailable: {}", d)));
            self.logger.summary(&format!("{} differs", reference), &items);
        }

        Ok(comparison)
    }
}
