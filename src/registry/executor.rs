//! Transfer execution
//!
//! One transfer is one coordinating future plus one decode task. The decode
//! task owns the status stream and forwards events through a single channel;
//! the coordinator consumes them while racing the cancellation token. A
//! cancelled transfer returns at once and leaves the decode task detached:
//! it ends when the transport closes the stream or when it notices the
//! channel is gone.

use crate::error::{TransferError, TransferScope};
use crate::image::ImageReference;
use crate::registry::cancel::CancellationToken;
use crate::registry::progress::{EventDecoder, FailureKind, TransferEvent};
use crate::registry::transport::{Direction, TransferOptions, Transport};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Status lines of a finished transfer, in the order they were reported
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferResult {
    lines: Vec<String>,
    digest: Option<String>,
    pushed: usize,
    already_exists: usize,
}

impl TransferResult {
    fn record(&mut self, event: &TransferEvent) {
        match event {
            TransferEvent::LayerPushed { .. } => self.pushed += 1,
            TransferEvent::LayerAlreadyExists { .. } => self.already_exists += 1,
            TransferEvent::Digest { digest, .. } => self.digest = Some(digest.clone()),
            _ => {}
        }
        if let Some(line) = event.status_line() {
            self.lines.push(line);
        }
    }

    /// Result of a pull that had nothing to fetch
    pub(crate) fn up_to_date(reference: &ImageReference) -> Self {
        Self {
            lines: vec![format!("Status: Image is up to date for {}", reference)],
            ..Self::default()
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// All lines joined with newlines, as a terminal would show them
    pub fn output(&self) -> String {
        self.lines.join("\n")
    }

    /// Manifest digest reported by the registry, if any
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Number of content units newly transferred
    pub fn pushed_count(&self) -> usize {
        self.pushed
    }

    /// Number of content units the destination already held
    pub fn already_exists_count(&self) -> usize {
        self.already_exists
    }
}

/// Runs push and pull operations through a [`Transport`].
#[derive(Clone)]
pub struct TransferExecutor {
    transport: Arc<dyn Transport>,
    event_buffer: usize,
}

impl TransferExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Capacity of the channel between the decode task and the coordinator
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub async fn execute(
        &self,
        direction: Direction,
        reference: &ImageReference,
        options: &TransferOptions,
        cancel: &CancellationToken,
    ) -> Result<TransferResult, TransferError> {
        let platform = options.platform.as_ref().map(ToString::to_string);
        let span = info_span!(
            "transfer",
            id = %Uuid::new_v4(),
            %direction,
            %reference,
            platform = platform.as_deref(),
        );
        self.run(direction, reference, options, cancel).instrument(span).await
    }

    async fn run(
        &self,
        direction: Direction,
        reference: &ImageReference,
        options: &TransferOptions,
        cancel: &CancellationToken,
    ) -> Result<TransferResult, TransferError> {
        let scope = TransferScope {
            direction,
            reference: reference.to_string(),
            platform: options.platform.clone(),
        };

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("cancelled before the transfer started");
                return Err(TransferError::Cancelled);
            }
            started = self.transport.start_transfer(direction, reference, options) => {
                started.map_err(|source| {
                    warn!(error = %source, "transport refused to start");
                    TransferError::Start { scope: scope.clone(), source }
                })?
            }
        };
        debug!("transfer started, decoding status stream");

        let (tx, mut rx) = mpsc::channel(self.event_buffer);
        // Dropping the handle detaches the task; it is never aborted.
        let _decoder = EventDecoder::new(stream).spawn(tx);

        let mut result = TransferResult::default();
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(lines = result.lines.len(), "transfer cancelled");
                    return Err(TransferError::Cancelled);
                }
                event = rx.recv() => event,
            };

            match event {
                Some(TransferEvent::Done) => break,
                Some(TransferEvent::Error { message, kind: FailureKind::Remote, id }) => {
                    warn!(layer = id.as_deref(), %message, "registry reported a failure");
                    return Err(TransferError::Remote { scope, layer: id, message });
                }
                Some(TransferEvent::Error { message, kind: FailureKind::Protocol, .. }) => {
                    error!(%message, "status stream could not be decoded");
                    return Err(TransferError::Protocol { scope, message });
                }
                Some(event) => result.record(&event),
                None => {
                    error!("status stream ended without a terminal event");
                    return Err(TransferError::Protocol {
                        scope,
                        message: "status stream ended without a terminal event".to_string(),
                    });
                }
            }
        }

        info!(
            pushed = result.pushed,
            already_exists = result.already_exists,
            digest = result.digest.as_deref(),
            "transfer complete"
        );
        Ok(result)
    }
}
