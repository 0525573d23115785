//! Decoding of transfer status streams
//!
//! A running push or pull reports progress as consecutive JSON frames in the
//! Docker `jsonmessage` shape:
//!
//! ```text
//! {"status":"Preparing","progressDetail":{},"id":"a1b2c3"}
//! {"status":"Layer already exists","progressDetail":{},"id":"a1b2c3"}
//! {"errorDetail":{"message":"disk full"},"error":"disk full"}
//! ```
//!
//! [`EventDecoder`] turns those bytes into [`TransferEvent`]s. Frames may be
//! split across reads and need not be newline separated. The sequence ends
//! after exactly one terminal event: `Error` for a failure frame or an
//! undecodable stream, `Done` for a clean end of input.

use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Status the registry reports for content it already holds
pub const STATUS_LAYER_EXISTS: &str = "Layer already exists";
/// Status the registry reports once new content is stored
pub const STATUS_PUSHED: &str = "Pushed";

const READ_CHUNK: usize = 8 * 1024;

/// Where a terminal error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The registry or daemon reported the failure in an error frame
    Remote,
    /// The stream itself was unreadable or malformed
    Protocol,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Progress { id: Option<String>, status: String },
    LayerAlreadyExists { id: String },
    LayerPushed { id: String },
    /// Manifest digest reported after a push completes
    Digest { tag: Option<String>, digest: String, size: Option<u64> },
    Error { message: String, kind: FailureKind, id: Option<String> },
    Done,
}

impl TransferEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferEvent::Error { .. } | TransferEvent::Done)
    }

    /// Human-readable line for events that carry a status.
    pub fn status_line(&self) -> Option<String> {
        match self {
            TransferEvent::Progress { id: Some(id), status } => Some(format!("{}: {}", id, status)),
            TransferEvent::Progress { id: None, status } => Some(status.clone()),
            TransferEvent::LayerAlreadyExists { id } => {
                Some(format!("{}: {}", id, STATUS_LAYER_EXISTS))
            }
            TransferEvent::LayerPushed { id } => Some(format!("{}: {}", id, STATUS_PUSHED)),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct JsonMessage {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default, rename = "errorDetail")]
    error_detail: Option<ErrorDetail>,
    #[serde(default)]
    aux: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PushResult {
    #[serde(rename = "Tag", default)]
    tag: Option<String>,
    #[serde(rename = "Digest")]
    digest: String,
    #[serde(rename = "Size", default)]
    size: Option<u64>,
}

impl JsonMessage {
    /// Map one frame to an event; `None` for frames with nothing to report.
    fn into_event(self) -> Option<TransferEvent> {
        let id = self.id.filter(|id| !id.is_empty());

        let detail_message = self.error_detail.and_then(|d| d.message).filter(|m| !m.is_empty());
        if let Some(message) = detail_message.or(self.error) {
            return Some(TransferEvent::Error {
                message,
                kind: FailureKind::Remote,
                id,
            });
        }

        if let Some(aux) = self.aux {
            if let Ok(result) = serde_json::from_value::<PushResult>(aux) {
                return Some(TransferEvent::Digest {
                    tag: result.tag,
                    digest: result.digest,
                    size: result.size,
                });
            }
        }

        let status = self.status.filter(|s| !s.is_empty())?;
        Some(match id {
            Some(id) if status == STATUS_LAYER_EXISTS => TransferEvent::LayerAlreadyExists { id },
            Some(id) if status == STATUS_PUSHED => TransferEvent::LayerPushed { id },
            id => TransferEvent::Progress { id, status },
        })
    }
}

/// Locates the end of one JSON object frame across reads.
///
/// Bytes already scanned are never looked at again, so a frame arriving in
/// many small reads is scanned once in total.
#[derive(Debug, Default)]
struct FrameScanner {
    pos: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl FrameScanner {
    /// Length of the frame at the start of `buf`, once its closing brace has
    /// arrived.
    fn advance(&mut self, buf: &[u8]) -> Option<usize> {
        while let Some(&byte) = buf.get(self.pos) {
            self.pos += 1;
            if self.in_string {
                match byte {
                    _ if self.escaped => self.escaped = false,
                    b'\\' => self.escaped = true,
                    b'"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }
            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return Some(self.pos);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// Incremental decoder over a status byte stream. Not restartable: once a
/// terminal event has been produced every further call yields `None`.
pub struct EventDecoder<R> {
    reader: R,
    buf: Vec<u8>,
    scanner: FrameScanner,
    eof: bool,
    finished: bool,
}

impl<R> EventDecoder<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(READ_CHUNK),
            scanner: FrameScanner::default(),
            eof: false,
            finished: false,
        }
    }

    /// Next event, or `None` after the terminal event.
    pub async fn next_event(&mut self) -> Option<TransferEvent> {
        loop {
            if self.finished {
                return None;
            }

            if self.scanner.pos == 0 {
                let start = self
                    .buf
                    .iter()
                    .position(|b| !b.is_ascii_whitespace())
                    .unwrap_or(self.buf.len());
                self.buf.drain(..start);
            }

            if !self.buf.is_empty() {
                // Anything but an object is malformed; hand it to serde whole
                // for the error message.
                let frame_len = if self.buf[0] == b'{' {
                    self.scanner.advance(&self.buf)
                } else {
                    Some(self.buf.len())
                };

                match frame_len {
                    Some(len) => {
                        let parsed = serde_json::from_slice::<JsonMessage>(&self.buf[..len]);
                        self.buf.drain(..len);
                        self.scanner = FrameScanner::default();
                        match parsed {
                            Ok(message) => {
                                trace!(?message, "decoded status frame");
                                if let Some(event) = message.into_event() {
                                    return Some(self.emit(event));
                                }
                                continue;
                            }
                            Err(e) => {
                                return Some(self.emit(protocol_error(format!(
                                    "malformed status frame: {}",
                                    e
                                ))));
                            }
                        }
                    }
                    None if self.eof => {
                        return Some(self.emit(protocol_error(format!(
                            "status stream ended inside a frame ({} bytes pending)",
                            self.buf.len()
                        ))));
                    }
                    // Frame split across reads.
                    None => {}
                }
            } else if self.eof {
                return Some(self.emit(TransferEvent::Done));
            }

            let mut chunk = [0u8; READ_CHUNK];
            match self.reader.read(&mut chunk).await {
                Ok(0) => self.eof = true,
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    return Some(self.emit(protocol_error(format!("reading status stream: {}", e))));
                }
            }
        }
    }

    fn emit(&mut self, event: TransferEvent) -> TransferEvent {
        if event.is_terminal() {
            self.finished = true;
        }
        event
    }

    /// Lazy, finite sequence of events ending with the terminal one.
    pub fn into_stream(self) -> impl Stream<Item = TransferEvent> {
        stream::unfold(self, |mut decoder| async move {
            decoder.next_event().await.map(|event| (event, decoder))
        })
    }
}

impl<R> EventDecoder<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Decode on a dedicated task, forwarding events in frame order.
    ///
    /// The task stops after the terminal event or as soon as the receiving
    /// side is gone.
    pub fn spawn(self, tx: mpsc::Sender<TransferEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut events = std::pin::pin!(self.into_stream());
            while let Some(event) = events.next().await {
                if tx.send(event).await.is_err() {
                    debug!("event receiver dropped, abandoning status stream");
                    break;
                }
            }
        })
    }
}

fn protocol_error(message: String) -> TransferEvent {
    TransferEvent::Error {
        message,
        kind: FailureKind::Protocol,
        id: None,
    }
}
