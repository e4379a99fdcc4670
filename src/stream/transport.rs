//! Inbound frame sources.
//!
//! A source yields raw frames and finally a close reason. `pump` decodes each
//! frame in wire order (waiting for blob reads to finish before looking at the
//! next frame) and forwards the result to the session.

use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::decode::{decode_frame, InboundFrame};
use super::session::{CloseReason, SessionEvent};

/// Close code used when a peer closes without a status.
const NO_STATUS_RECEIVED: u16 = 1005;
const NORMAL_CLOSURE: u16 = 1000;

#[derive(Debug)]
pub enum SourceEvent {
    Frame(InboundFrame),
    Closed(CloseReason),
}

/// Something that delivers frames until it closes.
pub trait FrameSource {
    fn next_event(&mut self) -> impl Future<Output = SourceEvent> + Send;
}

/// Decodes frames from `source` and forwards them until the source closes or
/// the session goes away.
pub async fn pump<S: FrameSource>(mut source: S, events: mpsc::UnboundedSender<SessionEvent>) {
    let mut dropped = 0u64;
    loop {
        match source.next_event().await {
            SourceEvent::Frame(frame) => match decode_frame(frame).await {
                Ok(samples) => {
                    if events.send(SessionEvent::FrameArrived(samples)).is_err() {
                        tracing::debug!("Session gone, stopping transport");
                        return;
                    }
                }
                Err(e) => {
                    dropped += 1;
                    tracing::warn!("Dropping inbound frame: {e}");
                }
            },
            SourceEvent::Closed(reason) => {
                if dropped > 0 {
                    tracing::info!("{dropped} undecodable frame(s) dropped during this stream");
                }
                let _ = events.send(SessionEvent::StreamClosed(reason));
                return;
            }
        }
    }
}

/// Live chunks from a WebSocket endpoint.
pub struct WebSocketSource {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketSource {
    /// Connects to `url`, e.g. `ws://127.0.0.1:8000/audio`.
    ///
    /// # Errors
    /// - If the TCP connection or WebSocket handshake fails
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to {url}: {e}"))?;
        tracing::info!("Connected to {} (HTTP {})", url, response.status());
        Ok(Self { stream })
    }
}

impl FrameSource for WebSocketSource {
    async fn next_event(&mut self) -> SourceEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(message)) => {
                    if let Some(event) = classify(message) {
                        return event;
                    }
                }
                Some(Err(e)) => return SourceEvent::Closed(CloseReason::Unexpected(e.to_string())),
                None => {
                    return SourceEvent::Closed(CloseReason::Unexpected(
                        "connection ended without a close frame".to_string(),
                    ))
                }
            }
        }
    }
}

/// Maps a WebSocket message to a source event; control messages yield nothing.
fn classify(message: Message) -> Option<SourceEvent> {
    match message {
        Message::Binary(bytes) => Some(SourceEvent::Frame(InboundFrame::Binary(bytes))),
        Message::Text(_) => Some(SourceEvent::Frame(InboundFrame::Other("text"))),
        Message::Frame(_) => Some(SourceEvent::Frame(InboundFrame::Other("raw frame"))),
        Message::Ping(_) | Message::Pong(_) => None,
        Message::Close(frame) => {
            let reason = match frame {
                Some(frame) => CloseReason::Clean {
                    code: u16::from(frame.code),
                    reason: frame.reason.into_owned(),
                },
                None => CloseReason::Clean {
                    code: NO_STATUS_RECEIVED,
                    reason: String::new(),
                },
            };
            Some(SourceEvent::Closed(reason))
        }
    }
}

/// Replays a capture of raw little-endian `f32` samples as blob frames at a
/// fixed rate.
pub struct ReplaySource {
    path: PathBuf,
    chunk_bytes: u64,
    position: u64,
    remaining: u64,
    pacing: tokio::time::Interval,
}

impl ReplaySource {
    /// Opens a capture for replay.
    ///
    /// # Errors
    /// - If the file cannot be opened or its size read
    pub async fn open(path: &Path, chunk_len: usize, chunks_per_second: f64) -> anyhow::Result<Self> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open capture {}: {e}", path.display()))?;
        let remaining = file.metadata().await?.len();
        tracing::info!(
            "Replaying {} ({} bytes, {} samples per chunk)",
            path.display(),
            remaining,
            chunk_len
        );

        let period = Duration::from_secs_f64(1.0 / chunks_per_second.max(f64::EPSILON));
        let mut pacing = tokio::time::interval(period);
        pacing.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        Ok(Self {
            path: path.to_path_buf(),
            chunk_bytes: (chunk_len * std::mem::size_of::<f32>()) as u64,
            position: 0,
            remaining,
            pacing,
        })
    }

    async fn open_blob(&self, len: u64) -> std::io::Result<InboundFrame> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(self.position)).await?;
        Ok(InboundFrame::Blob(Box::new(file.take(len))))
    }
}

impl FrameSource for ReplaySource {
    async fn next_event(&mut self) -> SourceEvent {
        self.pacing.tick().await;
        if self.remaining == 0 {
            return SourceEvent::Closed(CloseReason::Clean {
                code: NORMAL_CLOSURE,
                reason: "end of capture".to_string(),
            });
        }

        let len = self.remaining.min(self.chunk_bytes);
        match self.open_blob(len).await {
            Ok(frame) => {
                self.position += len;
                self.remaining -= len;
                SourceEvent::Frame(frame)
            }
            Err(e) => SourceEvent::Closed(CloseReason::Unexpected(format!(
                "capture read failed: {e}"
            ))),
        }
    }
}

/// Plays back a fixed list of events, then reports an unexpected close.
#[cfg(test)]
pub struct VecSource {
    events: std::collections::VecDeque<SourceEvent>,
}

#[cfg(test)]
impl VecSource {
    pub fn new(events: Vec<SourceEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }
}

#[cfg(test)]
impl FrameSource for VecSource {
    async fn next_event(&mut self) -> SourceEvent {
        self.events.pop_front().unwrap_or_else(|| {
            SourceEvent::Closed(CloseReason::Unexpected("source exhausted".to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::decode::encode_samples;
    use std::io::Write;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    async fn collect(source: impl FrameSource) -> Vec<SessionEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        pump(source, tx).await;
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_classify_messages() {
        assert!(matches!(
            classify(Message::Binary(vec![0; 8])),
            Some(SourceEvent::Frame(InboundFrame::Binary(_)))
        ));
        assert!(matches!(
            classify(Message::Text("hello".into())),
            Some(SourceEvent::Frame(InboundFrame::Other("text")))
        ));
        assert!(classify(Message::Ping(vec![1])).is_none());

        let close = classify(Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        })));
        assert!(matches!(
            close,
            Some(SourceEvent::Closed(CloseReason::Clean { code: 1000, ref reason })) if reason == "bye"
        ));
    }

    #[tokio::test]
    async fn test_pump_preserves_order_and_drops_undecodable() {
        let source = VecSource::new(vec![
            SourceEvent::Frame(InboundFrame::Binary(encode_samples(&[1.0, 2.0]))),
            SourceEvent::Frame(InboundFrame::Binary(vec![1, 2, 3])),
            SourceEvent::Frame(InboundFrame::Blob(Box::new(std::io::Cursor::new(
                encode_samples(&[3.0, 4.0]),
            )))),
            SourceEvent::Closed(CloseReason::Clean {
                code: 1000,
                reason: String::new(),
            }),
        ]);

        let events = collect(source).await;
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], SessionEvent::FrameArrived(s) if s[0] == 1.0));
        assert!(matches!(&events[1], SessionEvent::FrameArrived(s) if s[0] == 3.0));
        assert!(matches!(
            &events[2],
            SessionEvent::StreamClosed(CloseReason::Clean { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_splits_capture_into_blobs() {
        let samples: Vec<f32> = (0..14).map(|i| i as f32).collect();
        let mut capture = tempfile::NamedTempFile::new().unwrap();
        capture.write_all(&encode_samples(&samples)).unwrap();
        capture.flush().unwrap();

        let source = ReplaySource::open(capture.path(), 4, 25.0).await.unwrap();
        let events = collect(source).await;

        let lens: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::FrameArrived(s) => Some(s.len()),
                _ => None,
            })
            .collect();
        assert_eq!(lens, vec![4, 4, 4, 2]);
        assert!(matches!(
            events.last(),
            Some(SessionEvent::StreamClosed(CloseReason::Clean { code: 1000, .. }))
        ));
        assert!(matches!(&events[1], SessionEvent::FrameArrived(s) if s[0] == 4.0));
    }
}
