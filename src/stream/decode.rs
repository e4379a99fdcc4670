//! Inbound frame decoding.
//!
//! Normalizes the two payload shapes a source can deliver into one
//! `SampleVector`: plain binary buffers and blobs that must be read to
//! completion first. Both carry densely packed little-endian `f32` samples.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// One chunk of samples, immutable once decoded.
pub type SampleVector = Arc<[f32]>;

const SAMPLE_BYTES: usize = std::mem::size_of::<f32>();

/// A raw payload as handed over by a transport.
pub enum InboundFrame {
    /// Bytes directly usable as a float array
    Binary(Vec<u8>),
    /// A reader that has to be drained before decoding
    Blob(Box<dyn AsyncRead + Send + Unpin>),
    /// Anything else the transport delivered (text, control payloads, ...)
    Other(&'static str),
}

impl fmt::Debug for InboundFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary(bytes) => write!(f, "Binary({} bytes)", bytes.len()),
            Self::Blob(_) => write!(f, "Blob"),
            Self::Other(kind) => write!(f, "Other({kind})"),
        }
    }
}

/// Reasons a frame is dropped before it reaches the session.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unrecognized frame kind: {0}")]
    UnrecognizedFrameKind(&'static str),
    #[error("frame of {0} bytes is not a whole number of f32 samples")]
    TruncatedSample(usize),
    #[error("empty frame")]
    EmptyFrame,
    #[error("failed to read blob frame: {0}")]
    BlobRead(#[from] std::io::Error),
}

/// Decodes a frame into a sample vector.
///
/// Blob frames suspend until their reader reaches EOF. Nothing else is
/// touched; counting and buffering are the caller's business.
pub async fn decode_frame(frame: InboundFrame) -> Result<SampleVector, DecodeError> {
    match frame {
        InboundFrame::Binary(bytes) => decode_samples(&bytes),
        InboundFrame::Blob(mut reader) => {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes).await?;
            decode_samples(&bytes)
        }
        InboundFrame::Other(kind) => Err(DecodeError::UnrecognizedFrameKind(kind)),
    }
}

/// Interprets a byte buffer as little-endian `f32` samples.
///
/// The samples are copied out rather than cast in place: wire buffers carry no
/// `f32` alignment and the byte order is fixed regardless of the host.
pub fn decode_samples(bytes: &[u8]) -> Result<SampleVector, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyFrame);
    }
    if bytes.len() % SAMPLE_BYTES != 0 {
        return Err(DecodeError::TruncatedSample(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(SAMPLE_BYTES)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Encodes samples the way sources put them on the wire.
#[cfg(test)]
pub fn encode_samples(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_binary_frame_decodes_in_order() {
        let bytes = encode_samples(&[0.5, -1.0, 0.25]);
        let samples = decode_frame(InboundFrame::Binary(bytes)).await.unwrap();
        assert_eq!(&*samples, &[0.5, -1.0, 0.25]);
    }

    #[tokio::test]
    async fn test_blob_frame_matches_binary_decoding() {
        let samples: Vec<f32> = (0..128).map(|i| (i as f32 / 64.0) - 1.0).collect();
        let bytes = encode_samples(&samples);

        let reader = std::io::Cursor::new(bytes.clone());
        let from_blob = decode_frame(InboundFrame::Blob(Box::new(reader)))
            .await
            .unwrap();
        let from_binary = decode_frame(InboundFrame::Binary(bytes)).await.unwrap();

        assert_eq!(from_blob, from_binary);
        assert_eq!(from_blob.len(), 128);
    }

    #[tokio::test]
    async fn test_other_frames_are_unrecognized() {
        let err = decode_frame(InboundFrame::Other("text")).await.unwrap_err();
        assert!(matches!(err, DecodeError::UnrecognizedFrameKind("text")));
    }

    #[test]
    fn test_partial_sample_is_rejected() {
        let err = decode_samples(&[0, 0, 128, 63, 1]).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedSample(5)));
    }

    #[test]
    fn test_unaligned_buffer_decodes() {
        let mut bytes = vec![0xff];
        bytes.extend(encode_samples(&[1.0, -0.5]));
        let samples = decode_samples(&bytes[1..]).unwrap();
        assert_eq!(&*samples, &[1.0, -0.5]);
    }

    #[test]
    fn test_empty_payload_is_rejected() {
        assert!(matches!(decode_samples(&[]), Err(DecodeError::EmptyFrame)));
    }
}
