//! Length-prefixed message framing.
//!
//! A frame is a 4-byte big-endian `u32` length followed by that many bytes of
//! UTF-8 text. Streams deliver bytes in arbitrary chunks, so the decoder
//! separates "is a whole frame buffered yet" ([`has_complete`]) from "decode
//! it" ([`try_extract`]); UTF-8 decoding is only attempted on complete frames.

use crate::util::constants::{FRAME_HEADER_LEN, MAX_FRAME_SIZE};

/// Framing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Payload (outgoing) or declared length (incoming) is over the limit.
    #[error("message size {size} bytes exceeds maximum allowed size ({max} bytes)")]
    SizeExceeded { size: usize, max: usize },

    /// A complete frame whose payload is not valid UTF-8.
    #[error("frame payload is not valid UTF-8: {0}")]
    InvalidUtf8(String),
}

/// Encode `payload` as a single frame.
pub fn frame(payload: &str) -> Result<Vec<u8>, FrameError> {
    let bytes = payload.as_bytes();
    if bytes.len() > MAX_FRAME_SIZE {
        return Err(FrameError::SizeExceeded {
            size: bytes.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    // Fits in u32: MAX_FRAME_SIZE is 10 MiB.
    let len = bytes.len() as u32;
    let mut framed = Vec::with_capacity(FRAME_HEADER_LEN + bytes.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(bytes);
    Ok(framed)
}

/// Declared payload length, if the header is fully buffered.
pub fn declared_length(buffer: &[u8]) -> Option<usize> {
    let header: [u8; FRAME_HEADER_LEN] = buffer.get(..FRAME_HEADER_LEN)?.try_into().ok()?;
    Some(u32::from_be_bytes(header) as usize)
}

/// Try to decode one frame from the front of `buffer`.
///
/// Returns `Ok(None)` while the header or the declared payload is still
/// incomplete, and `Ok(Some((payload, consumed)))` once a whole frame is
/// present. A declared length over the limit fails before any payload bytes
/// are examined.
pub fn try_extract(buffer: &[u8]) -> Result<Option<(String, usize)>, FrameError> {
    let Some(length) = declared_length(buffer) else {
        return Ok(None);
    };

    if length > MAX_FRAME_SIZE {
        return Err(FrameError::SizeExceeded {
            size: length,
            max: MAX_FRAME_SIZE,
        });
    }

    let end = FRAME_HEADER_LEN + length;
    if buffer.len() < end {
        return Ok(None);
    }

    let payload = std::str::from_utf8(&buffer[FRAME_HEADER_LEN..end])
        .map_err(|e| FrameError::InvalidUtf8(e.to_string()))?;
    Ok(Some((payload.to_owned(), end)))
}

/// `true` once `buffer` holds a complete frame with an acceptable length.
///
/// An oversized declared length reports `false`; [`try_extract`] is where
/// that case surfaces as an error.
pub fn has_complete(buffer: &[u8]) -> bool {
    match declared_length(buffer) {
        Some(length) if length <= MAX_FRAME_SIZE => buffer.len() >= FRAME_HEADER_LEN + length,
        _ => false,
    }
}
