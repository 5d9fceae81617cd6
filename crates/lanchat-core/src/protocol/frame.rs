//! Length-prefixed frame codec for the chat relay wire protocol.
//!
//! Wire format:
//! ```text
//! [payload_len:4][payload:N]
//! ```
//! `payload_len` is a big-endian `u32` and `N` never exceeds [`MAX_FRAME_LEN`].
//! An empty payload (`N = 0`) is a valid frame.

use thiserror::Error;

/// Size of the length prefix that precedes every payload.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest payload a single frame may carry (64 KiB).
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Errors that can occur while encoding, decoding, reading or writing frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The declared or supplied payload length is above [`MAX_FRAME_LEN`].
    #[error("frame of {len} bytes exceeds the {max}-byte limit")]
    FrameTooLarge { len: usize, max: usize },

    /// The byte slice does not yet hold a complete frame.
    #[error("incomplete frame: need {needed} bytes, got {available}")]
    Incomplete { needed: usize, available: usize },

    /// The payload was framed correctly but its content is unusable
    /// (for example, it is not valid UTF-8).
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The underlying stream failed.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `payload` into a length-prefixed frame.
///
/// # Errors
///
/// Returns [`FrameError::FrameTooLarge`] if `payload` is longer than
/// [`MAX_FRAME_LEN`].
///
/// # Examples
///
/// ```rust
/// use lanchat_core::protocol::{decode_frame, encode_frame};
///
/// let bytes = encode_frame(b"hi").unwrap();
/// assert_eq!(bytes, [0, 0, 0, 2, b'h', b'i']);
/// let (payload, consumed) = decode_frame(&bytes).unwrap();
/// assert_eq!(payload, b"hi");
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    check_payload_len(payload.len())?;

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Decodes one frame from the beginning of `bytes`.
///
/// Returns the payload and the total number of bytes consumed (prefix +
/// payload) so the caller can advance its read cursor.
///
/// # Errors
///
/// - [`FrameError::Incomplete`] when `bytes` ends before the frame does.
/// - [`FrameError::FrameTooLarge`] when the declared length is above the cap;
///   this is reported as soon as the prefix is available.
pub fn decode_frame(bytes: &[u8]) -> Result<(Vec<u8>, usize), FrameError> {
    if bytes.len() < LENGTH_PREFIX_SIZE {
        return Err(FrameError::Incomplete {
            needed: LENGTH_PREFIX_SIZE,
            available: bytes.len(),
        });
    }

    let payload_len = parse_length_prefix([bytes[0], bytes[1], bytes[2], bytes[3]])?;

    let total_needed = LENGTH_PREFIX_SIZE + payload_len;
    if bytes.len() < total_needed {
        return Err(FrameError::Incomplete {
            needed: total_needed,
            available: bytes.len(),
        });
    }

    let payload = bytes[LENGTH_PREFIX_SIZE..total_needed].to_vec();
    Ok((payload, total_needed))
}

/// Interprets a length prefix, rejecting lengths above [`MAX_FRAME_LEN`].
///
/// # Errors
///
/// Returns [`FrameError::FrameTooLarge`] for an oversized declared length.
pub fn parse_length_prefix(prefix: [u8; LENGTH_PREFIX_SIZE]) -> Result<usize, FrameError> {
    let len = u32::from_be_bytes(prefix) as usize;
    check_payload_len(len)?;
    Ok(len)
}

fn check_payload_len(len: usize) -> Result<(), FrameError> {
    if len > MAX_FRAME_LEN {
        return Err(FrameError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_prefixes_big_endian_length() {
        // Arrange
        let payload = vec![0xAB; 300];

        // Act
        let bytes = encode_frame(&payload).unwrap();

        // Assert – 300 = 0x012C
        assert_eq!(&bytes[..4], &[0x00, 0x00, 0x01, 0x2C]);
        assert_eq!(bytes.len(), 304);
    }

    #[test]
    fn test_empty_payload_encodes_to_bare_prefix() {
        let bytes = encode_frame(b"").unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0]);

        let (payload, consumed) = decode_frame(&bytes).unwrap();
        assert!(payload.is_empty());
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_max_length_payload_is_accepted() {
        let payload = vec![0x5A; MAX_FRAME_LEN];
        let bytes = encode_frame(&payload).unwrap();
        let (decoded, consumed) = decode_frame(&bytes).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(consumed, MAX_FRAME_LEN + LENGTH_PREFIX_SIZE);
    }

    #[test]
    fn test_encode_rejects_payload_one_over_limit() {
        let payload = vec![0u8; MAX_FRAME_LEN + 1];
        let result = encode_frame(&payload);
        assert!(matches!(
            result,
            Err(FrameError::FrameTooLarge { len, max }) if len == MAX_FRAME_LEN + 1 && max == MAX_FRAME_LEN
        ));
    }

    #[test]
    fn test_decode_rejects_oversized_prefix_without_payload() {
        // Arrange: only the prefix is present, declaring 65537 bytes
        let prefix = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes();

        // Act
        let result = decode_frame(&prefix);

        // Assert: the cap is enforced before asking for payload bytes
        assert!(matches!(result, Err(FrameError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_decode_short_prefix_returns_incomplete() {
        let result = decode_frame(&[0x00, 0x00]);
        assert!(matches!(
            result,
            Err(FrameError::Incomplete { needed: 4, available: 2 })
        ));
    }

    #[test]
    fn test_decode_partial_payload_returns_incomplete() {
        let bytes = encode_frame(b"hello").unwrap();
        let result = decode_frame(&bytes[..6]);
        assert!(matches!(
            result,
            Err(FrameError::Incomplete { needed: 9, available: 6 })
        ));
    }

    #[test]
    fn test_two_frames_in_one_buffer_decode_independently() {
        // Arrange: simulate TCP coalescing two sends into one recv
        let mut buf = encode_frame(b"first").unwrap();
        buf.extend_from_slice(&encode_frame(b"second").unwrap());

        // Act
        let (one, consumed_one) = decode_frame(&buf).unwrap();
        let (two, consumed_two) = decode_frame(&buf[consumed_one..]).unwrap();

        // Assert
        assert_eq!(one, b"first");
        assert_eq!(two, b"second");
        assert_eq!(consumed_one + consumed_two, buf.len());
    }
}
