//! # Message Framing
//!
//! Extensible payloads carry an explicit `message_size` in their Fixed header.
//! A decoder that knows the type decodes the payload and must consume exactly
//! `message_size` bytes. A decoder that does not know the type skips them.
//!
//! ```text
//! ┌──────────┬──────────────┬──────────────────────────────┐
//! │ type ... │ message_size │ Dyn payload (message_size B) │
//! └──────────┴──────────────┴──────────────────────────────┘
//!              ▲ trailing Fixed field, backpatched on write
//! ```
//!
//! Either way the outer cursor ends at the same byte.

use crate::error::{CodecError, CodecResult};
use crate::primitive::{Fixed, WireReader, WireWriter};

/// A Fixed header whose last field is the `message_size` of its Dyn payload.
pub trait FramedHeader: Fixed {
    /// The declared payload size.
    fn message_size(&self) -> u32;
}

/// Writes `header` followed by the payload produced by `body`, then patches
/// the header's `message_size` to the payload's real length.
///
/// The `message_size` already stored in `header` is ignored.
///
/// # Errors
///
/// Returns any error from `body`, or `CountTooLarge` if the payload exceeds
/// `u32::MAX` bytes.
pub fn write_framed<H, F>(w: &mut WireWriter, header: &H, body: F) -> CodecResult<u32>
where
    H: FramedHeader,
    F: FnOnce(&mut WireWriter) -> CodecResult<()>,
{
    w.write_fixed(header);
    let size_at = w.len() - 4;
    let start = w.len();
    body(w)?;
    let len = w.len() - start;
    let size = u32::try_from(len).map_err(|_| CodecError::CountTooLarge {
        count: len,
        width_bits: u32::BITS,
    })?;
    w.patch_u32(size_at, size);
    Ok(size)
}

/// The payload of one framed message, already split off the outer reader.
///
/// Opening a frame advances the outer cursor past the payload, so whichever
/// of [`Frame::decode_exact`] or [`Frame::skip`] follows, the outer stream is
/// positioned identically.
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    declared: usize,
    body: WireReader<'a>,
}

impl<'a> Frame<'a> {
    /// Splits `message_size` bytes off `r`.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` if the outer buffer is shorter than the
    /// declared size.
    pub fn open(r: &mut WireReader<'a>, message_size: u32) -> CodecResult<Self> {
        let declared = message_size as usize;
        Ok(Self {
            declared,
            body: r.sub_reader(declared)?,
        })
    }

    /// Wraps an already-delimited payload.
    #[must_use]
    pub const fn from_bytes(payload: &'a [u8]) -> Self {
        Self {
            declared: payload.len(),
            body: WireReader::new(payload),
        }
    }

    /// The declared payload size.
    #[must_use]
    pub const fn declared(&self) -> usize {
        self.declared
    }

    /// Decodes the payload with `decode`, requiring it to consume every byte.
    ///
    /// # Errors
    ///
    /// Returns `FrameSizeMismatch` if `decode` stops short of the declared
    /// size or runs past it, including a count too large for the frame.
    /// Other decode errors pass through.
    pub fn decode_exact<T, F>(mut self, decode: F) -> CodecResult<T>
    where
        F: FnOnce(&mut WireReader<'a>) -> CodecResult<T>,
    {
        let declared = self.declared;
        let value = decode(&mut self.body).map_err(|err| match err {
            // Running off the end of a frame means the payload claims more
            // than message_size; that is a framing fault, not a short buffer.
            CodecError::TruncatedInput { needed, remaining } => CodecError::FrameSizeMismatch {
                declared,
                consumed: (declared - remaining).saturating_add(needed),
            },
            // Same for a count whose elements cannot fit the frame.
            CodecError::LengthOverflow {
                count,
                min_element_size,
                remaining,
            } => CodecError::FrameSizeMismatch {
                declared,
                consumed: (declared - remaining).saturating_add(
                    usize::try_from(count)
                        .unwrap_or(usize::MAX)
                        .saturating_mul(min_element_size.max(1)),
                ),
            },
            other => other,
        })?;
        let consumed = self.body.position();
        if consumed != declared {
            return Err(CodecError::FrameSizeMismatch { declared, consumed });
        }
        Ok(value)
    }

    /// Returns the raw payload, consuming the frame.
    #[must_use]
    pub fn into_bytes(mut self) -> &'a [u8] {
        let remaining = self.body.remaining();
        self.body.read_slice(remaining).unwrap_or_default()
    }

    /// Discards the payload. Returns the number of bytes skipped.
    #[must_use]
    pub fn skip(self) -> usize {
        tracing::debug!(bytes = self.declared, "skipping unrecognized framed payload");
        self.declared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    struct TestHeader {
        kind: u32,
        message_size: u32,
    }

    impl Fixed for TestHeader {}

    impl FramedHeader for TestHeader {
        fn message_size(&self) -> u32 {
            self.message_size
        }
    }

    fn framed(kind: u32, values: &[u32]) -> Vec<u8> {
        let mut w = WireWriter::new();
        let header = TestHeader {
            kind,
            message_size: 0,
        };
        write_framed(&mut w, &header, |w| {
            values.iter().for_each(|v| w.write_u32(*v));
            Ok(())
        })
        .unwrap();
        w.into_bytes()
    }

    #[test]
    fn test_write_backpatches_size() {
        let bytes = framed(3, &[10, 20]);
        let mut r = WireReader::new(&bytes);
        let header: TestHeader = r.read_fixed().unwrap();
        assert_eq!(header.kind, 3);
        assert_eq!(header.message_size(), 8);
        assert_eq!(r.remaining(), 8);
    }

    #[test]
    fn test_decode_and_skip_leave_same_position() {
        let mut bytes = framed(1, &[1, 2, 3]);
        bytes.extend_from_slice(&[0xEE]);

        let mut decoding = WireReader::new(&bytes);
        let header: TestHeader = decoding.read_fixed().unwrap();
        let frame = Frame::open(&mut decoding, header.message_size()).unwrap();
        let sum = frame
            .decode_exact(|r| Ok(r.read_u32()? + r.read_u32()? + r.read_u32()?))
            .unwrap();
        assert_eq!(sum, 6);

        let mut skipping = WireReader::new(&bytes);
        let header: TestHeader = skipping.read_fixed().unwrap();
        let skipped = Frame::open(&mut skipping, header.message_size())
            .unwrap()
            .skip();
        assert_eq!(skipped, 12);

        assert_eq!(decoding.position(), skipping.position());
        assert_eq!(decoding.read_u8().unwrap(), 0xEE);
    }

    #[test]
    fn test_under_consumption_is_mismatch() {
        let frame = Frame::from_bytes(&[1, 0, 0, 0, 2, 0, 0, 0]);
        assert_eq!(
            frame.decode_exact(WireReader::read_u32),
            Err(CodecError::FrameSizeMismatch {
                declared: 8,
                consumed: 4
            })
        );
    }

    #[test]
    fn test_over_consumption_is_mismatch() {
        let frame = Frame::from_bytes(&[1, 0, 0, 0, 2, 0]);
        assert_eq!(
            frame.decode_exact(|r| Ok((r.read_u32()?, r.read_u32()?))),
            Err(CodecError::FrameSizeMismatch {
                declared: 6,
                consumed: 8
            })
        );
    }

    #[test]
    fn test_count_past_frame_end_is_mismatch() {
        // Nine bytes claimed, two present: the frame is complete, so more
        // input cannot help.
        let frame = Frame::from_bytes(&[9, 0, 0, 0, 1, 2]);
        let err = frame
            .decode_exact(crate::dynamic::read_bytes::<u32>)
            .unwrap_err();
        assert!(!err.is_incomplete());
        assert_eq!(
            err,
            CodecError::FrameSizeMismatch {
                declared: 6,
                consumed: 13
            }
        );
    }

    #[test]
    fn test_open_past_end_is_truncation() {
        let mut r = WireReader::new(&[0, 0]);
        assert!(matches!(
            Frame::open(&mut r, 10),
            Err(CodecError::TruncatedInput { .. })
        ));
    }
}
