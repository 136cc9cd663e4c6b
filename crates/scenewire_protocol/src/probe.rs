//! # Probe Exchange
//!
//! A `Probe` carries no payload. The reply names the session and may carry
//! an icon; the responder closes the connection after sending it.

use scenewire_codec::{write_bytes, CodecError, CodecResult, WireReader, WireWriter};
use scenewire_shared::constants::{MAX_PROBE_ICON_SIZE, NAME_CAPACITY};

/// Answer to a `Probe`.
///
/// Wire layout: Fixed `[u8; 64] session_name`; Dyn `u32 length, icon bytes`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProbeReply {
    /// Name of the session.
    pub session_name: String,
    /// Encoded icon image; empty when the node has none.
    pub icon: Vec<u8>,
}

impl ProbeReply {
    /// Creates a reply without an icon.
    #[must_use]
    pub fn new(session_name: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
            icon: Vec::new(),
        }
    }

    /// Attaches an icon.
    #[must_use]
    pub fn with_icon(mut self, icon: Vec<u8>) -> Self {
        self.icon = icon;
        self
    }

    /// The icon, if one was sent.
    #[must_use]
    pub fn icon(&self) -> Option<&[u8]> {
        (!self.icon.is_empty()).then_some(self.icon.as_slice())
    }

    pub(crate) fn encode(&self, w: &mut WireWriter) -> CodecResult<()> {
        if self.icon.len() > MAX_PROBE_ICON_SIZE {
            return Err(CodecError::CountTooLarge {
                count: self.icon.len(),
                width_bits: u32::BITS,
            });
        }
        w.write_short_string::<NAME_CAPACITY>(&self.session_name)?;
        write_bytes::<u32>(w, &self.icon)
    }

    pub(crate) fn decode(r: &mut WireReader<'_>) -> CodecResult<Self> {
        let session_name = r.read_short_string::<NAME_CAPACITY>()?;
        let icon_len = r.read_u32()? as usize;
        if icon_len > MAX_PROBE_ICON_SIZE {
            return Err(CodecError::CountTooLarge {
                count: icon_len,
                width_bits: u32::BITS,
            });
        }
        Ok(Self {
            session_name,
            icon: r.read_slice(icon_len)?.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_without_icon() {
        let reply = ProbeReply::new("workshop");
        let mut w = WireWriter::new();
        reply.encode(&mut w).unwrap();
        assert_eq!(w.len(), NAME_CAPACITY + 4);

        let mut r = WireReader::new(w.as_slice());
        let decoded = ProbeReply::decode(&mut r).unwrap();
        assert_eq!(decoded.session_name, "workshop");
        assert!(decoded.icon().is_none());
        assert!(r.is_exhausted());
    }

    #[test]
    fn test_reply_with_icon() {
        let reply = ProbeReply::new("workshop").with_icon(vec![0x89, b'P', b'N', b'G']);
        let mut w = WireWriter::new();
        reply.encode(&mut w).unwrap();

        let mut r = WireReader::new(w.as_slice());
        let decoded = ProbeReply::decode(&mut r).unwrap();
        assert_eq!(decoded.icon(), Some(&[0x89, b'P', b'N', b'G'][..]));
    }

    #[test]
    fn test_oversized_icon_is_not_encoded() {
        let reply = ProbeReply::new("workshop").with_icon(vec![0; MAX_PROBE_ICON_SIZE + 1]);
        let mut w = WireWriter::new();
        assert_eq!(
            reply.encode(&mut w),
            Err(CodecError::CountTooLarge {
                count: MAX_PROBE_ICON_SIZE + 1,
                width_bits: 32,
            })
        );
        assert!(w.is_empty());
    }

    #[test]
    fn test_oversized_icon_length_is_refused_on_decode() {
        let mut w = WireWriter::new();
        w.write_short_string::<NAME_CAPACITY>("x").unwrap();
        w.write_u32((MAX_PROBE_ICON_SIZE + 1) as u32);

        let mut r = WireReader::new(w.as_slice());
        assert_eq!(
            ProbeReply::decode(&mut r),
            Err(CodecError::CountTooLarge {
                count: MAX_PROBE_ICON_SIZE + 1,
                width_bits: 32,
            })
        );
    }

    #[test]
    fn test_icon_length_beyond_buffer() {
        let mut w = WireWriter::new();
        w.write_short_string::<NAME_CAPACITY>("x").unwrap();
        w.write_u32(1_000_000);
        w.write_raw(&[1, 2, 3]);

        let mut r = WireReader::new(w.as_slice());
        assert_eq!(
            ProbeReply::decode(&mut r),
            Err(CodecError::TruncatedInput {
                needed: 1_000_000,
                remaining: 3
            })
        );
    }
}
