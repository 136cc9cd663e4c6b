//! # Incremental Stream Decoding
//!
//! Primary-channel messages have no outer length, so a receiver cannot tell
//! where a message ends until it decodes it. [`MessageBuffer`] keeps the
//! bytes received so far and retries decoding once enough more have arrived
//! to get past the point where the last attempt ran out.

use scenewire_codec::{CodecError, WireReader};

use crate::error::{ProtocolError, ProtocolResult};
use crate::large_asset::LargeAssetMessage;
use crate::message::Message;
use crate::registry::ComponentRegistry;

/// Receive buffer for one ordered byte stream.
#[derive(Debug)]
pub struct MessageBuffer {
    buf: Vec<u8>,
    max_message_size: usize,
    /// Held length below which the last failed decode cannot succeed.
    resume_at: usize,
}

impl MessageBuffer {
    /// Creates a buffer that refuses to hold more than `max_message_size`
    /// bytes of one incomplete message.
    #[must_use]
    pub fn new(max_message_size: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_message_size,
            resume_at: 0,
        }
    }

    /// Appends received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if no bytes are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The receive limit.
    #[must_use]
    pub const fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Decodes the next primary-channel message, if it is complete.
    ///
    /// # Errors
    ///
    /// Any non-incomplete decode error, or `MessageTooLarge` once an
    /// incomplete message has filled the limit. Both end the stream.
    pub fn next_message(&mut self, registry: &ComponentRegistry) -> ProtocolResult<Option<Message>> {
        self.try_decode_with(|r| Message::decode(r, registry))
    }

    /// Decodes the next large-asset channel message, if it is complete.
    ///
    /// # Errors
    ///
    /// Same as [`MessageBuffer::next_message`].
    pub fn next_large_asset_message(&mut self) -> ProtocolResult<Option<LargeAssetMessage>> {
        self.try_decode_with(|r| LargeAssetMessage::decode(r).map_err(ProtocolError::from))
    }

    /// Runs `decode` on the held bytes and removes what it consumed.
    ///
    /// Returns `Ok(None)` when the bytes end mid-message. After such a
    /// result `decode` is not run again until the buffer holds at least as
    /// many bytes as the failed attempt showed were missing.
    ///
    /// # Errors
    ///
    /// Same as [`MessageBuffer::next_message`].
    pub fn try_decode_with<T, F>(&mut self, decode: F) -> ProtocolResult<Option<T>>
    where
        F: FnOnce(&mut WireReader<'_>) -> ProtocolResult<T>,
    {
        if self.buf.is_empty() {
            return Ok(None);
        }
        if self.buf.len() < self.resume_at {
            return self.check_limit().map(|()| None);
        }
        let mut r = WireReader::new(&self.buf);
        match decode(&mut r) {
            Ok(value) => {
                let consumed = r.position();
                self.buf.drain(..consumed);
                self.resume_at = 0;
                Ok(Some(value))
            }
            Err(ProtocolError::Codec(e)) if e.is_incomplete() => {
                self.resume_at = self.resume_point(&e);
                self.check_limit().map(|()| None)
            }
            Err(e) => Err(e),
        }
    }

    fn check_limit(&self) -> ProtocolResult<()> {
        if self.buf.len() >= self.max_message_size {
            tracing::warn!(
                held = self.buf.len(),
                limit = self.max_message_size,
                "incomplete message exceeds receive limit"
            );
            return Err(ProtocolError::MessageTooLarge {
                limit: self.max_message_size,
            });
        }
        Ok(())
    }

    /// Smallest held length at which a decode that failed with `err` could
    /// get further.
    fn resume_point(&self, err: &CodecError) -> usize {
        let held = self.buf.len();
        let wanted = match *err {
            CodecError::TruncatedInput { needed, remaining } => {
                held.saturating_sub(remaining).saturating_add(needed)
            }
            CodecError::LengthOverflow {
                count,
                min_element_size,
                remaining,
            } => held.saturating_sub(remaining).saturating_add(
                usize::try_from(count)
                    .unwrap_or(usize::MAX)
                    .saturating_mul(min_element_size.max(1)),
            ),
            _ => 0,
        };
        wanted.max(held + 1)
    }
}
