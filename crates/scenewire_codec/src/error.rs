//! # Codec Error Types
//!
//! All errors that can occur while encoding or decoding wire structures.
//! Every decode error is fatal to the buffer it occurred in: the cursor
//! position after an error is unspecified and the stream cannot be
//! resynchronized.

use thiserror::Error;

/// Errors raised by the wire codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer ran out in the middle of a field.
    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    TruncatedInput {
        /// Bytes the field required.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// A declared element count implies more bytes than the buffer holds.
    #[error(
        "length overflow: {count} elements of at least {min_element_size} bytes exceed {remaining} remaining bytes"
    )]
    LengthOverflow {
        /// Declared element count.
        count: u64,
        /// Smallest possible encoded size of one element.
        min_element_size: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// A short string has non-zero bytes after its terminator.
    #[error("invalid short string: non-zero byte after terminator at offset {offset}")]
    InvalidShortString {
        /// Offset of the offending byte within the string field.
        offset: usize,
    },

    /// A string does not fit its fixed-size field.
    #[error("short string of {len} bytes exceeds capacity {capacity}")]
    ShortStringTooLong {
        /// Encoded length of the string.
        len: usize,
        /// Capacity of the field.
        capacity: usize,
    },

    /// A string field is not valid UTF-8.
    #[error("invalid UTF-8 in {context}")]
    InvalidUtf8 {
        /// Which kind of field held the bytes.
        context: &'static str,
    },

    /// An unframed tagged union carried a tag outside its case table.
    #[error("unknown {type_name} discriminant {value}")]
    UnknownDiscriminant {
        /// Name of the discriminant type.
        type_name: &'static str,
        /// The raw tag value.
        value: u64,
    },

    /// A framed payload did not consume exactly its declared `message_size`.
    #[error("frame size mismatch: declared {declared} bytes, consumed {consumed}")]
    FrameSizeMismatch {
        /// The declared `message_size`.
        declared: usize,
        /// Bytes the decoder consumed (or tried to consume).
        consumed: usize,
    },

    /// A sequence is too long for its count prefix.
    #[error("{count} elements do not fit a {width_bits}-bit count")]
    CountTooLarge {
        /// Number of elements the caller tried to encode.
        count: usize,
        /// Width of the count prefix in bits.
        width_bits: u32,
    },

    /// A recursive value nests deeper than the decoder allows.
    #[error("nesting deeper than {limit} levels")]
    NestingTooDeep {
        /// Maximum accepted depth.
        limit: usize,
    },
}

impl CodecError {
    /// Returns true if more input could turn this error into a success.
    ///
    /// Only meaningful for a buffer known to be a prefix of a stream: both
    /// kinds are raised when the bytes simply have not arrived yet.
    #[must_use]
    pub const fn is_incomplete(&self) -> bool {
        matches!(self, Self::TruncatedInput { .. } | Self::LengthOverflow { .. })
    }
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
