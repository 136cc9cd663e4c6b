//! # SCENEWIRE Codec
//!
//! The wire discipline every SCENEWIRE message follows.
//!
//! ## Structure Layout
//!
//! ```text
//! ┌──────────────────────────────┬─────────────────────────────────────┐
//! │ Fixed                        │ Dyn                                 │
//! │ Pod, tightly packed, LE      │ parsed field by field, in order     │
//! │ copied verbatim              │ counts, unions, optionals, frames   │
//! └──────────────────────────────┴─────────────────────────────────────┘
//! ```
//!
//! Either part may be absent. Decoding Fixed never looks into Dyn, and
//! decoding Dyn never re-reads Fixed.
//!
//! ## Modules
//!
//! - [`primitive`]: little-endian scalars, `Pod` Fixed parts, short strings
//! - [`dynamic`]: length-prefixed sequences, maps, strings, tagged unions,
//!   gated optionals
//! - [`framing`]: `message_size` frames that let unknown payloads be skipped
//! - [`quat`]: smallest-three quaternion and quantized position codecs
//!
//! ## Error Model
//!
//! Every fatal condition is a [`CodecError`]. An unrecognized framed payload
//! is not an error: it is skipped by its declared size.

#![deny(unsafe_code)]

// Fixed parts are copied verbatim; the wire is little-endian.
#[cfg(not(target_endian = "little"))]
compile_error!("scenewire_codec copies Fixed parts verbatim and requires a little-endian target");

pub mod dynamic;
pub mod error;
pub mod framing;
pub mod primitive;
pub mod quat;

pub use dynamic::{
    read_bytes, read_bytes_borrowed, read_discriminant, read_gated_optional, read_map,
    read_sequence, read_sequence_with, read_string, read_tagged_union, write_bytes,
    write_discriminant, write_gated_optional, write_map, write_sequence, write_sequence_with,
    write_string, Discriminant, WireDecode, WireEncode, WireInt,
};
pub use error::{CodecError, CodecResult};
pub use framing::{write_framed, Frame, FramedHeader};
pub use primitive::{short_string, Fixed, WireReader, WireWriter};
pub use quat::{
    compress_quat, compress_vec3, decompress_quat, decompress_vec3, CompressedQuat,
    CompressedVec3,
};
