//! # Dynamic Container Codec
//!
//! Length-prefixed sequences, key/value sequences, byte and UTF-8 strings,
//! tagged unions and gated optionals.
//!
//! None of these are stored types. Each read is a function of the cursor
//! that returns an owned value; each write appends to a [`WireWriter`].
//!
//! Every read checks `count × minimum element size` against the remaining
//! bytes before allocating anything, so a hostile count cannot reserve
//! unbounded memory.

use scenewire_shared::{AssetKey, UnitQuat, Uuid, Vec3};

use crate::error::{CodecError, CodecResult};
use crate::primitive::{WireReader, WireWriter};

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
}

/// Unsigned integer widths usable as counts and discriminants.
pub trait WireInt: sealed::Sealed + Copy + Sized {
    /// Width in bits.
    const BITS: u32;

    /// Encoded size in bytes.
    const SIZE: usize;

    /// Reads one value.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` at end of input.
    fn read(r: &mut WireReader<'_>) -> CodecResult<Self>;

    /// Writes one value.
    fn write(self, w: &mut WireWriter);

    /// Widens to u64.
    fn to_u64(self) -> u64;

    /// Narrows a length, or `None` if it does not fit.
    fn from_len(len: usize) -> Option<Self>;
}

macro_rules! impl_wire_int {
    ($($ty:ty => $read:ident, $write:ident);+ $(;)?) => {
        $(
            impl WireInt for $ty {
                const BITS: u32 = <$ty>::BITS;
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn read(r: &mut WireReader<'_>) -> CodecResult<Self> {
                    r.$read()
                }

                #[inline]
                fn write(self, w: &mut WireWriter) {
                    w.$write(self);
                }

                #[inline]
                fn to_u64(self) -> u64 {
                    u64::from(self)
                }

                #[inline]
                fn from_len(len: usize) -> Option<Self> {
                    <$ty>::try_from(len).ok()
                }
            }
        )+
    };
}

impl_wire_int! {
    u8 => read_u8, write_u8;
    u16 => read_u16, write_u16;
    u32 => read_u32, write_u32;
    u64 => read_u64, write_u64;
}

/// A value that can be written to the Dyn part of a structure.
pub trait WireEncode {
    /// Appends the encoded value.
    ///
    /// # Errors
    ///
    /// Returns an error if a nested count or string does not fit its field.
    fn encode(&self, w: &mut WireWriter) -> CodecResult<()>;
}

/// A value that can be read from the Dyn part of a structure.
pub trait WireDecode: Sized {
    /// Smallest number of bytes any encoding of `Self` occupies.
    ///
    /// Used to bound declared counts before allocating.
    const MIN_WIRE_SIZE: usize;

    /// Reads one value.
    ///
    /// # Errors
    ///
    /// Returns any codec error raised while reading.
    fn decode(r: &mut WireReader<'_>) -> CodecResult<Self>;
}

macro_rules! impl_wire_pod {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl WireEncode for $ty {
                #[inline]
                fn encode(&self, w: &mut WireWriter) -> CodecResult<()> {
                    w.write_pod(self);
                    Ok(())
                }
            }

            impl WireDecode for $ty {
                const MIN_WIRE_SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn decode(r: &mut WireReader<'_>) -> CodecResult<Self> {
                    r.read_pod()
                }
            }
        )+
    };
}

impl_wire_pod!(u8, u16, u32, u64, i64, f32, f64, Vec3, UnitQuat, Uuid, AssetKey);

impl<A: WireEncode, B: WireEncode> WireEncode for (A, B) {
    fn encode(&self, w: &mut WireWriter) -> CodecResult<()> {
        self.0.encode(w)?;
        self.1.encode(w)
    }
}

impl<A: WireDecode, B: WireDecode> WireDecode for (A, B) {
    const MIN_WIRE_SIZE: usize = A::MIN_WIRE_SIZE + B::MIN_WIRE_SIZE;

    fn decode(r: &mut WireReader<'_>) -> CodecResult<Self> {
        Ok((A::decode(r)?, B::decode(r)?))
    }
}

/// Discriminant of a closed tagged union.
pub trait Discriminant: Copy + Sized {
    /// Type name used in error messages.
    const NAME: &'static str;

    /// Wire width of the tag.
    type Repr: WireInt;

    /// Maps a raw tag to a case, or `None` if the tag is outside the table.
    fn from_repr(raw: Self::Repr) -> Option<Self>;

    /// Raw tag of this case.
    fn to_repr(self) -> Self::Repr;
}

/// Declares a closed discriminant enum and its [`Discriminant`] impl.
///
/// ```
/// scenewire_codec::wire_enum! {
///     /// Example tags.
///     pub enum Shape: u8 {
///         /// A circle.
///         Circle = 1,
///         /// A square.
///         Square = 2,
///     }
/// }
/// use scenewire_codec::Discriminant;
/// assert_eq!(Shape::from_repr(2), Some(Shape::Square));
/// assert_eq!(Shape::from_repr(3), None);
/// ```
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr($repr)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $value ),+
        }

        impl $crate::Discriminant for $name {
            const NAME: &'static str = stringify!($name);
            type Repr = $repr;

            fn from_repr(raw: $repr) -> Option<Self> {
                match raw {
                    $( x if x == $value => Some(Self::$variant), )+
                    _ => None,
                }
            }

            fn to_repr(self) -> $repr {
                self as $repr
            }
        }
    };
}

/// Implements [`Fixed`](crate::Fixed), [`WireEncode`] and [`WireDecode`] for
/// `Pod` structs that need no field validation.
#[macro_export]
macro_rules! impl_wire_fixed {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Fixed for $ty {}

            impl $crate::WireEncode for $ty {
                fn encode(&self, w: &mut $crate::WireWriter) -> $crate::CodecResult<()> {
                    w.write_fixed(self);
                    Ok(())
                }
            }

            impl $crate::WireDecode for $ty {
                const MIN_WIRE_SIZE: usize = ::core::mem::size_of::<$ty>();

                fn decode(r: &mut $crate::WireReader<'_>) -> $crate::CodecResult<Self> {
                    r.read_fixed()
                }
            }
        )+
    };
}

/// Reads a count and checks it against the remaining byte budget.
fn read_count<W: WireInt>(r: &mut WireReader<'_>, min_element_size: usize) -> CodecResult<usize> {
    let count = W::read(r)?.to_u64();
    // Zero-sized elements would let any count through; bound them as one byte.
    let per_element = min_element_size.max(1) as u64;
    let remaining = r.remaining();
    match count.checked_mul(per_element) {
        Some(total) if total <= remaining as u64 => Ok(count as usize),
        _ => Err(CodecError::LengthOverflow {
            count,
            min_element_size,
            remaining,
        }),
    }
}

fn write_count<W: WireInt>(w: &mut WireWriter, len: usize) -> CodecResult<()> {
    let count = W::from_len(len).ok_or(CodecError::CountTooLarge {
        count: len,
        width_bits: W::BITS,
    })?;
    count.write(w);
    Ok(())
}

/// Reads a `count`-prefixed sequence of `T`.
///
/// # Errors
///
/// Returns `LengthOverflow` if the count cannot fit in the remaining bytes,
/// or any error from decoding an element.
pub fn read_sequence<W: WireInt, T: WireDecode>(r: &mut WireReader<'_>) -> CodecResult<Vec<T>> {
    read_sequence_with::<W, T, _>(r, T::MIN_WIRE_SIZE, T::decode)
}

/// Reads a `count`-prefixed sequence whose elements need a custom decoder.
///
/// `min_element_size` bounds the count exactly as [`WireDecode::MIN_WIRE_SIZE`]
/// does for [`read_sequence`].
///
/// # Errors
///
/// Returns `LengthOverflow` if the count cannot fit in the remaining bytes,
/// or any error from `decode`.
pub fn read_sequence_with<'a, W, T, F>(
    r: &mut WireReader<'a>,
    min_element_size: usize,
    mut decode: F,
) -> CodecResult<Vec<T>>
where
    W: WireInt,
    F: FnMut(&mut WireReader<'a>) -> CodecResult<T>,
{
    let count = read_count::<W>(r, min_element_size)?;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(decode(r)?);
    }
    Ok(items)
}

/// Reads a `count`-prefixed sequence of key/value slots, key first.
///
/// Pairs come back in wire order; duplicate keys are preserved.
///
/// # Errors
///
/// Same as [`read_sequence`].
pub fn read_map<W: WireInt, K: WireDecode, V: WireDecode>(
    r: &mut WireReader<'_>,
) -> CodecResult<Vec<(K, V)>> {
    read_sequence::<W, (K, V)>(r)
}

/// Reads a length-prefixed byte string.
///
/// # Errors
///
/// Returns `LengthOverflow` if the length exceeds the remaining bytes.
pub fn read_bytes<W: WireInt>(r: &mut WireReader<'_>) -> CodecResult<Vec<u8>> {
    read_bytes_borrowed::<W>(r).map(<[u8]>::to_vec)
}

/// Reads a length-prefixed byte string without copying it.
///
/// # Errors
///
/// Returns `LengthOverflow` if the length exceeds the remaining bytes.
pub fn read_bytes_borrowed<'a, W: WireInt>(r: &mut WireReader<'a>) -> CodecResult<&'a [u8]> {
    let len = read_count::<W>(r, 1)?;
    r.read_slice(len)
}

/// Reads a length-prefixed UTF-8 string.
///
/// # Errors
///
/// Returns `LengthOverflow`, or `InvalidUtf8` if the bytes are not UTF-8.
pub fn read_string<W: WireInt>(r: &mut WireReader<'_>) -> CodecResult<String> {
    let bytes = read_bytes_borrowed::<W>(r)?;
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| CodecError::InvalidUtf8 {
            context: "dynamic string",
        })
}

/// Reads a discriminant and dispatches to the matching case decoder.
///
/// # Errors
///
/// Returns `UnknownDiscriminant` if the tag is outside the case table. In
/// this unframed form there is no way to skip the payload.
pub fn read_tagged_union<'a, D, T, F>(r: &mut WireReader<'a>, decode_case: F) -> CodecResult<T>
where
    D: Discriminant,
    F: FnOnce(D, &mut WireReader<'a>) -> CodecResult<T>,
{
    let case = read_discriminant::<D>(r)?;
    decode_case(case, r)
}

/// Reads a discriminant on its own.
///
/// # Errors
///
/// Returns `UnknownDiscriminant` if the tag is outside the case table.
pub fn read_discriminant<D: Discriminant>(r: &mut WireReader<'_>) -> CodecResult<D> {
    let raw = D::Repr::read(r)?;
    D::from_repr(raw).ok_or(CodecError::UnknownDiscriminant {
        type_name: D::NAME,
        value: raw.to_u64(),
    })
}

/// Reads a value whose presence is governed by a flag outside the stream.
///
/// Nothing is consumed when `present` is false.
///
/// # Errors
///
/// Any error from decoding `T`.
pub fn read_gated_optional<T: WireDecode>(
    r: &mut WireReader<'_>,
    present: bool,
) -> CodecResult<Option<T>> {
    if present {
        T::decode(r).map(Some)
    } else {
        Ok(None)
    }
}

/// Writes a `count`-prefixed sequence.
///
/// # Errors
///
/// Returns `CountTooLarge` if `items` does not fit a `W` count.
pub fn write_sequence<W: WireInt, T: WireEncode>(
    w: &mut WireWriter,
    items: &[T],
) -> CodecResult<()> {
    write_sequence_with::<W, T, _>(w, items, |w, item| item.encode(w))
}

/// Writes a `count`-prefixed sequence with a custom element encoder.
///
/// # Errors
///
/// Returns `CountTooLarge` if `items` does not fit a `W` count, or any error
/// from `encode`.
pub fn write_sequence_with<W, T, F>(w: &mut WireWriter, items: &[T], mut encode: F) -> CodecResult<()>
where
    W: WireInt,
    F: FnMut(&mut WireWriter, &T) -> CodecResult<()>,
{
    write_count::<W>(w, items.len())?;
    items.iter().try_for_each(|item| encode(w, item))
}

/// Writes a `count`-prefixed sequence of key/value slots.
///
/// # Errors
///
/// Returns `CountTooLarge` if `pairs` does not fit a `W` count.
pub fn write_map<W: WireInt, K: WireEncode, V: WireEncode>(
    w: &mut WireWriter,
    pairs: &[(K, V)],
) -> CodecResult<()> {
    write_count::<W>(w, pairs.len())?;
    pairs.iter().try_for_each(|(k, v)| {
        k.encode(w)?;
        v.encode(w)
    })
}

/// Writes a length-prefixed byte string.
///
/// # Errors
///
/// Returns `CountTooLarge` if `bytes` does not fit a `W` length.
pub fn write_bytes<W: WireInt>(w: &mut WireWriter, bytes: &[u8]) -> CodecResult<()> {
    write_count::<W>(w, bytes.len())?;
    w.write_raw(bytes);
    Ok(())
}

/// Writes a length-prefixed UTF-8 string.
///
/// # Errors
///
/// Returns `CountTooLarge` if `value` does not fit a `W` length.
pub fn write_string<W: WireInt>(w: &mut WireWriter, value: &str) -> CodecResult<()> {
    write_bytes::<W>(w, value.as_bytes())
}

/// Writes a discriminant.
pub fn write_discriminant<D: Discriminant>(w: &mut WireWriter, case: D) {
    case.to_repr().write(w);
}

/// Writes a gated optional. The governing flag is written by the caller.
///
/// # Errors
///
/// Any error from encoding `T`.
pub fn write_gated_optional<T: WireEncode>(
    w: &mut WireWriter,
    value: Option<&T>,
) -> CodecResult<()> {
    value.map_or(Ok(()), |v| v.encode(w))
}
