//! # Self-Describing Values
//!
//! [`Any`] carries a `u8` type tag followed by the value, so a receiver can
//! walk it without a schema. RPC arguments and generic properties use it.

use scenewire_codec::{
    read_bytes, read_discriminant, read_sequence_with, read_string, write_bytes,
    write_discriminant, write_sequence_with, write_string, CodecError, CodecResult, WireDecode,
    WireEncode, WireReader, WireWriter,
};
use scenewire_shared::{
    AssetKey, AssetTypeId, ComponentTypeId, EntityId, ResourceTypeId, UnitQuat, Uuid, Vec3,
};

/// Deepest nesting of arrays and maps accepted on decode.
pub const MAX_DEPTH: usize = 64;

scenewire_codec::wire_enum! {
    /// Type tag of an [`Any`].
    pub enum AnyType: u8 {
        /// No value.
        Undef = 0,
        /// `u8`, zero is false.
        Bool = 1,
        /// `i64`.
        Int = 2,
        /// `f64`.
        Float = 3,
        /// `u64` length, UTF-8.
        String = 4,
        /// `u32` count, values.
        Array = 5,
        /// `u32` count, key/value pairs.
        Map = 6,
        /// `u64` length, bytes.
        Bytes = 7,
        /// `Vec3`.
        Vector = 8,
        /// `UnitQuat`.
        UnitQuat = 9,
        /// `Uuid`.
        Uuid = 10,
        /// Component type id.
        ComponentType = 11,
        /// Asset type id.
        AssetType = 12,
        /// Asset type and id.
        Asset = 13,
        /// Resource type id.
        ResourceType = 14,
        /// Entity id.
        Entity = 15,
    }
}

/// A self-describing value.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Any {
    /// No value.
    #[default]
    Undef,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Double.
    Float(f64),
    /// Text.
    String(String),
    /// Ordered values.
    Array(Vec<Any>),
    /// Key/value pairs in wire order.
    Map(Vec<(Any, Any)>),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Vector.
    Vector(Vec3),
    /// Rotation.
    UnitQuat(UnitQuat),
    /// UUID.
    Uuid(Uuid),
    /// Component type reference.
    ComponentType(ComponentTypeId),
    /// Asset type reference.
    AssetType(AssetTypeId),
    /// Asset reference.
    Asset(AssetKey),
    /// Resource type reference.
    ResourceType(ResourceTypeId),
    /// Entity reference.
    Entity(EntityId),
}

impl Any {
    /// The wire tag.
    #[must_use]
    pub const fn any_type(&self) -> AnyType {
        match self {
            Self::Undef => AnyType::Undef,
            Self::Bool(_) => AnyType::Bool,
            Self::Int(_) => AnyType::Int,
            Self::Float(_) => AnyType::Float,
            Self::String(_) => AnyType::String,
            Self::Array(_) => AnyType::Array,
            Self::Map(_) => AnyType::Map,
            Self::Bytes(_) => AnyType::Bytes,
            Self::Vector(_) => AnyType::Vector,
            Self::UnitQuat(_) => AnyType::UnitQuat,
            Self::Uuid(_) => AnyType::Uuid,
            Self::ComponentType(_) => AnyType::ComponentType,
            Self::AssetType(_) => AnyType::AssetType,
            Self::Asset(_) => AnyType::Asset,
            Self::ResourceType(_) => AnyType::ResourceType,
            Self::Entity(_) => AnyType::Entity,
        }
    }

    fn encode_at(&self, w: &mut WireWriter, depth: usize) -> CodecResult<()> {
        if depth > MAX_DEPTH {
            return Err(CodecError::NestingTooDeep { limit: MAX_DEPTH });
        }
        write_discriminant(w, self.any_type());
        match self {
            Self::Undef => {}
            Self::Bool(v) => w.write_u8(u8::from(*v)),
            Self::Int(v) => w.write_i64(*v),
            Self::Float(v) => w.write_f64(*v),
            Self::String(v) => write_string::<u64>(w, v)?,
            Self::Array(items) => {
                write_sequence_with::<u32, _, _>(w, items, |w, item| item.encode_at(w, depth + 1))?;
            }
            Self::Map(pairs) => {
                write_sequence_with::<u32, _, _>(w, pairs, |w, (key, value)| {
                    key.encode_at(w, depth + 1)?;
                    value.encode_at(w, depth + 1)
                })?;
            }
            Self::Bytes(v) => write_bytes::<u64>(w, v)?,
            Self::Vector(v) => w.write_pod(v),
            Self::UnitQuat(v) => w.write_pod(v),
            Self::Uuid(v) => w.write_pod(v),
            Self::Asset(v) => w.write_pod(v),
            Self::ComponentType(v)
            | Self::AssetType(v)
            | Self::ResourceType(v)
            | Self::Entity(v) => w.write_u32(*v),
        }
        Ok(())
    }

    fn decode_at(r: &mut WireReader<'_>, depth: usize) -> CodecResult<Self> {
        if depth > MAX_DEPTH {
            return Err(CodecError::NestingTooDeep { limit: MAX_DEPTH });
        }
        Ok(match read_discriminant::<AnyType>(r)? {
            AnyType::Undef => Self::Undef,
            AnyType::Bool => Self::Bool(r.read_u8()? != 0),
            AnyType::Int => Self::Int(r.read_i64()?),
            AnyType::Float => Self::Float(r.read_f64()?),
            AnyType::String => Self::String(read_string::<u64>(r)?),
            AnyType::Array => Self::Array(read_sequence_with::<u32, _, _>(
                r,
                <Self as WireDecode>::MIN_WIRE_SIZE,
                |r| Self::decode_at(r, depth + 1),
            )?),
            AnyType::Map => Self::Map(read_sequence_with::<u32, _, _>(
                r,
                2 * <Self as WireDecode>::MIN_WIRE_SIZE,
                |r| Ok((Self::decode_at(r, depth + 1)?, Self::decode_at(r, depth + 1)?)),
            )?),
            AnyType::Bytes => Self::Bytes(read_bytes::<u64>(r)?),
            AnyType::Vector => Self::Vector(r.read_pod()?),
            AnyType::UnitQuat => Self::UnitQuat(r.read_pod()?),
            AnyType::Uuid => Self::Uuid(r.read_pod()?),
            AnyType::ComponentType => Self::ComponentType(r.read_u32()?),
            AnyType::AssetType => Self::AssetType(r.read_u32()?),
            AnyType::Asset => Self::Asset(r.read_pod()?),
            AnyType::ResourceType => Self::ResourceType(r.read_u32()?),
            AnyType::Entity => Self::Entity(r.read_u32()?),
        })
    }
}

impl WireEncode for Any {
    fn encode(&self, w: &mut WireWriter) -> CodecResult<()> {
        self.encode_at(w, 0)
    }
}

impl WireDecode for Any {
    const MIN_WIRE_SIZE: usize = 1;

    fn decode(r: &mut WireReader<'_>) -> CodecResult<Self> {
        Self::decode_at(r, 0)
    }
}

impl From<bool> for Any {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Any {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Any {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Any {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}
