//! Built-in asset types.
//!
//! Only buffer assets are decoded here: they are how an asset payload points
//! at a large-asset transfer. Image, mesh and material schemas are left to
//! the asset content interpreter.

use scenewire_codec::{
    read_bytes, read_string, read_tagged_union, write_bytes, write_discriminant, write_string,
    CodecResult, Frame, WireWriter,
};
use scenewire_shared::{AssetId, AssetKey, AssetTypeId, LargeAssetId};

use crate::content::ContentMessage;

/// Built-in asset type identifiers.
pub mod asset_type {
    use scenewire_shared::AssetTypeId;

    /// Raw byte buffer.
    pub const BUFFER: AssetTypeId = 0;
    /// Image.
    pub const IMAGE: AssetTypeId = 6;
    /// Mesh.
    pub const MESH: AssetTypeId = 10;
    /// Standard material.
    pub const STD_MATERIAL: AssetTypeId = 20;
}

scenewire_codec::wire_enum! {
    /// Case table of [`BufferSource`].
    pub enum BufferSourceType: u8 {
        /// Fetch over the large-asset channel.
        LargeAsset = 0,
        /// Fetch from a URL.
        Url = 1,
        /// Bytes carried inline.
        Inline = 2,
    }
}

/// Where a buffer's bytes come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BufferSource {
    /// A large-asset transfer id.
    LargeAsset(LargeAssetId),
    /// A UTF-8 URL.
    Url(String),
    /// The bytes themselves (at most 65535).
    Inline(Vec<u8>),
}

/// A buffer asset.
///
/// Wire layout: Fixed `u64 size_hint`; Dyn `BufferSource` (u8 tag).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferAsset {
    /// Expected byte count. Readers must not rely on it.
    pub size_hint: u64,
    /// Content source.
    pub source: BufferSource,
}

impl BufferAsset {
    fn encode(&self, w: &mut WireWriter) -> CodecResult<()> {
        w.write_u64(self.size_hint);
        match &self.source {
            BufferSource::LargeAsset(id) => {
                write_discriminant(w, BufferSourceType::LargeAsset);
                w.write_u64(*id);
            }
            BufferSource::Url(url) => {
                write_discriminant(w, BufferSourceType::Url);
                write_string::<u16>(w, url)?;
            }
            BufferSource::Inline(bytes) => {
                write_discriminant(w, BufferSourceType::Inline);
                write_bytes::<u16>(w, bytes)?;
            }
        }
        Ok(())
    }
}

/// A typed built-in asset payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Asset {
    /// Byte buffer.
    Buffer(BufferAsset),
}

impl Asset {
    /// The asset type identifier.
    #[must_use]
    pub const fn type_id(&self) -> AssetTypeId {
        match self {
            Self::Buffer(_) => asset_type::BUFFER,
        }
    }

    /// Large-asset transfer this asset depends on, if any.
    #[must_use]
    pub const fn large_asset(&self) -> Option<LargeAssetId> {
        match self {
            Self::Buffer(BufferAsset {
                source: BufferSource::LargeAsset(id),
                ..
            }) => Some(*id),
            Self::Buffer(_) => None,
        }
    }

    /// Encodes the payload bytes carried by MODIFY_ASSET.
    ///
    /// # Errors
    ///
    /// Returns `CountTooLarge` for a URL or inline buffer over 65535 bytes.
    pub fn encode_payload(&self) -> CodecResult<Vec<u8>> {
        let mut w = WireWriter::new();
        match self {
            Self::Buffer(buffer) => buffer.encode(&mut w)?,
        }
        Ok(w.into_bytes())
    }

    /// Decodes a payload of the given type. `Ok(None)` for types whose
    /// schema is not decoded here.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDiscriminant` for a bad source tag, and
    /// `FrameSizeMismatch` if the payload has trailing or missing bytes.
    pub fn decode(asset_type: AssetTypeId, payload: &[u8]) -> CodecResult<Option<Self>> {
        let frame = Frame::from_bytes(payload);
        match asset_type {
            asset_type::BUFFER => frame
                .decode_exact(|r| {
                    let size_hint = r.read_u64()?;
                    let source = read_tagged_union::<BufferSourceType, _, _>(r, |case, r| match case {
                        BufferSourceType::LargeAsset => r.read_u64().map(BufferSource::LargeAsset),
                        BufferSourceType::Url => read_string::<u16>(r).map(BufferSource::Url),
                        BufferSourceType::Inline => read_bytes::<u16>(r).map(BufferSource::Inline),
                    })?;
                    Ok(Self::Buffer(BufferAsset { size_hint, source }))
                })
                .map(Some),
            _ => Ok(None),
        }
    }

    /// Builds the MODIFY_ASSET message registering this asset under `id`.
    ///
    /// # Errors
    ///
    /// Same as [`Asset::encode_payload`].
    pub fn modify(&self, id: AssetId) -> CodecResult<ContentMessage> {
        Ok(ContentMessage::ModifyAsset {
            key: AssetKey::new(self.type_id(), id),
            payload: self.encode_payload()?,
        })
    }
}
