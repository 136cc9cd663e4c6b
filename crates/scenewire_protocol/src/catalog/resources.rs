//! Built-in resource types.

use bytemuck::{Pod, Zeroable};
use scenewire_codec::{read_sequence, write_sequence, CodecResult, Frame, WireWriter};
use scenewire_shared::{ResourceTypeId, Vec3};

use crate::content::ContentMessage;

/// Built-in resource type identifiers.
pub mod resource_type {
    use scenewire_shared::ResourceTypeId;

    /// Quantization spaces for compressed transforms.
    pub const COMPRESSED_TRANSFORM: ResourceTypeId = 1;
}

/// A box that compressed positions are quantized inside.
///
/// Wire layout: `u32 index, Vec3 min, Vec3 max` (28 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct QuantizationSpace {
    /// Zone index referenced by `COMPRESSED_TRANSFORM_SPACE` components.
    pub index: u32,
    /// Lower corner.
    pub min: Vec3,
    /// Upper corner.
    pub max: Vec3,
}

scenewire_codec::impl_wire_fixed!(QuantizationSpace);

/// Every quantization space in the scene.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompressedTransformResource {
    /// Spaces, looked up by [`QuantizationSpace::index`].
    pub spaces: Vec<QuantizationSpace>,
}

impl CompressedTransformResource {
    /// The space for a zone, if present.
    #[must_use]
    pub fn space(&self, zone: u32) -> Option<&QuantizationSpace> {
        self.spaces.iter().find(|s| s.index == zone)
    }
}

/// A typed built-in resource payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Resource {
    /// Quantization spaces.
    CompressedTransform(CompressedTransformResource),
}

impl Resource {
    /// The resource type identifier.
    #[must_use]
    pub const fn type_id(&self) -> ResourceTypeId {
        match self {
            Self::CompressedTransform(_) => resource_type::COMPRESSED_TRANSFORM,
        }
    }

    /// Encodes the payload bytes carried by MODIFY_RESOURCE.
    ///
    /// # Errors
    ///
    /// Returns `CountTooLarge` if a list does not fit its count.
    pub fn encode_payload(&self) -> CodecResult<Vec<u8>> {
        let mut w = WireWriter::new();
        match self {
            Self::CompressedTransform(res) => {
                write_sequence::<u32, QuantizationSpace>(&mut w, &res.spaces)?;
            }
        }
        Ok(w.into_bytes())
    }

    /// Decodes a payload of the given type. `Ok(None)` for unknown types.
    ///
    /// # Errors
    ///
    /// Returns `FrameSizeMismatch` if the payload has trailing or missing
    /// bytes, a hostile count included.
    pub fn decode(resource_type: ResourceTypeId, payload: &[u8]) -> CodecResult<Option<Self>> {
        let frame = Frame::from_bytes(payload);
        match resource_type {
            resource_type::COMPRESSED_TRANSFORM => frame
                .decode_exact(|r| {
                    read_sequence::<u32, QuantizationSpace>(r).map(|spaces| {
                        Self::CompressedTransform(CompressedTransformResource { spaces })
                    })
                })
                .map(Some),
            _ => Ok(None),
        }
    }

    /// Builds the MODIFY_RESOURCE message for this resource.
    ///
    /// # Errors
    ///
    /// Same as [`Resource::encode_payload`].
    pub fn modify(&self) -> CodecResult<ContentMessage> {
        Ok(ContentMessage::ModifyResource {
            resource_type: self.type_id(),
            payload: self.encode_payload()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spaces_round_trip() {
        let resource = Resource::CompressedTransform(CompressedTransformResource {
            spaces: vec![
                QuantizationSpace {
                    index: 0,
                    min: Vec3::new(-1.0, -1.0, -1.0),
                    max: Vec3::ONE,
                },
                QuantizationSpace {
                    index: 4,
                    min: Vec3::ZERO,
                    max: Vec3::new(100.0, 10.0, 100.0),
                },
            ],
        });
        let payload = resource.encode_payload().unwrap();
        assert_eq!(payload.len(), 4 + 2 * 28);

        let decoded = Resource::decode(resource_type::COMPRESSED_TRANSFORM, &payload)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, resource);

        let Resource::CompressedTransform(res) = decoded;
        assert_eq!(res.space(4).unwrap().max.x, 100.0);
        assert!(res.space(1).is_none());
    }

    #[test]
    fn test_unknown_resource_is_none() {
        assert_eq!(Resource::decode(77, &[]).unwrap(), None);
    }
}
