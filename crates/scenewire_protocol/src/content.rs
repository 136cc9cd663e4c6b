//! # Content Messages
//!
//! The closed set of scene mutations a transaction carries.
//!
//! ```text
//! ┌──────────────────┬───────────────────────┬─────────────────────────────┐
//! │ u32 discriminant │ Fixed (per case)      │ Dyn (per case)              │
//! ├──────────────────┼───────────────────────┼─────────────────────────────┤
//! │ CREATE_ENTITIES  │                       │ u32 count, EntityID*        │
//! │ DELETE_ENTITIES  │                       │ u32 count, EntityID*        │
//! │ MODIFY_COMPONENT │ type, message_size    │ u32 count, (EntityID, ..)*  │
//! │ DELETE_COMPONENT │ type                  │ u32 count, EntityID*        │
//! │ MODIFY_RESOURCE  │ type, message_size    │ opaque bytes                │
//! │ DELETE_RESOURCE  │ type                  │                             │
//! │ MODIFY_ASSET     │ type, id, message_size│ opaque bytes                │
//! │ DELETE_ASSET     │ type, id              │                             │
//! └──────────────────┴───────────────────────┴─────────────────────────────┘
//! ```
//!
//! The three MODIFY cases are framed: their `message_size` lets a receiver
//! that does not know the type step over the payload.

use bytemuck::{Pod, Zeroable};
use scenewire_codec::{
    read_discriminant, read_sequence, read_sequence_with, write_discriminant, write_framed,
    write_sequence, write_sequence_with, CodecResult, Fixed, Frame, FramedHeader, WireReader,
    WireWriter,
};
use scenewire_shared::{AssetKey, ComponentTypeId, EntityId, ResourceTypeId};

use crate::registry::ComponentRegistry;

scenewire_codec::wire_enum! {
    /// Discriminant of [`ContentMessage`].
    pub enum ContentMessageId: u32 {
        /// Declare new entities.
        CreateEntities = 0,
        /// Remove entities and their components.
        DeleteEntities = 1,
        /// Add or replace a component on entities.
        ModifyComponent = 2,
        /// Remove a component from entities.
        DeleteComponent = 3,
        /// Replace a resource.
        ModifyResource = 4,
        /// Remove a resource.
        DeleteResource = 5,
        /// Register or update an asset.
        ModifyAsset = 6,
        /// Remove an asset registration.
        DeleteAsset = 7,
    }
}

/// Fixed part of MODIFY_COMPONENT.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ComponentHeader {
    /// Component type of every entry.
    pub component_type: ComponentTypeId,
    /// Byte length of the entry list, count included.
    pub message_size: u32,
}

/// Fixed part of MODIFY_RESOURCE.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ResourceHeader {
    /// Resource type.
    pub resource_type: ResourceTypeId,
    /// Byte length of the payload.
    pub message_size: u32,
}

/// Fixed part of MODIFY_ASSET.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct AssetHeader {
    /// Asset type and id.
    pub key: AssetKey,
    /// Byte length of the payload.
    pub message_size: u32,
}

macro_rules! framed_header {
    ($($ty:ty),+) => {
        $(
            impl Fixed for $ty {}

            impl FramedHeader for $ty {
                fn message_size(&self) -> u32 {
                    self.message_size
                }
            }
        )+
    };
}

framed_header!(ComponentHeader, ResourceHeader, AssetHeader);

/// One entry of a MODIFY_COMPONENT block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentEntry {
    /// Target entity. Created by the receiver if missing.
    pub entity: EntityId,
    /// Component payload in wire form. Its length is given by the component
    /// type's registered layout.
    pub payload: Vec<u8>,
}

/// A scene mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentMessage {
    /// Declare new entity identifiers.
    CreateEntities(Vec<EntityId>),
    /// Remove entities and all their components.
    DeleteEntities(Vec<EntityId>),
    /// Add or replace one component type on each listed entity.
    ModifyComponent {
        /// Component type.
        component_type: ComponentTypeId,
        /// Per-entity payloads.
        entries: Vec<ComponentEntry>,
    },
    /// Remove one component type from each listed entity.
    DeleteComponent {
        /// Component type.
        component_type: ComponentTypeId,
        /// Entities to strip.
        entities: Vec<EntityId>,
    },
    /// Replace a process-wide resource.
    ModifyResource {
        /// Resource type.
        resource_type: ResourceTypeId,
        /// Opaque payload.
        payload: Vec<u8>,
    },
    /// Remove a resource.
    DeleteResource {
        /// Resource type.
        resource_type: ResourceTypeId,
    },
    /// Register or update an asset.
    ModifyAsset {
        /// Asset type and id.
        key: AssetKey,
        /// Opaque payload.
        payload: Vec<u8>,
    },
    /// Remove an asset registration. Handles to it stay valid.
    DeleteAsset {
        /// Asset type and id.
        key: AssetKey,
    },
    /// A MODIFY_COMPONENT whose type the receiver's registry does not know.
    ///
    /// Produced only by decoding; the payload was skipped, not kept.
    UnrecognizedComponent {
        /// The unknown component type.
        component_type: ComponentTypeId,
        /// Bytes skipped.
        message_size: u32,
    },
}

impl ContentMessage {
    /// Smallest encoded size of any content message: a discriminant plus a
    /// 4-byte count or Fixed field.
    pub const MIN_WIRE_SIZE: usize = 8;

    /// The wire discriminant.
    #[must_use]
    pub const fn id(&self) -> ContentMessageId {
        match self {
            Self::CreateEntities(_) => ContentMessageId::CreateEntities,
            Self::DeleteEntities(_) => ContentMessageId::DeleteEntities,
            Self::ModifyComponent { .. } | Self::UnrecognizedComponent { .. } => {
                ContentMessageId::ModifyComponent
            }
            Self::DeleteComponent { .. } => ContentMessageId::DeleteComponent,
            Self::ModifyResource { .. } => ContentMessageId::ModifyResource,
            Self::DeleteResource { .. } => ContentMessageId::DeleteResource,
            Self::ModifyAsset { .. } => ContentMessageId::ModifyAsset,
            Self::DeleteAsset { .. } => ContentMessageId::DeleteAsset,
        }
    }

    /// Returns true for entries that were skipped on decode.
    #[must_use]
    pub const fn is_unrecognized(&self) -> bool {
        matches!(self, Self::UnrecognizedComponent { .. })
    }

    /// Appends the encoded message.
    ///
    /// Component payloads are written verbatim and must already match their
    /// type's layout. An unrecognized entry has no payload left, so it is
    /// written as an empty block of its type; [`encode_content_list`] leaves
    /// such entries out entirely.
    ///
    /// # Errors
    ///
    /// Returns `CountTooLarge` if a list or payload exceeds its size field.
    pub fn encode(&self, w: &mut WireWriter) -> CodecResult<()> {
        write_discriminant(w, self.id());
        match self {
            Self::CreateEntities(ids) | Self::DeleteEntities(ids) => {
                write_sequence::<u32, EntityId>(w, ids)?;
            }
            Self::ModifyComponent {
                component_type,
                entries,
            } => {
                let header = ComponentHeader {
                    component_type: *component_type,
                    message_size: 0,
                };
                write_framed(w, &header, |w| {
                    write_sequence_with::<u32, _, _>(w, entries, |w, entry| {
                        w.write_u32(entry.entity);
                        w.write_raw(&entry.payload);
                        Ok(())
                    })
                })?;
            }
            Self::DeleteComponent {
                component_type,
                entities,
            } => {
                w.write_u32(*component_type);
                write_sequence::<u32, EntityId>(w, entities)?;
            }
            Self::ModifyResource {
                resource_type,
                payload,
            } => {
                let header = ResourceHeader {
                    resource_type: *resource_type,
                    message_size: 0,
                };
                write_framed(w, &header, |w| {
                    w.write_raw(payload);
                    Ok(())
                })?;
            }
            Self::DeleteResource { resource_type } => w.write_u32(*resource_type),
            Self::ModifyAsset { key, payload } => {
                let header = AssetHeader {
                    key: *key,
                    message_size: 0,
                };
                write_framed(w, &header, |w| {
                    w.write_raw(payload);
                    Ok(())
                })?;
            }
            Self::DeleteAsset { key } => w.write_pod(key),
            Self::UnrecognizedComponent { component_type, .. } => {
                tracing::debug!(
                    component_type,
                    "writing unrecognized component block as empty"
                );
                let header = ComponentHeader {
                    component_type: *component_type,
                    message_size: 0,
                };
                write_framed(w, &header, |w| {
                    w.write_u32(0);
                    Ok(())
                })?;
            }
        }
        Ok(())
    }

    /// Reads one content message.
    ///
    /// A MODIFY_COMPONENT of a type missing from `registry` is skipped by its
    /// `message_size` and returned as [`ContentMessage::UnrecognizedComponent`].
    ///
    /// # Errors
    ///
    /// Returns `UnknownDiscriminant` for a tag outside the case table,
    /// `FrameSizeMismatch` if a known payload disagrees with its
    /// `message_size`, and any lower-level codec error.
    pub fn decode(r: &mut WireReader<'_>, registry: &ComponentRegistry) -> CodecResult<Self> {
        let message = match read_discriminant::<ContentMessageId>(r)? {
            ContentMessageId::CreateEntities => Self::CreateEntities(read_sequence::<u32, _>(r)?),
            ContentMessageId::DeleteEntities => Self::DeleteEntities(read_sequence::<u32, _>(r)?),
            ContentMessageId::ModifyComponent => Self::decode_component_block(r, registry)?,
            ContentMessageId::DeleteComponent => Self::DeleteComponent {
                component_type: r.read_u32()?,
                entities: read_sequence::<u32, _>(r)?,
            },
            ContentMessageId::ModifyResource => {
                let header: ResourceHeader = r.read_fixed()?;
                let frame = Frame::open(r, header.message_size())?;
                Self::ModifyResource {
                    resource_type: header.resource_type,
                    payload: frame.into_bytes().to_vec(),
                }
            }
            ContentMessageId::DeleteResource => Self::DeleteResource {
                resource_type: r.read_u32()?,
            },
            ContentMessageId::ModifyAsset => {
                let header: AssetHeader = r.read_fixed()?;
                let frame = Frame::open(r, header.message_size())?;
                Self::ModifyAsset {
                    key: header.key,
                    payload: frame.into_bytes().to_vec(),
                }
            }
            ContentMessageId::DeleteAsset => Self::DeleteAsset { key: r.read_pod()? },
        };
        Ok(message)
    }

    fn decode_component_block(
        r: &mut WireReader<'_>,
        registry: &ComponentRegistry,
    ) -> CodecResult<Self> {
        let header: ComponentHeader = r.read_fixed()?;
        let frame = Frame::open(r, header.message_size())?;
        let Some(layout) = registry.layout(header.component_type) else {
            tracing::debug!(
                component_type = header.component_type,
                message_size = header.message_size,
                "skipping unrecognized component type"
            );
            let _ = frame.skip();
            return Ok(Self::UnrecognizedComponent {
                component_type: header.component_type,
                message_size: header.message_size,
            });
        };
        let entries = frame.decode_exact(|body| {
            read_sequence_with::<u32, _, _>(body, 4 + layout.min_size(), |body| {
                Ok(ComponentEntry {
                    entity: body.read_u32()?,
                    payload: layout.read_payload(body)?.to_vec(),
                })
            })
        })?;
        Ok(Self::ModifyComponent {
            component_type: header.component_type,
            entries,
        })
    }
}

/// Writes a `u32`-counted list of content messages, leaving out entries
/// that were skipped on decode.
///
/// # Errors
///
/// Same as [`ContentMessage::encode`].
pub fn encode_content_list(w: &mut WireWriter, messages: &[ContentMessage]) -> CodecResult<()> {
    let encodable: Vec<&ContentMessage> = messages.iter().filter(|m| !m.is_unrecognized()).collect();
    if encodable.len() != messages.len() {
        tracing::debug!(
            dropped = messages.len() - encodable.len(),
            "dropping unrecognized content entries"
        );
    }
    write_sequence_with::<u32, _, _>(w, &encodable, |w, m| m.encode(w))
}

/// Reads a `u32`-counted list of content messages.
///
/// # Errors
///
/// Same as [`ContentMessage::decode`].
pub fn decode_content_list(
    r: &mut WireReader<'_>,
    registry: &ComponentRegistry,
) -> CodecResult<Vec<ContentMessage>> {
    read_sequence_with::<u32, _, _>(r, ContentMessage::MIN_WIRE_SIZE, |r| {
        ContentMessage::decode(r, registry)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::components::component_type;
    use scenewire_codec::CodecError;

    fn encode(message: &ContentMessage) -> Vec<u8> {
        let mut w = WireWriter::new();
        message.encode(&mut w).unwrap();
        w.into_bytes()
    }

    #[test]
    fn test_create_entities_layout() {
        let bytes = encode(&ContentMessage::CreateEntities(vec![7, 8]));
        assert_eq!(bytes, [0, 0, 0, 0, 2, 0, 0, 0, 7, 0, 0, 0, 8, 0, 0, 0]);
    }

    #[test]
    fn test_modify_component_message_size_covers_entries() {
        let message = ContentMessage::ModifyComponent {
            component_type: component_type::CHILD_OF,
            entries: vec![ComponentEntry {
                entity: 3,
                payload: vec![1, 0, 0, 0],
            }],
        };
        let bytes = encode(&message);
        // discriminant, type, message_size, then count + entity + payload
        assert_eq!(bytes.len(), 4 + 8 + 12);
        assert_eq!(&bytes[8..12], &12u32.to_le_bytes());

        let registry = ComponentRegistry::with_builtins();
        let mut r = WireReader::new(&bytes);
        assert_eq!(ContentMessage::decode(&mut r, &registry).unwrap(), message);
        assert!(r.is_exhausted());
    }

    #[test]
    fn test_unknown_component_is_skipped() {
        let message = ContentMessage::ModifyComponent {
            component_type: 9999,
            entries: vec![ComponentEntry {
                entity: 1,
                payload: vec![0xAB; 5],
            }],
        };
        let mut bytes = encode(&message);
        bytes.extend(encode(&ContentMessage::DeleteResource { resource_type: 4 }));

        let registry = ComponentRegistry::with_builtins();
        let mut r = WireReader::new(&bytes);
        assert_eq!(
            ContentMessage::decode(&mut r, &registry).unwrap(),
            ContentMessage::UnrecognizedComponent {
                component_type: 9999,
                message_size: 13,
            }
        );
        assert_eq!(
            ContentMessage::decode(&mut r, &registry).unwrap(),
            ContentMessage::DeleteResource { resource_type: 4 }
        );
    }

    #[test]
    fn test_payload_disagreeing_with_layout_is_mismatch() {
        // CHILD_OF payloads are 4 bytes; this entry carries 5.
        let message = ContentMessage::ModifyComponent {
            component_type: component_type::CHILD_OF,
            entries: vec![ComponentEntry {
                entity: 1,
                payload: vec![1, 2, 3, 4, 5],
            }],
        };
        let bytes = encode(&message);
        let mut r = WireReader::new(&bytes);
        let err = ContentMessage::decode(&mut r, &ComponentRegistry::with_builtins()).unwrap_err();
        assert!(matches!(err, CodecError::FrameSizeMismatch { .. }));
    }

    #[test]
    fn test_resource_and_asset_round_trip() {
        let registry = ComponentRegistry::empty();
        for message in [
            ContentMessage::ModifyResource {
                resource_type: 1,
                payload: vec![1, 2, 3],
            },
            ContentMessage::ModifyAsset {
                key: AssetKey::new(0, 12),
                payload: vec![],
            },
            ContentMessage::DeleteAsset {
                key: AssetKey::new(10, 3),
            },
            ContentMessage::DeleteComponent {
                component_type: 4,
                entities: vec![1, 2],
            },
        ] {
            let bytes = encode(&message);
            let mut r = WireReader::new(&bytes);
            assert_eq!(ContentMessage::decode(&mut r, &registry).unwrap(), message);
            assert!(r.is_exhausted());
        }
    }

    #[test]
    fn test_unknown_content_discriminant() {
        let mut r = WireReader::new(&[8, 0, 0, 0, 0, 0, 0, 0]);
        let err = ContentMessage::decode(&mut r, &ComponentRegistry::empty()).unwrap_err();
        assert!(matches!(err, CodecError::UnknownDiscriminant { value: 8, .. }));
    }

    #[test]
    fn test_oversized_message_size_is_truncation() {
        let mut w = WireWriter::new();
        write_discriminant(&mut w, ContentMessageId::ModifyResource);
        w.write_u32(1);
        w.write_u32(100);
        w.write_raw(&[0; 10]);
        let bytes = w.into_bytes();
        let mut r = WireReader::new(&bytes);
        let err = ContentMessage::decode(&mut r, &ComponentRegistry::empty()).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedInput { .. }));
    }

    #[test]
    fn test_content_list_drops_unrecognized() {
        let messages = vec![
            ContentMessage::UnrecognizedComponent {
                component_type: 500,
                message_size: 10,
            },
            ContentMessage::DeleteEntities(vec![1]),
        ];
        let mut w = WireWriter::new();
        encode_content_list(&mut w, &messages).unwrap();
        let mut r = WireReader::new(w.as_slice());
        let decoded = decode_content_list(&mut r, &ComponentRegistry::empty()).unwrap();
        assert_eq!(decoded, vec![ContentMessage::DeleteEntities(vec![1])]);
    }
}
