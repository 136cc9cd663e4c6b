//! Built-in component types and their payloads.

use bytemuck::{Pod, Zeroable};
use scenewire_codec::{
    compress_quat, compress_vec3, decompress_quat, decompress_vec3, read_discriminant,
    read_sequence, short_string, write_discriminant, write_sequence, CodecResult,
    CompressedQuat, CompressedVec3, Frame, WireDecode, WireEncode, WireReader, WireWriter,
};
use scenewire_shared::constants::COMPONENT_NAME_CAPACITY;
use scenewire_shared::{AssetId, ComponentTypeId, EntityId, RpcEndpointId, UnitQuat, Vec3};

use crate::catalog::resources::QuantizationSpace;
use crate::content::{ComponentEntry, ContentMessage};
use crate::registry::{CountWidth, PayloadLayout};

/// Built-in component type identifiers.
pub mod component_type {
    use scenewire_shared::ComponentTypeId;

    /// Display name.
    pub const NAME: ComponentTypeId = 1;
    /// Full-precision transform.
    pub const TRANSFORM: ComponentTypeId = 4;
    /// Quantized transform.
    pub const COMPRESSED_TRANSFORM: ComponentTypeId = 5;
    /// Quantization space used by `COMPRESSED_TRANSFORM`.
    pub const COMPRESSED_TRANSFORM_SPACE: ComponentTypeId = 6;
    /// Marker: the entity accepts interaction.
    pub const INTERACTIVE: ComponentTypeId = 8;
    /// Translation capability.
    pub const CAN_TRANSLATE: ComponentTypeId = 9;
    /// Rotation capability.
    pub const CAN_ROTATE: ComponentTypeId = 10;
    /// Scaling capability.
    pub const CAN_SCALE: ComponentTypeId = 11;
    /// Endpoints invoked on activation.
    pub const ACTIVATE: ComponentTypeId = 15;
    /// Render visibility.
    pub const VISIBLE: ComponentTypeId = 20;
    /// Parent entity.
    pub const CHILD_OF: ComponentTypeId = 25;
    /// Mesh asset reference.
    pub const MESH: ComponentTypeId = 50;
    /// Material asset reference.
    pub const MATERIAL: ComponentTypeId = 51;
}

/// Payload layouts of every built-in component type.
#[must_use]
pub fn builtin_layouts() -> [(ComponentTypeId, PayloadLayout); 13] {
    use component_type as ct;
    [
        (ct::NAME, PayloadLayout::Fixed(COMPONENT_NAME_CAPACITY)),
        (ct::TRANSFORM, PayloadLayout::Fixed(TransformComponent::SIZE)),
        (
            ct::COMPRESSED_TRANSFORM,
            PayloadLayout::Fixed(CompressedTransformComponent::SIZE),
        ),
        (ct::COMPRESSED_TRANSFORM_SPACE, PayloadLayout::Fixed(4)),
        (ct::INTERACTIVE, PayloadLayout::Fixed(0)),
        (ct::CAN_TRANSLATE, PayloadLayout::Fixed(AllowedAxis::SIZE)),
        (ct::CAN_ROTATE, PayloadLayout::Fixed(AllowedAxis::SIZE)),
        (ct::CAN_SCALE, PayloadLayout::Fixed(AllowedAxis::SIZE)),
        (
            ct::ACTIVATE,
            PayloadLayout::Sequence {
                count: CountWidth::U8,
                element_size: 4,
            },
        ),
        (ct::VISIBLE, PayloadLayout::Fixed(1)),
        (ct::CHILD_OF, PayloadLayout::Fixed(4)),
        (ct::MESH, PayloadLayout::Fixed(4)),
        (ct::MATERIAL, PayloadLayout::Fixed(4)),
    ]
}

/// Position, rotation and scale relative to the parent (or the world).
///
/// Wire layout: `Vec3 position, UnitQuat rotation, Vec3 scale` (40 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TransformComponent {
    /// Translation.
    pub position: Vec3,
    /// Rotation. Must be unit-norm.
    pub rotation: UnitQuat,
    /// Per-axis scale.
    pub scale: Vec3,
}

impl TransformComponent {
    /// Size in bytes.
    pub const SIZE: usize = 40;

    /// The identity transform.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: UnitQuat::IDENTITY,
        scale: Vec3::ONE,
    };
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self::IDENTITY
    }
}

scenewire_codec::impl_wire_fixed!(TransformComponent);

/// Quantized transform.
///
/// Wire layout: `[u16; 3] position, u32 rotation, f32 uniform_scale`
/// (14 bytes, unaligned, so encoded field by field).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CompressedTransformComponent {
    /// Position quantized inside the entity's quantization space.
    pub position: CompressedVec3,
    /// Smallest-three rotation.
    pub rotation: CompressedQuat,
    /// Scale applied on all three axes.
    pub uniform_scale: f32,
}

impl CompressedTransformComponent {
    /// Size in bytes.
    pub const SIZE: usize = 14;

    /// Quantizes a transform inside `space`.
    #[must_use]
    pub fn compress(
        position: Vec3,
        rotation: UnitQuat,
        uniform_scale: f32,
        space: &QuantizationSpace,
    ) -> Self {
        Self {
            position: compress_vec3(position, space.min, space.max),
            rotation: compress_quat(rotation),
            uniform_scale,
        }
    }

    /// Restores a full transform from the space it was quantized in.
    #[must_use]
    pub fn to_transform(&self, space: &QuantizationSpace) -> TransformComponent {
        let s = self.uniform_scale;
        TransformComponent {
            position: decompress_vec3(self.position, space.min, space.max),
            rotation: decompress_quat(self.rotation),
            scale: Vec3::new(s, s, s),
        }
    }
}

impl WireEncode for CompressedTransformComponent {
    fn encode(&self, w: &mut WireWriter) -> CodecResult<()> {
        self.position.0.iter().for_each(|v| w.write_u16(*v));
        w.write_u32(self.rotation.0);
        w.write_f32(self.uniform_scale);
        Ok(())
    }
}

impl WireDecode for CompressedTransformComponent {
    const MIN_WIRE_SIZE: usize = Self::SIZE;

    fn decode(r: &mut WireReader<'_>) -> CodecResult<Self> {
        let position = CompressedVec3([r.read_u16()?, r.read_u16()?, r.read_u16()?]);
        Ok(Self {
            position,
            rotation: CompressedQuat(r.read_u32()?),
            uniform_scale: r.read_f32()?,
        })
    }
}

/// One of the three transform axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// X axis.
    X,
    /// Y axis.
    Y,
    /// Z axis.
    Z,
}

impl Axis {
    const fn shift(self) -> u8 {
        match self {
            Self::X => 0,
            Self::Y => 2,
            Self::Z => 4,
        }
    }
}

/// Per-axis bound enables, two bits per axis.
///
/// Bit `2k` enables the lower bound `a` of axis `k`, bit `2k + 1` the
/// upper bound `b`. Bits 6-7 are unused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AxisFlags(pub u8);

impl AxisFlags {
    /// The raw two-bit field of `axis`.
    #[must_use]
    pub const fn bits(self, axis: Axis) -> u8 {
        (self.0 >> axis.shift()) & 0b11
    }

    /// Returns true if the lower bound of `axis` is enforced.
    #[must_use]
    pub const fn lower_bounded(self, axis: Axis) -> bool {
        self.bits(axis) & 0b01 != 0
    }

    /// Returns true if the upper bound of `axis` is enforced.
    #[must_use]
    pub const fn upper_bounded(self, axis: Axis) -> bool {
        self.bits(axis) & 0b10 != 0
    }

    /// Sets the bound enables of `axis`.
    #[must_use]
    pub const fn with_bounds(self, axis: Axis, lower: bool, upper: bool) -> Self {
        let field = (lower as u8) | ((upper as u8) << 1);
        let cleared = self.0 & !(0b11 << axis.shift());
        Self(cleared | (field << axis.shift()))
    }
}

/// Inclusive range on one axis.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AxisRange {
    /// Lower bound.
    pub a: f32,
    /// Upper bound.
    pub b: f32,
}

/// Axes an interaction may move along, with optional bounds.
///
/// Wire layout: `u8 flags, 3 × (f32 a, f32 b)` (25 bytes).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AllowedAxis {
    /// Bound enables.
    pub flags: AxisFlags,
    /// X range.
    pub x: AxisRange,
    /// Y range.
    pub y: AxisRange,
    /// Z range.
    pub z: AxisRange,
}

impl AllowedAxis {
    /// Size in bytes.
    pub const SIZE: usize = 25;

    /// Range of `axis`.
    #[must_use]
    pub const fn range(&self, axis: Axis) -> AxisRange {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Clamps `value` on `axis` to whichever bounds are enabled.
    #[must_use]
    pub fn clamp(&self, axis: Axis, value: f32) -> f32 {
        let range = self.range(axis);
        let mut v = value;
        if self.flags.lower_bounded(axis) {
            v = v.max(range.a);
        }
        if self.flags.upper_bounded(axis) {
            v = v.min(range.b);
        }
        v
    }
}

impl WireEncode for AllowedAxis {
    fn encode(&self, w: &mut WireWriter) -> CodecResult<()> {
        w.write_u8(self.flags.0);
        for range in [self.x, self.y, self.z] {
            w.write_f32(range.a);
            w.write_f32(range.b);
        }
        Ok(())
    }
}

impl WireDecode for AllowedAxis {
    const MIN_WIRE_SIZE: usize = Self::SIZE;

    fn decode(r: &mut WireReader<'_>) -> CodecResult<Self> {
        let flags = AxisFlags(r.read_u8()?);
        let mut range = || -> CodecResult<AxisRange> {
            Ok(AxisRange {
                a: r.read_f32()?,
                b: r.read_f32()?,
            })
        };
        Ok(Self {
            flags,
            x: range()?,
            y: range()?,
            z: range()?,
        })
    }
}

scenewire_codec::wire_enum! {
    /// Render visibility of an entity.
    pub enum Visibility: u8 {
        /// Follow the parent.
        Inherited = 0,
        /// Always shown.
        Visible = 1,
        /// Always hidden.
        Invisible = 2,
    }
}

/// A typed built-in component payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Component {
    /// Display name (at most 32 bytes of UTF-8).
    Name(String),
    /// Full-precision transform.
    Transform(TransformComponent),
    /// Quantized transform.
    CompressedTransform(CompressedTransformComponent),
    /// Zone the compressed transform is quantized in.
    CompressedTransformSpace {
        /// Index into the `COMPRESSED_TRANSFORM` resource's spaces.
        zone: u32,
    },
    /// Marker: the entity accepts interaction.
    Interactive,
    /// Translation capability.
    CanTranslate(AllowedAxis),
    /// Rotation capability.
    CanRotate(AllowedAxis),
    /// Scaling capability.
    CanScale(AllowedAxis),
    /// Endpoints to call on activation, primary first.
    Activate(Vec<RpcEndpointId>),
    /// Render visibility.
    Visible(Visibility),
    /// Parent entity.
    ChildOf(EntityId),
    /// Mesh asset.
    Mesh(AssetId),
    /// Material asset.
    Material(AssetId),
}

impl Component {
    /// The component type identifier.
    #[must_use]
    pub const fn type_id(&self) -> ComponentTypeId {
        use component_type as ct;
        match self {
            Self::Name(_) => ct::NAME,
            Self::Transform(_) => ct::TRANSFORM,
            Self::CompressedTransform(_) => ct::COMPRESSED_TRANSFORM,
            Self::CompressedTransformSpace { .. } => ct::COMPRESSED_TRANSFORM_SPACE,
            Self::Interactive => ct::INTERACTIVE,
            Self::CanTranslate(_) => ct::CAN_TRANSLATE,
            Self::CanRotate(_) => ct::CAN_ROTATE,
            Self::CanScale(_) => ct::CAN_SCALE,
            Self::Activate(_) => ct::ACTIVATE,
            Self::Visible(_) => ct::VISIBLE,
            Self::ChildOf(_) => ct::CHILD_OF,
            Self::Mesh(_) => ct::MESH,
            Self::Material(_) => ct::MATERIAL,
        }
    }

    /// Encodes the payload bytes carried in a MODIFY_COMPONENT entry.
    ///
    /// # Errors
    ///
    /// Returns `ShortStringTooLong` for an oversized name and `CountTooLarge`
    /// for more than 255 activation endpoints.
    pub fn encode_payload(&self) -> CodecResult<Vec<u8>> {
        let mut w = WireWriter::new();
        match self {
            Self::Name(name) => w.write_short_string::<COMPONENT_NAME_CAPACITY>(name)?,
            Self::Transform(t) => w.write_fixed(t),
            Self::CompressedTransform(t) => t.encode(&mut w)?,
            Self::CompressedTransformSpace { zone } => w.write_u32(*zone),
            Self::Interactive => {}
            Self::CanTranslate(axes) | Self::CanRotate(axes) | Self::CanScale(axes) => {
                axes.encode(&mut w)?;
            }
            Self::Activate(endpoints) => write_sequence::<u8, RpcEndpointId>(&mut w, endpoints)?,
            Self::Visible(v) => write_discriminant(&mut w, *v),
            Self::ChildOf(id) | Self::Mesh(id) | Self::Material(id) => w.write_u32(*id),
        }
        Ok(w.into_bytes())
    }

    /// Decodes a payload of the given type.
    ///
    /// Returns `Ok(None)` for a type outside the built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns `FrameSizeMismatch` if the payload is not exactly one value,
    /// and field-level errors such as `InvalidShortString`.
    pub fn decode(type_id: ComponentTypeId, payload: &[u8]) -> CodecResult<Option<Self>> {
        use component_type as ct;
        let frame = Frame::from_bytes(payload);
        let component = match type_id {
            ct::NAME => frame.decode_exact(|r| {
                let field = r.read_array::<COMPONENT_NAME_CAPACITY>()?;
                Ok(Self::Name(short_string::decode(&field)?.to_owned()))
            })?,
            ct::TRANSFORM => frame.decode_exact(|r| r.read_fixed().map(Self::Transform))?,
            ct::COMPRESSED_TRANSFORM => {
                frame.decode_exact(|r| CompressedTransformComponent::decode(r).map(Self::CompressedTransform))?
            }
            ct::COMPRESSED_TRANSFORM_SPACE => frame
                .decode_exact(|r| Ok(Self::CompressedTransformSpace { zone: r.read_u32()? }))?,
            ct::INTERACTIVE => frame.decode_exact(|_| Ok(Self::Interactive))?,
            ct::CAN_TRANSLATE => frame.decode_exact(|r| AllowedAxis::decode(r).map(Self::CanTranslate))?,
            ct::CAN_ROTATE => frame.decode_exact(|r| AllowedAxis::decode(r).map(Self::CanRotate))?,
            ct::CAN_SCALE => frame.decode_exact(|r| AllowedAxis::decode(r).map(Self::CanScale))?,
            ct::ACTIVATE => {
                frame.decode_exact(|r| read_sequence::<u8, RpcEndpointId>(r).map(Self::Activate))?
            }
            ct::VISIBLE => frame.decode_exact(|r| read_discriminant(r).map(Self::Visible))?,
            ct::CHILD_OF => frame.decode_exact(|r| r.read_u32().map(Self::ChildOf))?,
            ct::MESH => frame.decode_exact(|r| r.read_u32().map(Self::Mesh))?,
            ct::MATERIAL => frame.decode_exact(|r| r.read_u32().map(Self::Material))?,
            _ => return Ok(None),
        };
        Ok(Some(component))
    }

    /// Decodes every entry of a MODIFY_COMPONENT block.
    ///
    /// Returns `Ok(None)` for a type outside the built-in catalog.
    ///
    /// # Errors
    ///
    /// Same as [`Component::decode`].
    pub fn decode_entries(
        component_type: ComponentTypeId,
        entries: &[ComponentEntry],
    ) -> CodecResult<Option<Vec<(EntityId, Self)>>> {
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            match Self::decode(component_type, &entry.payload)? {
                Some(component) => out.push((entry.entity, component)),
                None => return Ok(None),
            }
        }
        Ok(Some(out))
    }

    /// Builds a MODIFY_COMPONENT that sets this component on each entity.
    ///
    /// # Errors
    ///
    /// Same as [`Component::encode_payload`].
    pub fn modify(&self, entities: &[EntityId]) -> CodecResult<ContentMessage> {
        let payload = self.encode_payload()?;
        let entries = entities
            .iter()
            .map(|&entity| ComponentEntry {
                entity,
                payload: payload.clone(),
            })
            .collect();
        Ok(ContentMessage::ModifyComponent {
            component_type: self.type_id(),
            entries,
        })
    }
}

/// Builds one MODIFY_COMPONENT per component type, in first-seen order.
///
/// # Errors
///
/// Same as [`Component::encode_payload`].
pub fn modify_each(items: &[(EntityId, Component)]) -> CodecResult<Vec<ContentMessage>> {
    let mut messages: Vec<ContentMessage> = Vec::new();
    for (entity, component) in items {
        let entry = ComponentEntry {
            entity: *entity,
            payload: component.encode_payload()?,
        };
        let type_id = component.type_id();
        let existing = messages.iter_mut().find_map(|m| match m {
            ContentMessage::ModifyComponent {
                component_type,
                entries,
            } if *component_type == type_id => Some(entries),
            _ => None,
        });
        match existing {
            Some(entries) => entries.push(entry),
            None => messages.push(ContentMessage::ModifyComponent {
                component_type: type_id,
                entries: vec![entry],
            }),
        }
    }
    Ok(messages)
}
