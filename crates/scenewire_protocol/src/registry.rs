//! # Component Payload Registry
//!
//! A MODIFY_COMPONENT block holds `(entity, payload)` entries back to back,
//! and the payload length is not on the wire. The registry supplies it: for
//! each known component type, the shape of its payload.
//!
//! A component type missing from the registry is not an error. The whole
//! MODIFY_COMPONENT block is skipped by its `message_size`.

use std::collections::HashMap;

use scenewire_codec::{CodecError, CodecResult, WireReader};
use scenewire_shared::ComponentTypeId;

use crate::catalog::components;

/// Width of a length prefix chosen at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CountWidth {
    /// 8-bit count.
    U8,
    /// 16-bit count.
    U16,
    /// 32-bit count.
    U32,
    /// 64-bit count.
    U64,
}

impl CountWidth {
    /// Encoded size of the count in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }

    fn read(self, r: &mut WireReader<'_>) -> CodecResult<u64> {
        match self {
            Self::U8 => r.read_u8().map(u64::from),
            Self::U16 => r.read_u16().map(u64::from),
            Self::U32 => r.read_u32().map(u64::from),
            Self::U64 => r.read_u64(),
        }
    }
}

/// Shape of one component payload on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadLayout {
    /// Exactly this many bytes (zero for marker components).
    Fixed(usize),
    /// A count followed by that many fixed-size elements.
    Sequence {
        /// Width of the count.
        count: CountWidth,
        /// Size of each element in bytes.
        element_size: usize,
    },
}

impl PayloadLayout {
    /// Smallest possible encoded size.
    #[must_use]
    pub const fn min_size(self) -> usize {
        match self {
            Self::Fixed(size) => size,
            Self::Sequence { count, .. } => count.size(),
        }
    }

    /// Takes one payload off the reader, returned as its raw wire bytes.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput`, or `LengthOverflow` if a sequence count
    /// exceeds the remaining bytes.
    pub fn read_payload<'a>(self, r: &mut WireReader<'a>) -> CodecResult<&'a [u8]> {
        let start = r.clone();
        let len = match self {
            Self::Fixed(size) => size,
            Self::Sequence {
                count,
                element_size,
            } => {
                let n = count.read(r)?;
                let remaining = r.remaining();
                let body = n
                    .checked_mul(element_size as u64)
                    .filter(|&total| total <= remaining as u64)
                    .ok_or(CodecError::LengthOverflow {
                        count: n,
                        min_element_size: element_size,
                        remaining,
                    })?;
                count.size() + body as usize
            }
        };
        let mut whole = start;
        let bytes = whole.read_slice(len)?;
        *r = whole;
        Ok(bytes)
    }
}

/// Maps component types to payload layouts.
#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    layouts: HashMap<ComponentTypeId, PayloadLayout>,
}

impl ComponentRegistry {
    /// Creates a registry that knows no component types.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            layouts: HashMap::new(),
        }
    }

    /// Creates a registry holding every built-in component type.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for (component_type, layout) in components::builtin_layouts() {
            registry.register(component_type, layout);
        }
        registry
    }

    /// Registers (or replaces) the layout of a component type.
    pub fn register(&mut self, component_type: ComponentTypeId, layout: PayloadLayout) {
        self.layouts.insert(component_type, layout);
    }

    /// Forgets a component type. Later blocks of this type are skipped.
    pub fn unregister(&mut self, component_type: ComponentTypeId) -> Option<PayloadLayout> {
        self.layouts.remove(&component_type)
    }

    /// Layout of a component type, if known.
    #[must_use]
    pub fn layout(&self, component_type: ComponentTypeId) -> Option<PayloadLayout> {
        self.layouts.get(&component_type).copied()
    }

    /// Returns true if the type is known.
    #[must_use]
    pub fn contains(&self, component_type: ComponentTypeId) -> bool {
        self.layouts.contains_key(&component_type)
    }

    /// Number of known component types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    /// Returns true if no component type is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
