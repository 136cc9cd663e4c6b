//! Identifier types.
//!
//! All identifiers are opaque unsigned integers on the wire. They carry no
//! lifecycle of their own; content messages create and destroy what they name.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies an entity. Assigned by whichever side issues `CREATE_ENTITIES`.
pub type EntityId = u32;

/// Identifies a component type.
pub type ComponentTypeId = u32;

/// Identifies a process-wide resource type.
pub type ResourceTypeId = u32;

/// Identifies an asset type. Each asset type is its own [`AssetId`] namespace.
pub type AssetTypeId = u32;

/// Identifies an asset within its asset type.
pub type AssetId = u32;

/// Identifies a blob delivered over a large-asset channel.
pub type LargeAssetId = u64;

/// Correlates a named transaction with its reply.
pub type TransactionId = u32;

/// RPC endpoint invoked by activation components.
pub type RpcEndpointId = u32;

/// Fully qualified asset address: `(type, id)`.
///
/// Two asset types may reuse the same numeric id without colliding, so an
/// asset is only ever looked up by the pair.
///
/// Wire layout: `u32 asset_type, u32 asset_id` (8 bytes).
#[repr(C)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable,
    Serialize, Deserialize,
)]
pub struct AssetKey {
    /// Asset type namespace.
    pub asset_type: AssetTypeId,
    /// Id within the namespace.
    pub asset_id: AssetId,
}

impl AssetKey {
    /// Size in bytes.
    pub const SIZE: usize = 8;

    /// Creates a new asset key.
    #[inline]
    #[must_use]
    pub const fn new(asset_type: AssetTypeId, asset_id: AssetId) -> Self {
        Self { asset_type, asset_id }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.asset_type, self.asset_id)
    }
}
