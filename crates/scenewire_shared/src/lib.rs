//! # SCENEWIRE Shared
//!
//! Common types used by every SCENEWIRE crate: the opaque identifiers that
//! address entities, components, resources and assets, the geometric
//! primitives carried inside payloads, and the protocol constants baked into
//! both sides of a connection.
//!
//! This crate has no codec logic. The layouts here are plain `Pod` structs so
//! the codec can copy them verbatim.

#![deny(unsafe_code)]

pub mod constants;
pub mod ids;
pub mod math;

pub use constants::{
    DEFAULT_LARGE_ASSET_PORT, DEFAULT_PORT, MIN_PROTOCOL_VERSION, PROTOCOL_VERSION,
};
pub use ids::{
    AssetId, AssetKey, AssetTypeId, ComponentTypeId, EntityId, LargeAssetId, ResourceTypeId,
    RpcEndpointId, TransactionId,
};
pub use math::{UnitQuat, Uuid, Vec3};
