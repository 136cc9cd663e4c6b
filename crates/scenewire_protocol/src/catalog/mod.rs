//! # Typed Payload Catalog
//!
//! The content protocol treats component, resource and asset payloads as
//! bytes. This catalog gives the built-in types their structure.
//!
//! Every typed decode must consume exactly the payload it was handed
//! (`FrameSizeMismatch` otherwise). A type outside the catalog decodes to
//! `None`: unrecognized, not invalid.

pub mod assets;
pub mod components;
pub mod resources;

pub use assets::{asset_type, Asset, BufferAsset, BufferSource};
pub use components::{component_type, Component};
pub use resources::{resource_type, CompressedTransformResource, QuantizationSpace, Resource};
