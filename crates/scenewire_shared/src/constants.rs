//! # Protocol Constants
//!
//! Values both peers must agree on. Changing any of these is a protocol
//! version bump.

// =============================================================================
// VERSIONING
// =============================================================================

/// Protocol version spoken by this build.
pub const PROTOCOL_VERSION: u16 = 1;

/// Oldest protocol version this build is willing to negotiate down to.
pub const MIN_PROTOCOL_VERSION: u16 = 1;

// =============================================================================
// NETWORK DEFAULTS
// =============================================================================

/// Default TCP port for the primary channel.
pub const DEFAULT_PORT: u16 = 50000;

/// Default port advertised for the large-asset channel.
pub const DEFAULT_LARGE_ASSET_PORT: u16 = 50001;

// =============================================================================
// SHORT STRING CAPACITIES
// =============================================================================

/// Capacity of peer and session names in the handshake and probe messages.
pub const NAME_CAPACITY: usize = 64;

/// Capacity of the large-asset sub-protocol name.
pub const PROTOCOL_NAME_CAPACITY: usize = 16;

/// Capacity of the NAME component label.
pub const COMPONENT_NAME_CAPACITY: usize = 32;

/// Capacity of a large asset's display name.
pub const LARGE_ASSET_NAME_CAPACITY: usize = 64;

// =============================================================================
// LIMITS
// =============================================================================

/// Icons in a probe reply above this size may be discarded by the receiver.
///
/// The wire allows a full `u32` length; 2^24 bytes (~16 MB) is the practical cap.
pub const MAX_PROBE_ICON_SIZE: usize = 1 << 24;
