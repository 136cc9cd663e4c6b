//! # Session Handshake
//!
//! The initiator opens with an [`Introduction`]; the responder answers with
//! an [`IntroductionReply`] carrying the negotiated version and where to
//! reach its large-asset service.

use bytemuck::{Pod, Zeroable};
use scenewire_codec::{
    read_sequence, short_string, write_sequence, CodecResult, Fixed, WireReader, WireWriter,
};
use scenewire_shared::constants::{NAME_CAPACITY, PROTOCOL_NAME_CAPACITY};

use crate::error::{ProtocolError, ProtocolResult};

/// Introduction flag bits.
///
/// Bit 0 requests authority. The rest are reserved and written as zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntroFlags(pub u16);

impl IntroFlags {
    /// Authority request bit.
    pub const AUTHORITY_REQUEST: u16 = 1 << 0;

    /// Returns true if the sender asks for authority.
    #[must_use]
    pub const fn authority_request(self) -> bool {
        self.0 & Self::AUTHORITY_REQUEST != 0
    }

    /// Sets or clears the authority request bit.
    #[must_use]
    pub const fn with_authority_request(self, on: bool) -> Self {
        if on {
            Self(self.0 | Self::AUTHORITY_REQUEST)
        } else {
            Self(self.0 & !Self::AUTHORITY_REQUEST)
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct IntroductionFixed {
    protocol_version: u16,
    flags: u16,
    name: [u8; NAME_CAPACITY],
}

impl Fixed for IntroductionFixed {
    fn validate(&self) -> CodecResult<()> {
        short_string::validate(&self.name)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct IntroductionReplyFixed {
    protocol_version: u16,
    flags: u16,
    session_name: [u8; NAME_CAPACITY],
    large_asset_protocol: [u8; PROTOCOL_NAME_CAPACITY],
}

impl Fixed for IntroductionReplyFixed {
    fn validate(&self) -> CodecResult<()> {
        short_string::validate(&self.session_name)?;
        short_string::validate(&self.large_asset_protocol)
    }
}

/// First message of a full session.
///
/// Wire layout: `u16 protocol_version, u16 flags, [u8; 64] name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Introduction {
    /// Highest protocol version the sender speaks.
    pub protocol_version: u16,
    /// Flag bits.
    pub flags: IntroFlags,
    /// Display name of the connecting peer.
    pub name: String,
}

impl Introduction {
    /// Encoded size in bytes.
    pub const SIZE: usize = 4 + NAME_CAPACITY;

    /// Creates an introduction.
    #[must_use]
    pub fn new(protocol_version: u16, name: impl Into<String>, authority_request: bool) -> Self {
        Self {
            protocol_version,
            flags: IntroFlags::default().with_authority_request(authority_request),
            name: name.into(),
        }
    }

    pub(crate) fn encode(&self, w: &mut WireWriter) -> CodecResult<()> {
        w.write_fixed(&IntroductionFixed {
            protocol_version: self.protocol_version,
            flags: self.flags.0,
            name: short_string::encode(&self.name)?,
        });
        Ok(())
    }

    pub(crate) fn decode(r: &mut WireReader<'_>) -> CodecResult<Self> {
        let fixed: IntroductionFixed = r.read_fixed()?;
        Ok(Self {
            protocol_version: fixed.protocol_version,
            flags: IntroFlags(fixed.flags),
            name: short_string::decode(&fixed.name)?.to_owned(),
        })
    }
}

/// Sub-protocol spoken on the large-asset channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LargeAssetProtocol {
    /// No large-asset service.
    #[default]
    None,
    /// Plain WebSocket.
    Ws,
    /// WebSocket over TLS.
    Wss,
}

impl LargeAssetProtocol {
    /// The on-wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Ws => "ws",
            Self::Wss => "wss",
        }
    }

    /// Parses an on-wire name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLargeAssetProtocol` for anything but `""`, `"ws"` or
    /// `"wss"`.
    pub fn parse(value: &str) -> ProtocolResult<Self> {
        match value {
            "" => Ok(Self::None),
            "ws" => Ok(Self::Ws),
            "wss" => Ok(Self::Wss),
            other => Err(ProtocolError::InvalidLargeAssetProtocol {
                value: other.to_owned(),
            }),
        }
    }
}

impl std::fmt::Display for LargeAssetProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Responder's answer to an [`Introduction`].
///
/// Wire layout: Fixed `u16 protocol_version, u16 flags, [u8; 64]
/// session_name, [u8; 16] large_asset_protocol`; Dyn `u16 count, u16 port*`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntroductionReply {
    /// Negotiated protocol version.
    pub protocol_version: u16,
    /// Name of the session being joined.
    pub session_name: String,
    /// Large-asset sub-protocol.
    pub large_asset_protocol: LargeAssetProtocol,
    /// Ports the large-asset service listens on.
    pub large_asset_ports: Vec<u16>,
}

impl IntroductionReply {
    pub(crate) fn encode(&self, w: &mut WireWriter) -> CodecResult<()> {
        w.write_fixed(&IntroductionReplyFixed {
            protocol_version: self.protocol_version,
            flags: 0,
            session_name: short_string::encode(&self.session_name)?,
            large_asset_protocol: short_string::encode(self.large_asset_protocol.as_str())?,
        });
        write_sequence::<u16, u16>(w, &self.large_asset_ports)
    }

    pub(crate) fn decode(r: &mut WireReader<'_>) -> ProtocolResult<Self> {
        let fixed: IntroductionReplyFixed = r.read_fixed()?;
        let large_asset_protocol =
            LargeAssetProtocol::parse(short_string::decode(&fixed.large_asset_protocol)?)?;
        Ok(Self {
            protocol_version: fixed.protocol_version,
            session_name: short_string::decode(&fixed.session_name)?.to_owned(),
            large_asset_protocol,
            large_asset_ports: read_sequence::<u16, u16>(r)?,
        })
    }
}

/// Picks the version to run with a peer that speaks up to `peer`.
///
/// Accepts any peer version in `[min, max]` and answers with the lower of
/// the two sides; a peer below `min` is refused.
#[must_use]
pub fn negotiate_version(peer: u16, min: u16, max: u16) -> Option<u16> {
    (min..=max).contains(&peer).then(|| peer.min(max))
}
