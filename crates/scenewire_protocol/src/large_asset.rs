//! # Large-Asset Channel
//!
//! Blobs too big for a transaction travel on their own channel, one
//! transfer per [`LargeAssetId`].
//!
//! ```text
//! Requested ──Reply──► Replied ──Chunk──► Streaming ──Chunk(sum == size)──► Completed
//!     │                   │                   │
//!     └───────────────────┴───────Error───────┴──────────────────────────► Errored
//! ```
//!
//! The receiver tracks every transfer with a [`Transfer`]. Chunks that would
//! carry the running total past the announced size are refused before any of
//! their bytes are kept.

use std::collections::HashMap;
use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use parking_lot::Mutex;
use scenewire_codec::{
    read_bytes, read_discriminant, read_string, short_string, write_bytes, write_discriminant,
    write_string, CodecResult, Fixed, WireReader, WireWriter,
};
use scenewire_shared::constants::LARGE_ASSET_NAME_CAPACITY;
use scenewire_shared::LargeAssetId;

use crate::error::{ProtocolError, ProtocolResult, TransferFault};

/// Upper bound on memory reserved up front for an announced asset size.
const PREALLOCATION_LIMIT: u64 = 1 << 20;

scenewire_codec::wire_enum! {
    /// Large-asset channel message tag.
    pub enum LargeAssetMessageId: u8 {
        /// Client asks for an asset.
        Request = 1,
        /// Server announces size and name.
        Reply = 2,
        /// A slice of the asset.
        Chunk = 3,
        /// The server gives up on the transfer.
        Error = 4,
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct LargeAssetReplyFixed {
    id: u64,
    asset_size: u64,
    name: [u8; LARGE_ASSET_NAME_CAPACITY],
}

impl Fixed for LargeAssetReplyFixed {
    fn validate(&self) -> CodecResult<()> {
        short_string::validate(&self.name)
    }
}

/// Announcement of an asset's size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LargeAssetReply {
    /// The asset.
    pub id: LargeAssetId,
    /// Total bytes the chunks will carry.
    pub asset_size: u64,
    /// Display name.
    pub name: String,
}

/// A message on a large-asset channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LargeAssetMessage {
    /// Ask for an asset.
    Request {
        /// The asset.
        id: LargeAssetId,
    },
    /// Size and name of the requested asset.
    Reply(LargeAssetReply),
    /// The next slice of the asset.
    Chunk(Vec<u8>),
    /// Terminal failure.
    Error(String),
}

impl LargeAssetMessage {
    /// The wire tag.
    #[must_use]
    pub const fn id(&self) -> LargeAssetMessageId {
        match self {
            Self::Request { .. } => LargeAssetMessageId::Request,
            Self::Reply(_) => LargeAssetMessageId::Reply,
            Self::Chunk(_) => LargeAssetMessageId::Chunk,
            Self::Error(_) => LargeAssetMessageId::Error,
        }
    }

    /// Appends the encoded message.
    ///
    /// # Errors
    ///
    /// Returns `ShortStringTooLong` if a reply name exceeds its field.
    pub fn encode(&self, w: &mut WireWriter) -> CodecResult<()> {
        write_discriminant(w, self.id());
        match self {
            Self::Request { id } => w.write_u64(*id),
            Self::Reply(reply) => w.write_fixed(&LargeAssetReplyFixed {
                id: reply.id,
                asset_size: reply.asset_size,
                name: short_string::encode(&reply.name)?,
            }),
            Self::Chunk(bytes) => write_bytes::<u64>(w, bytes)?,
            Self::Error(message) => write_string::<u32>(w, message)?,
        }
        Ok(())
    }

    /// Encodes into a fresh buffer.
    ///
    /// # Errors
    ///
    /// Same as [`LargeAssetMessage::encode`].
    pub fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        let mut w = WireWriter::new();
        self.encode(&mut w)?;
        Ok(w.into_bytes())
    }

    /// Reads one message.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDiscriminant` for a tag outside the table and any
    /// decode error of the body.
    pub fn decode(r: &mut WireReader<'_>) -> CodecResult<Self> {
        Ok(match read_discriminant::<LargeAssetMessageId>(r)? {
            LargeAssetMessageId::Request => Self::Request { id: r.read_u64()? },
            LargeAssetMessageId::Reply => {
                let fixed: LargeAssetReplyFixed = r.read_fixed()?;
                Self::Reply(LargeAssetReply {
                    id: fixed.id,
                    asset_size: fixed.asset_size,
                    name: short_string::decode(&fixed.name)?.to_owned(),
                })
            }
            LargeAssetMessageId::Chunk => Self::Chunk(read_bytes::<u64>(r)?),
            LargeAssetMessageId::Error => Self::Error(read_string::<u32>(r)?),
        })
    }
}

/// State of one transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransferState {
    /// Request sent, waiting for the reply.
    Requested,
    /// Size known, no chunk yet.
    Replied,
    /// Some bytes received, fewer than the size.
    Streaming,
    /// Exactly the announced size received.
    Completed,
    /// Aborted by an error message or a protocol fault.
    Errored,
}

impl TransferState {
    /// Returns true for [`TransferState::Completed`] and
    /// [`TransferState::Errored`].
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored)
    }
}

/// Receiver-side state machine for one large asset.
#[derive(Clone, Debug)]
pub struct Transfer {
    id: LargeAssetId,
    state: TransferState,
    reply: Option<LargeAssetReply>,
    received: u64,
    error: Option<String>,
}

impl Transfer {
    /// Starts tracking a transfer whose request was just sent.
    #[must_use]
    pub const fn new(id: LargeAssetId) -> Self {
        Self {
            id,
            state: TransferState::Requested,
            reply: None,
            received: 0,
            error: None,
        }
    }

    /// The asset.
    #[must_use]
    pub const fn id(&self) -> LargeAssetId {
        self.id
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> TransferState {
        self.state
    }

    /// The reply, once received.
    #[must_use]
    pub const fn reply(&self) -> Option<&LargeAssetReply> {
        self.reply.as_ref()
    }

    /// Bytes accepted so far.
    #[must_use]
    pub const fn received(&self) -> u64 {
        self.received
    }

    /// The server's error message, if it sent one.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Applies one message from the server.
    ///
    /// # Errors
    ///
    /// Returns `TransferViolation` if the message breaks the state machine.
    /// The transfer is then [`TransferState::Errored`] unless it had already
    /// finished.
    pub fn receive(&mut self, message: &LargeAssetMessage) -> ProtocolResult<TransferState> {
        match self.step(message) {
            Ok(state) => {
                self.state = state;
                Ok(state)
            }
            Err(fault) => {
                tracing::warn!(id = self.id, state = ?self.state, %fault, "large asset transfer fault");
                if !self.state.is_terminal() {
                    self.state = TransferState::Errored;
                }
                Err(ProtocolError::TransferViolation { id: self.id, fault })
            }
        }
    }

    fn step(&mut self, message: &LargeAssetMessage) -> Result<TransferState, TransferFault> {
        if self.state.is_terminal() {
            return Err(TransferFault::AfterTerminal { state: self.state });
        }
        match message {
            LargeAssetMessage::Request { .. } => Err(TransferFault::UnexpectedRequest),
            LargeAssetMessage::Reply(reply) => {
                if self.state != TransferState::Requested {
                    return Err(TransferFault::DuplicateReply);
                }
                if reply.id != self.id {
                    return Err(TransferFault::IdMismatch {
                        expected: self.id,
                        got: reply.id,
                    });
                }
                tracing::debug!(id = self.id, size = reply.asset_size, name = %reply.name, "large asset reply");
                self.reply = Some(reply.clone());
                Ok(if reply.asset_size == 0 {
                    TransferState::Completed
                } else {
                    TransferState::Replied
                })
            }
            LargeAssetMessage::Chunk(bytes) => {
                let Some(asset_size) = self.reply.as_ref().map(|r| r.asset_size) else {
                    return Err(TransferFault::ChunkBeforeReply);
                };
                let would_reach = self.received.saturating_add(bytes.len() as u64);
                if would_reach > asset_size {
                    return Err(TransferFault::OverDelivery {
                        asset_size,
                        would_reach,
                    });
                }
                self.received = would_reach;
                Ok(if would_reach == asset_size {
                    TransferState::Completed
                } else {
                    TransferState::Streaming
                })
            }
            LargeAssetMessage::Error(text) => {
                tracing::debug!(id = self.id, error = %text, "large asset transfer errored");
                self.error = Some(text.clone());
                Ok(TransferState::Errored)
            }
        }
    }
}

/// A [`Transfer`] that also keeps the bytes.
#[derive(Clone, Debug)]
pub struct TransferAssembler {
    transfer: Transfer,
    data: Vec<u8>,
}

impl TransferAssembler {
    /// Starts assembling a transfer whose request was just sent.
    #[must_use]
    pub const fn new(id: LargeAssetId) -> Self {
        Self {
            transfer: Transfer::new(id),
            data: Vec::new(),
        }
    }

    /// The underlying state machine.
    #[must_use]
    pub const fn transfer(&self) -> &Transfer {
        &self.transfer
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> TransferState {
        self.transfer.state
    }

    /// Applies one message and keeps accepted chunk bytes.
    ///
    /// # Errors
    ///
    /// Same as [`Transfer::receive`]. Refused chunks leave the data untouched.
    pub fn receive(&mut self, message: &LargeAssetMessage) -> ProtocolResult<TransferState> {
        let state = self.transfer.receive(message)?;
        match message {
            LargeAssetMessage::Reply(reply) => {
                let reserve = reply.asset_size.min(PREALLOCATION_LIMIT);
                self.data.reserve(usize::try_from(reserve).unwrap_or(0));
            }
            LargeAssetMessage::Chunk(bytes) => self.data.extend_from_slice(bytes),
            LargeAssetMessage::Request { .. } | LargeAssetMessage::Error(_) => {}
        }
        Ok(state)
    }

    /// The assembled asset, if the transfer completed.
    #[must_use]
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        (self.transfer.state == TransferState::Completed).then_some(self.data)
    }
}

/// All transfers active on a client, keyed by asset.
///
/// Each transfer is fed from its own channel, so several may progress at
/// once; the table lock is held only for one message.
#[derive(Debug, Default)]
pub struct TransferTable {
    transfers: Mutex<HashMap<LargeAssetId, TransferAssembler>>,
}

impl TransferTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transfer whose request is about to be sent.
    ///
    /// A finished transfer for the same id is replaced.
    ///
    /// # Errors
    ///
    /// Returns `TransferViolation` with `AlreadyActive` if an unfinished
    /// transfer for `id` exists.
    pub fn begin(&self, id: LargeAssetId) -> ProtocolResult<()> {
        let mut transfers = self.transfers.lock();
        if transfers.get(&id).is_some_and(|t| !t.state().is_terminal()) {
            return Err(ProtocolError::TransferViolation {
                id,
                fault: TransferFault::AlreadyActive,
            });
        }
        transfers.insert(id, TransferAssembler::new(id));
        Ok(())
    }

    /// Feeds one message to the transfer for `id`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTransfer` if `id` was never begun, or whatever
    /// [`TransferAssembler::receive`] reports.
    pub fn feed(&self, id: LargeAssetId, message: &LargeAssetMessage) -> ProtocolResult<TransferState> {
        let mut transfers = self.transfers.lock();
        let transfer = transfers
            .get_mut(&id)
            .ok_or(ProtocolError::TransferViolation {
                id,
                fault: TransferFault::UnknownTransfer,
            })?;
        transfer.receive(message)
    }

    /// State of the transfer for `id`.
    #[must_use]
    pub fn state(&self, id: LargeAssetId) -> Option<TransferState> {
        self.transfers.lock().get(&id).map(TransferAssembler::state)
    }

    /// Removes a completed transfer and returns its bytes.
    ///
    /// Returns `None` and leaves the entry in place if it has not completed.
    pub fn take_completed(&self, id: LargeAssetId) -> Option<Vec<u8>> {
        let mut transfers = self.transfers.lock();
        if transfers.get(&id)?.state() != TransferState::Completed {
            return None;
        }
        transfers.remove(&id).and_then(TransferAssembler::into_bytes)
    }

    /// Drops a transfer whatever its state. Returns true if one existed.
    pub fn abandon(&self, id: LargeAssetId) -> bool {
        let removed = self.transfers.lock().remove(&id);
        if let Some(transfer) = &removed {
            tracing::debug!(id, state = ?transfer.state(), "large asset transfer abandoned");
        }
        removed.is_some()
    }

    /// Number of tracked transfers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transfers.lock().len()
    }

    /// Returns true if no transfer is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transfers.lock().is_empty()
    }
}

/// Byte ranges of the chunks an asset of `asset_size` is sent in.
///
/// Every range but the last spans `chunk_size` bytes. A zero-size asset has
/// no chunks.
#[derive(Clone, Debug)]
pub struct ChunkPlan {
    next: u64,
    asset_size: u64,
    chunk_size: u64,
}

impl ChunkPlan {
    /// Plans chunks of at most `chunk_size` bytes (at least one byte each).
    #[must_use]
    pub fn new(asset_size: u64, chunk_size: usize) -> Self {
        Self {
            next: 0,
            asset_size,
            chunk_size: (chunk_size as u64).max(1),
        }
    }
}

impl Iterator for ChunkPlan {
    type Item = Range<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.asset_size {
            return None;
        }
        let start = self.next;
        let end = start.saturating_add(self.chunk_size).min(self.asset_size);
        self.next = end;
        Some(start..end)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.asset_size - self.next.min(self.asset_size);
        let n = usize::try_from(left.div_ceil(self.chunk_size)).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

impl ExactSizeIterator for ChunkPlan {}

/// The full server response for an in-memory asset: reply then chunks.
#[must_use]
pub fn serve(
    id: LargeAssetId,
    name: &str,
    data: &[u8],
    chunk_size: usize,
) -> Vec<LargeAssetMessage> {
    let reply = LargeAssetMessage::Reply(LargeAssetReply {
        id,
        asset_size: data.len() as u64,
        name: name.to_owned(),
    });
    std::iter::once(reply)
        .chain(data.chunks(chunk_size.max(1)).map(|c| LargeAssetMessage::Chunk(c.to_vec())))
        .collect()
}
