//! # Protocol Error Types
//!
//! Decode errors terminate the connection they occurred on. Transfer faults
//! are scoped to one large-asset transfer. Application-level rejection is not
//! an error at all: it travels back as a `TransactionReply`.

use scenewire_codec::CodecError;
use scenewire_shared::LargeAssetId;
use thiserror::Error;

use crate::large_asset::TransferState;
use crate::message::MessageId;
use crate::session::SessionState;

/// Errors raised by the protocol layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Wire-level decode or encode failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A recognized message whose payload this implementation cannot parse.
    ///
    /// The primary channel carries no outer length, so the stream cannot
    /// continue past it.
    #[error("unsupported message {id:?}")]
    UnsupportedMessage {
        /// The message identifier.
        id: MessageId,
    },

    /// A message that is not legal in the current session state.
    #[error("{message:?} is not allowed while {state:?}")]
    SessionViolation {
        /// The session state at the time.
        state: SessionState,
        /// The offending message.
        message: MessageId,
    },

    /// A large-asset channel message that breaks its transfer's state machine.
    #[error("large asset {id}: {fault}")]
    TransferViolation {
        /// The transfer the message belonged to.
        id: LargeAssetId,
        /// What went wrong.
        fault: TransferFault,
    },

    /// The large-asset sub-protocol is not one of the allowed names.
    #[error("invalid large asset protocol {value:?}")]
    InvalidLargeAssetProtocol {
        /// The name received.
        value: String,
    },

    /// A partial message grew beyond the receive limit.
    #[error("message exceeds {limit} bytes")]
    MessageTooLarge {
        /// The configured limit.
        limit: usize,
    },
}

/// Ways a large-asset transfer can break its state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferFault {
    /// A chunk arrived before the reply announcing the size.
    #[error("chunk before reply")]
    ChunkBeforeReply,

    /// A second reply arrived.
    #[error("duplicate reply")]
    DuplicateReply,

    /// The reply names a different asset than was requested.
    #[error("reply for {got}, expected {expected}")]
    IdMismatch {
        /// The requested id.
        expected: LargeAssetId,
        /// The id in the reply.
        got: LargeAssetId,
    },

    /// Chunks would carry more bytes than the announced size.
    #[error("over-delivery: {would_reach} bytes exceeds asset size {asset_size}")]
    OverDelivery {
        /// Announced size.
        asset_size: u64,
        /// Total the offending chunk would have reached.
        would_reach: u64,
    },

    /// Traffic after the transfer completed or errored.
    #[error("message after terminal state {state:?}")]
    AfterTerminal {
        /// The terminal state.
        state: TransferState,
    },

    /// A request arrived where only server-to-client traffic is legal.
    #[error("unexpected request")]
    UnexpectedRequest,

    /// A transfer for this id is already active.
    #[error("transfer already active")]
    AlreadyActive,

    /// No transfer for this id is active.
    #[error("no such transfer")]
    UnknownTransfer,
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
