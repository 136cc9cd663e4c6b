//! # Transport Error Types

use std::time::Duration;

use scenewire_codec::CodecError;
use scenewire_protocol::{MessageId, ProtocolError};
use scenewire_shared::{LargeAssetId, TransactionId};
use thiserror::Error;

/// Errors raised by the transport drivers.
#[derive(Error, Debug)]
pub enum NetError {
    /// Socket failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer broke the protocol. The connection is unusable.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A message could not be encoded for sending.
    #[error("encode error: {0}")]
    Encode(#[from] CodecError),

    /// The peer closed the stream partway through a message.
    #[error("connection closed with {pending} bytes of an incomplete message")]
    TruncatedStream {
        /// Bytes held when the stream ended.
        pending: usize,
    },

    /// The peer closed the stream where a message was required.
    #[error("connection closed")]
    ConnectionClosed,

    /// A message arrived that is legal but not what this driver waits for.
    #[error("unexpected {got:?}")]
    UnexpectedMessage {
        /// What arrived.
        got: MessageId,
    },

    /// The peer speaks no protocol version in the accepted range.
    #[error("peer protocol version {peer} outside {min}..={max}")]
    IncompatibleVersion {
        /// Version the peer offered.
        peer: u16,
        /// Lowest accepted.
        min: u16,
        /// Highest accepted.
        max: u16,
    },

    /// The node closed the connection instead of answering an introduction.
    #[error("handshake rejected by peer")]
    HandshakeRejected,

    /// A named transaction got no reply in time.
    #[error("no reply to transaction {id} within {timeout:?}")]
    ReplyTimeout {
        /// The transaction.
        id: TransactionId,
        /// The tracker timeout.
        timeout: Duration,
    },

    /// The large-asset server reported an error for a transfer.
    #[error("large asset {id} failed: {reason}")]
    TransferFailed {
        /// The asset.
        id: LargeAssetId,
        /// Server-supplied text.
        reason: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for transport operations.
pub type NetResult<T> = Result<T, NetError>;
