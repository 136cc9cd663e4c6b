//! # Primary Channel Messages
//!
//! Every message on the primary channel is a `u8` identifier followed by
//! that message's Fixed and Dyn parts. There is no outer length: a receiver
//! must understand every message it reads.

use scenewire_codec::{read_discriminant, write_discriminant, CodecResult, WireReader, WireWriter};

use crate::error::{ProtocolError, ProtocolResult};
use crate::handshake::{Introduction, IntroductionReply};
use crate::probe::ProbeReply;
use crate::registry::ComponentRegistry;
use crate::transaction::{NamedTransaction, Transaction, TransactionReply};

scenewire_codec::wire_enum! {
    /// Primary channel message identifier.
    pub enum MessageId: u8 {
        /// Unnamed transaction.
        Transaction = 1,
        /// Transaction expecting a reply.
        NamedTransaction = 2,
        /// Accept or reject of a named transaction.
        TransactionReply = 3,
        /// Identify request.
        Probe = 4,
        /// Identify reply.
        ProbeReply = 5,
        /// Handshake opening.
        Introduction = 6,
        /// Handshake answer.
        IntroductionReply = 7,
        /// RPC declaration.
        Rpc = 8,
        /// RPC call.
        RpcInvoke = 9,
        /// RPC call result.
        RpcInvokeReply = 10,
        /// Batched RPC calls.
        RpcInvokeBatch = 11,
        /// Batched RPC results.
        RpcInvokeBatchReply = 12,
    }
}

impl MessageId {
    /// Returns true for the RPC family, whose payloads are not decoded.
    #[must_use]
    pub const fn is_rpc(self) -> bool {
        matches!(
            self,
            Self::Rpc
                | Self::RpcInvoke
                | Self::RpcInvokeReply
                | Self::RpcInvokeBatch
                | Self::RpcInvokeBatchReply
        )
    }
}

/// A primary channel message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// Fire-and-forget batch.
    Transaction(Transaction),
    /// Batch with a reply.
    NamedTransaction(NamedTransaction),
    /// Reply to a named batch.
    TransactionReply(TransactionReply),
    /// Identify request.
    Probe,
    /// Identify reply.
    ProbeReply(ProbeReply),
    /// Handshake opening.
    Introduction(Introduction),
    /// Handshake answer.
    IntroductionReply(IntroductionReply),
}

impl Message {
    /// The wire identifier.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        match self {
            Self::Transaction(_) => MessageId::Transaction,
            Self::NamedTransaction(_) => MessageId::NamedTransaction,
            Self::TransactionReply(_) => MessageId::TransactionReply,
            Self::Probe => MessageId::Probe,
            Self::ProbeReply(_) => MessageId::ProbeReply,
            Self::Introduction(_) => MessageId::Introduction,
            Self::IntroductionReply(_) => MessageId::IntroductionReply,
        }
    }

    /// Appends the encoded message.
    ///
    /// # Errors
    ///
    /// Returns `ShortStringTooLong` or `CountTooLarge` when a field does not
    /// fit its wire form.
    pub fn encode(&self, w: &mut WireWriter) -> CodecResult<()> {
        write_discriminant(w, self.id());
        match self {
            Self::Transaction(tx) => tx.encode(w),
            Self::NamedTransaction(tx) => tx.encode(w),
            Self::TransactionReply(reply) => {
                reply.encode(w);
                Ok(())
            }
            Self::Probe => Ok(()),
            Self::ProbeReply(reply) => reply.encode(w),
            Self::Introduction(intro) => intro.encode(w),
            Self::IntroductionReply(reply) => reply.encode(w),
        }
    }

    /// Encodes into a fresh buffer.
    ///
    /// # Errors
    ///
    /// Same as [`Message::encode`].
    pub fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        let mut w = WireWriter::new();
        self.encode(&mut w)?;
        Ok(w.into_bytes())
    }

    /// Reads one message.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedMessage` for the RPC family, `UnknownDiscriminant`
    /// for an identifier outside the table and any decode error of the body.
    pub fn decode(r: &mut WireReader<'_>, registry: &ComponentRegistry) -> ProtocolResult<Self> {
        let id = read_discriminant::<MessageId>(r)?;
        let message = match id {
            MessageId::Transaction => Self::Transaction(Transaction::decode(r, registry)?),
            MessageId::NamedTransaction => {
                Self::NamedTransaction(NamedTransaction::decode(r, registry)?)
            }
            MessageId::TransactionReply => Self::TransactionReply(TransactionReply::decode(r)?),
            MessageId::Probe => Self::Probe,
            MessageId::ProbeReply => Self::ProbeReply(ProbeReply::decode(r)?),
            MessageId::Introduction => Self::Introduction(Introduction::decode(r)?),
            MessageId::IntroductionReply => Self::IntroductionReply(IntroductionReply::decode(r)?),
            MessageId::Rpc
            | MessageId::RpcInvoke
            | MessageId::RpcInvokeReply
            | MessageId::RpcInvokeBatch
            | MessageId::RpcInvokeBatchReply => {
                return Err(ProtocolError::UnsupportedMessage { id });
            }
        };
        tracing::trace!(id = ?message.id(), "decoded message");
        Ok(message)
    }

    /// Reads one message from the front of `bytes`.
    ///
    /// Returns the message and the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// Same as [`Message::decode`].
    pub fn from_bytes(bytes: &[u8], registry: &ComponentRegistry) -> ProtocolResult<(Self, usize)> {
        let mut r = WireReader::new(bytes);
        let message = Self::decode(&mut r, registry)?;
        Ok((message, r.position()))
    }
}

impl From<Transaction> for Message {
    fn from(tx: Transaction) -> Self {
        Self::Transaction(tx)
    }
}

impl From<NamedTransaction> for Message {
    fn from(tx: NamedTransaction) -> Self {
        Self::NamedTransaction(tx)
    }
}

impl From<TransactionReply> for Message {
    fn from(reply: TransactionReply) -> Self {
        Self::TransactionReply(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentMessage;
    use scenewire_codec::CodecError;

    #[test]
    fn test_probe_is_one_byte() {
        assert_eq!(Message::Probe.to_bytes().unwrap(), vec![4]);
    }

    #[test]
    fn test_transaction_reply_round_trip() {
        let registry = ComponentRegistry::empty();
        let bytes = Message::from(TransactionReply::reject(5)).to_bytes().unwrap();
        assert_eq!(bytes.len(), 1 + TransactionReply::SIZE);

        let (decoded, used) = Message::from_bytes(&bytes, &registry).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(decoded, Message::TransactionReply(TransactionReply::reject(5)));
    }

    #[test]
    fn test_consecutive_messages_share_a_buffer() {
        let registry = ComponentRegistry::default();
        let mut w = WireWriter::new();
        Message::from(Transaction::new(vec![ContentMessage::DeleteEntities(vec![3])]))
            .encode(&mut w)
            .unwrap();
        Message::Probe.encode(&mut w).unwrap();

        let mut r = WireReader::new(w.as_slice());
        assert_eq!(Message::decode(&mut r, &registry).unwrap().id(), MessageId::Transaction);
        assert_eq!(Message::decode(&mut r, &registry).unwrap(), Message::Probe);
        assert!(r.is_exhausted());
    }

    #[test]
    fn test_rpc_is_unsupported() {
        let registry = ComponentRegistry::empty();
        for raw in 8u8..=12 {
            let err = Message::from_bytes(&[raw, 0, 0], &registry).unwrap_err();
            assert!(matches!(err, ProtocolError::UnsupportedMessage { id } if id.is_rpc()));
        }
    }

    #[test]
    fn test_unknown_identifier() {
        let registry = ComponentRegistry::empty();
        assert_eq!(
            Message::from_bytes(&[0], &registry),
            Err(ProtocolError::Codec(CodecError::UnknownDiscriminant {
                type_name: "MessageId",
                value: 0,
            }))
        );
        assert!(Message::from_bytes(&[13], &registry).is_err());
    }
}
