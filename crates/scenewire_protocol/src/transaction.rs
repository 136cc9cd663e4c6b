//! # Transactions
//!
//! A transaction is an ordered batch of content messages. An unnamed one
//! expects no reply. A named one carries an identifier that the receiver
//! echoes in a `TransactionReply` with an accept or reject code.
//!
//! [`ReplyTracker`] is the sender side: it hands out identifiers, matches
//! replies to them and forgets transactions whose reply never came. There is
//! no retry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use scenewire_codec::{CodecResult, WireReader, WireWriter};
use scenewire_shared::TransactionId;

use crate::content::{decode_content_list, encode_content_list, ContentMessage};
use crate::registry::ComponentRegistry;

/// A batch of content messages sent without expecting a reply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    /// Messages in application order.
    pub messages: Vec<ContentMessage>,
}

impl Transaction {
    /// Creates a transaction.
    #[must_use]
    pub const fn new(messages: Vec<ContentMessage>) -> Self {
        Self { messages }
    }

    pub(crate) fn encode(&self, w: &mut WireWriter) -> CodecResult<()> {
        encode_content_list(w, &self.messages)
    }

    pub(crate) fn decode(r: &mut WireReader<'_>, registry: &ComponentRegistry) -> CodecResult<Self> {
        decode_content_list(r, registry).map(Self::new)
    }
}

/// A batch of content messages whose outcome the sender wants to hear.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedTransaction {
    /// Identifier echoed in the reply.
    pub id: TransactionId,
    /// Messages in application order.
    pub messages: Vec<ContentMessage>,
}

impl NamedTransaction {
    /// Creates a named transaction.
    #[must_use]
    pub const fn new(id: TransactionId, messages: Vec<ContentMessage>) -> Self {
        Self { id, messages }
    }

    pub(crate) fn encode(&self, w: &mut WireWriter) -> CodecResult<()> {
        w.write_u32(self.id);
        encode_content_list(w, &self.messages)
    }

    pub(crate) fn decode(r: &mut WireReader<'_>, registry: &ComponentRegistry) -> CodecResult<Self> {
        let id = r.read_u32()?;
        Ok(Self::new(id, decode_content_list(r, registry)?))
    }
}

/// Outcome code of a named transaction.
///
/// Codes other than [`ReplyCode::ACCEPT`] and [`ReplyCode::REJECT`] decode
/// losslessly and count as rejection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReplyCode(pub u32);

impl ReplyCode {
    /// Every message was applied.
    pub const ACCEPT: Self = Self(0);
    /// Nothing was applied.
    pub const REJECT: Self = Self(1);

    /// Returns true only for [`ReplyCode::ACCEPT`].
    #[must_use]
    pub const fn is_accept(self) -> bool {
        self.0 == Self::ACCEPT.0
    }
}

/// Reply to a named transaction.
///
/// Wire layout: `u32 transaction_identifier, u32 code`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionReply {
    /// The transaction answered.
    pub id: TransactionId,
    /// Result.
    pub code: ReplyCode,
}

impl TransactionReply {
    /// Size in bytes.
    pub const SIZE: usize = 8;

    /// An accepting reply.
    #[must_use]
    pub const fn accept(id: TransactionId) -> Self {
        Self {
            id,
            code: ReplyCode::ACCEPT,
        }
    }

    /// A rejecting reply.
    #[must_use]
    pub const fn reject(id: TransactionId) -> Self {
        Self {
            id,
            code: ReplyCode::REJECT,
        }
    }

    pub(crate) fn encode(&self, w: &mut WireWriter) {
        w.write_u32(self.id);
        w.write_u32(self.code.0);
    }

    pub(crate) fn decode(r: &mut WireReader<'_>) -> CodecResult<Self> {
        Ok(Self {
            id: r.read_u32()?,
            code: ReplyCode(r.read_u32()?),
        })
    }
}

/// A reply matched to its outstanding transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedReply {
    /// The transaction.
    pub id: TransactionId,
    /// Its outcome.
    pub code: ReplyCode,
    /// Time between sending and the reply.
    pub round_trip: Duration,
}

/// Sender-side bookkeeping for named transactions.
///
/// Time is passed in explicitly so callers (and tests) control the clock.
#[derive(Debug)]
pub struct ReplyTracker {
    next_id: TransactionId,
    outstanding: HashMap<TransactionId, Instant>,
    timeout: Duration,
}

impl ReplyTracker {
    /// Creates a tracker that forgets transactions after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            next_id: 1,
            outstanding: HashMap::new(),
            timeout,
        }
    }

    /// Allocates the next identifier and records it as sent at `now`.
    ///
    /// Identifiers increase monotonically and wrap at `u32::MAX`, skipping
    /// any still outstanding.
    pub fn register(&mut self, now: Instant) -> TransactionId {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if let std::collections::hash_map::Entry::Vacant(slot) = self.outstanding.entry(id) {
                slot.insert(now);
                return id;
            }
        }
    }

    /// Matches a reply to its transaction.
    ///
    /// Replies for unknown or expired identifiers are logged and dropped.
    pub fn resolve(&mut self, reply: TransactionReply, now: Instant) -> Option<ResolvedReply> {
        let Some(sent) = self.outstanding.remove(&reply.id) else {
            tracing::warn!(id = reply.id, "reply for unknown transaction ignored");
            return None;
        };
        if !reply.code.is_accept() {
            tracing::warn!(id = reply.id, code = reply.code.0, "transaction rejected");
        }
        Some(ResolvedReply {
            id: reply.id,
            code: reply.code,
            round_trip: now.saturating_duration_since(sent),
        })
    }

    /// Forgets every transaction older than the timeout. Returns their ids.
    pub fn expire(&mut self, now: Instant) -> Vec<TransactionId> {
        let timeout = self.timeout;
        let mut expired: Vec<TransactionId> = self
            .outstanding
            .iter()
            .filter(|(_, sent)| now.saturating_duration_since(**sent) >= timeout)
            .map(|(id, _)| *id)
            .collect();
        expired.sort_unstable();
        for id in &expired {
            self.outstanding.remove(id);
            tracing::debug!(id, "named transaction expired without reply");
        }
        expired
    }

    /// Stops waiting for `id`, e.g. because sending it failed.
    ///
    /// Returns true if it was outstanding.
    pub fn cancel(&mut self, id: TransactionId) -> bool {
        self.outstanding.remove(&id).is_some()
    }

    /// Returns true if `id` is awaiting a reply.
    #[must_use]
    pub fn is_pending(&self, id: TransactionId) -> bool {
        self.outstanding.contains_key(&id)
    }

    /// Number of transactions awaiting a reply.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.outstanding.len()
    }

    /// The configured timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}
