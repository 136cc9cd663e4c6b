//! # Session State Machine
//!
//! Decides which primary-channel messages are legal on a connection.
//!
//! ```text
//!                    Introduction / IntroductionReply
//! AwaitingIntroduction ─────────────────────────────► Established
//!         │
//!         │ Probe                      ProbeReply
//!         └──────────────► Probing ─────────────────► Closed
//! ```
//!
//! Any illegal message closes the session.

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{Message, MessageId};

/// Which end of the connection this session is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Opened the connection; sends `Introduction` or `Probe`.
    Initiator,
    /// Accepted the connection; answers them.
    Responder,
}

/// State of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    /// Nothing exchanged yet, or an introduction awaits its reply.
    #[default]
    AwaitingIntroduction = 0,
    /// Handshake done; transactions may flow.
    Established = 1,
    /// A probe was sent; only its reply may follow.
    Probing = 2,
    /// No further traffic is legal.
    Closed = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Inbound,
    Outbound,
}

/// Legality tracker for one connection.
#[derive(Clone, Debug)]
pub struct Session {
    role: Role,
    state: SessionState,
    introduced: bool,
    peer_version: Option<u16>,
    protocol_version: Option<u16>,
}

impl Session {
    /// Creates a session in [`SessionState::AwaitingIntroduction`].
    #[must_use]
    pub const fn new(role: Role) -> Self {
        Self {
            role,
            state: SessionState::AwaitingIntroduction,
            introduced: false,
            peer_version: None,
            protocol_version: None,
        }
    }

    /// This end's role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true once the handshake has completed.
    #[must_use]
    pub const fn is_established(&self) -> bool {
        matches!(self.state, SessionState::Established)
    }

    /// Returns true once no more traffic is legal.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closed)
    }

    /// Version the peer announced in its `Introduction` (responder side).
    #[must_use]
    pub const fn peer_version(&self) -> Option<u16> {
        self.peer_version
    }

    /// Negotiated protocol version, set once established.
    #[must_use]
    pub const fn protocol_version(&self) -> Option<u16> {
        self.protocol_version
    }

    /// Closes the session.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            tracing::debug!(role = ?self.role, from = ?self.state, "session closed");
        }
        self.state = SessionState::Closed;
    }

    /// Checks and records a message received from the peer.
    ///
    /// # Errors
    ///
    /// Returns `SessionViolation` and closes the session if the message is
    /// not legal now.
    pub fn inbound(&mut self, message: &Message) -> ProtocolResult<()> {
        self.advance(Direction::Inbound, message)
    }

    /// Checks and records a message about to be sent.
    ///
    /// # Errors
    ///
    /// Returns `SessionViolation` and closes the session if the message is
    /// not legal now.
    pub fn outbound(&mut self, message: &Message) -> ProtocolResult<()> {
        self.advance(Direction::Outbound, message)
    }

    fn advance(&mut self, direction: Direction, message: &Message) -> ProtocolResult<()> {
        let from_initiator = (direction == Direction::Outbound) == (self.role == Role::Initiator);
        let next = match (self.state, message) {
            (SessionState::AwaitingIntroduction, Message::Introduction(intro))
                if from_initiator && !self.introduced =>
            {
                self.introduced = true;
                self.peer_version = Some(intro.protocol_version);
                Some(SessionState::AwaitingIntroduction)
            }
            (SessionState::AwaitingIntroduction, Message::IntroductionReply(reply))
                if !from_initiator && self.introduced =>
            {
                self.protocol_version = Some(reply.protocol_version);
                tracing::info!(
                    role = ?self.role,
                    version = reply.protocol_version,
                    session = %reply.session_name,
                    "session established"
                );
                Some(SessionState::Established)
            }
            (SessionState::AwaitingIntroduction, Message::Probe)
                if from_initiator && !self.introduced =>
            {
                Some(SessionState::Probing)
            }
            (SessionState::Probing, Message::ProbeReply(_)) if !from_initiator => {
                Some(SessionState::Closed)
            }
            (
                SessionState::Established,
                Message::Transaction(_)
                | Message::NamedTransaction(_)
                | Message::TransactionReply(_),
            ) => Some(SessionState::Established),
            _ => None,
        };

        match next {
            Some(state) => {
                self.state = state;
                Ok(())
            }
            None => {
                let state = self.state;
                tracing::warn!(
                    role = ?self.role,
                    ?state,
                    message = ?message.id(),
                    handshake = is_handshake_message(message.id()),
                    ?direction,
                    "session violation"
                );
                self.state = SessionState::Closed;
                Err(ProtocolError::SessionViolation {
                    state,
                    message: message.id(),
                })
            }
        }
    }
}

/// Messages that may only appear before establishment.
const fn is_handshake_message(id: MessageId) -> bool {
    matches!(
        id,
        MessageId::Introduction
            | MessageId::IntroductionReply
            | MessageId::Probe
            | MessageId::ProbeReply
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::{Introduction, IntroductionReply, LargeAssetProtocol};
    use crate::probe::ProbeReply;
    use crate::transaction::{Transaction, TransactionReply};

    fn intro() -> Message {
        Message::Introduction(Introduction::new(1, "viewer", false))
    }

    fn intro_reply() -> Message {
        Message::IntroductionReply(IntroductionReply {
            protocol_version: 1,
            session_name: "lab".into(),
            large_asset_protocol: LargeAssetProtocol::Ws,
            large_asset_ports: vec![50001],
        })
    }

    #[test]
    fn test_handshake_both_sides() {
        let mut client = Session::new(Role::Initiator);
        let mut node = Session::new(Role::Responder);

        client.outbound(&intro()).unwrap();
        node.inbound(&intro()).unwrap();
        assert_eq!(node.peer_version(), Some(1));
        assert_eq!(client.state(), SessionState::AwaitingIntroduction);

        node.outbound(&intro_reply()).unwrap();
        client.inbound(&intro_reply()).unwrap();
        assert!(client.is_established());
        assert!(node.is_established());
        assert_eq!(client.protocol_version(), Some(1));

        let tx = Message::Transaction(Transaction::default());
        client.outbound(&tx).unwrap();
        node.inbound(&tx).unwrap();
        node.outbound(&Message::TransactionReply(TransactionReply::accept(1)))
            .unwrap();
    }

    #[test]
    fn test_transaction_before_handshake() {
        let mut node = Session::new(Role::Responder);
        let err = node
            .inbound(&Message::Transaction(Transaction::default()))
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::SessionViolation {
                state: SessionState::AwaitingIntroduction,
                message: MessageId::Transaction,
            }
        );
        assert!(node.is_closed());
    }

    #[test]
    fn test_reply_before_introduction() {
        let mut client = Session::new(Role::Initiator);
        assert!(client.inbound(&intro_reply()).is_err());
    }

    #[test]
    fn test_introduction_in_wrong_direction() {
        let mut node = Session::new(Role::Responder);
        assert!(node.outbound(&intro()).is_err());
    }

    #[test]
    fn test_second_introduction() {
        let mut node = Session::new(Role::Responder);
        node.inbound(&intro()).unwrap();
        assert!(node.inbound(&intro()).is_err());
    }

    #[test]
    fn test_probe_closes() {
        let mut client = Session::new(Role::Initiator);
        let mut node = Session::new(Role::Responder);
        client.outbound(&Message::Probe).unwrap();
        node.inbound(&Message::Probe).unwrap();
        assert_eq!(node.state(), SessionState::Probing);

        let reply = Message::ProbeReply(ProbeReply::new("lab"));
        node.outbound(&reply).unwrap();
        client.inbound(&reply).unwrap();
        assert!(node.is_closed());
        assert!(client.is_closed());

        assert!(client.outbound(&Message::Probe).is_err());
    }

    #[test]
    fn test_probe_after_establishment() {
        let mut node = Session::new(Role::Responder);
        node.inbound(&intro()).unwrap();
        node.outbound(&intro_reply()).unwrap();
        let err = node.inbound(&Message::Probe).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::SessionViolation {
                state: SessionState::Established,
                message: MessageId::Probe,
            }
        ));
    }

    #[test]
    fn test_probe_after_introduction() {
        let mut node = Session::new(Role::Responder);
        node.inbound(&intro()).unwrap();
        assert!(node.inbound(&Message::Probe).is_err());
    }

    #[test]
    fn test_handshake_message_set() {
        assert!(is_handshake_message(MessageId::Probe));
        assert!(!is_handshake_message(MessageId::NamedTransaction));
    }
}
