//! # Client (Initiator)
//!
//! Connects to a node, introduces itself and sends transactions. Named
//! transactions are matched to their replies through a [`ReplyTracker`];
//! one whose reply does not arrive within the timeout is forgotten, not
//! retried.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use scenewire_protocol::transaction::ResolvedReply;
use scenewire_protocol::{
    ComponentRegistry, ContentMessage, Introduction, IntroductionReply, Message, NamedTransaction,
    ProbeReply, ReplyTracker, Role, Session, Transaction,
};
use scenewire_shared::{TransactionId, MIN_PROTOCOL_VERSION, PROTOCOL_VERSION};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::channel::PrimaryChannel;
use crate::config::{DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_REPLY_TIMEOUT_MS};
use crate::error::{NetError, NetResult};

/// How a client presents itself and what it will accept.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Display name sent in the introduction.
    pub name: String,
    /// Highest protocol version offered.
    pub protocol_version: u16,
    /// Ask the node for authority over the scene.
    pub authority_request: bool,
    /// Receive limit for one incomplete message.
    pub max_message_size: usize,
    /// How long a named transaction waits for its reply.
    pub reply_timeout: Duration,
    /// Layouts used to walk inbound component payloads.
    pub registry: Arc<ComponentRegistry>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            name: "scenewire-client".to_owned(),
            protocol_version: PROTOCOL_VERSION,
            authority_request: false,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            reply_timeout: Duration::from_millis(DEFAULT_REPLY_TIMEOUT_MS),
            registry: Arc::new(ComponentRegistry::default()),
        }
    }
}

/// An established client session.
#[derive(Debug)]
pub struct Client<S> {
    channel: PrimaryChannel<S>,
    tracker: ReplyTracker,
    intro: IntroductionReply,
}

impl Client<TcpStream> {
    /// Connects over TCP and performs the handshake.
    ///
    /// # Errors
    ///
    /// `Io` if the connection fails, otherwise as [`Client::handshake`].
    pub async fn connect(addr: impl ToSocketAddrs, options: &ClientOptions) -> NetResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Self::handshake(stream, options).await
    }

    /// Addresses of the node's large-asset service, on the node's IP.
    ///
    /// # Errors
    ///
    /// `Io` if the peer address is unavailable.
    pub fn large_asset_addresses(&self) -> NetResult<Vec<SocketAddr>> {
        let ip = self.channel.get_ref().peer_addr()?.ip();
        Ok(self
            .intro
            .large_asset_ports
            .iter()
            .map(|port| SocketAddr::new(ip, *port))
            .collect())
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    /// Sends an introduction over `io` and waits for the node's answer.
    ///
    /// # Errors
    ///
    /// `HandshakeRejected` if the node closes instead of answering,
    /// `IncompatibleVersion` if it answers with a version above the one
    /// offered, `Protocol` for illegal input, or `Io`.
    pub async fn handshake(io: S, options: &ClientOptions) -> NetResult<Self> {
        let mut channel = PrimaryChannel::new(
            io,
            Role::Initiator,
            Arc::clone(&options.registry),
            options.max_message_size,
        );
        let intro = Introduction::new(
            options.protocol_version,
            options.name.clone(),
            options.authority_request,
        );
        channel.send(&Message::Introduction(intro)).await?;

        let reply = match channel.recv().await? {
            Some(Message::IntroductionReply(reply)) => reply,
            Some(other) => return Err(NetError::UnexpectedMessage { got: other.id() }),
            None => return Err(NetError::HandshakeRejected),
        };
        if reply.protocol_version > options.protocol_version {
            return Err(NetError::IncompatibleVersion {
                peer: reply.protocol_version,
                min: MIN_PROTOCOL_VERSION,
                max: options.protocol_version,
            });
        }
        tracing::info!(
            session = %reply.session_name,
            version = reply.protocol_version,
            large_asset_protocol = %reply.large_asset_protocol,
            "joined session"
        );
        Ok(Self {
            channel,
            tracker: ReplyTracker::new(options.reply_timeout),
            intro: reply,
        })
    }

    /// The node's introduction reply.
    pub const fn introduction_reply(&self) -> &IntroductionReply {
        &self.intro
    }

    /// The session state machine.
    pub const fn session(&self) -> &Session {
        self.channel.session()
    }

    /// Named transactions still awaiting a reply.
    pub fn pending_replies(&self) -> usize {
        self.tracker.pending()
    }

    /// Sends a transaction that expects no reply.
    ///
    /// # Errors
    ///
    /// `Encode`, `Protocol` or `Io`.
    pub async fn send_transaction(&mut self, messages: Vec<ContentMessage>) -> NetResult<()> {
        self.channel
            .send(&Message::Transaction(Transaction::new(messages)))
            .await
    }

    /// Sends a named transaction and returns its identifier.
    ///
    /// # Errors
    ///
    /// `Encode`, `Protocol` or `Io`. The identifier is released on failure.
    pub async fn send_named(&mut self, messages: Vec<ContentMessage>) -> NetResult<TransactionId> {
        let id = self.tracker.register(Instant::now());
        let message = Message::NamedTransaction(NamedTransaction::new(id, messages));
        if let Err(e) = self.channel.send(&message).await {
            self.tracker.cancel(id);
            return Err(e);
        }
        Ok(id)
    }

    /// Reads until the reply to `id` arrives.
    ///
    /// Replies to other outstanding transactions that arrive first are
    /// resolved and dropped.
    ///
    /// # Errors
    ///
    /// `ReplyTimeout` if the tracker's timeout passes first or `id` is not
    /// outstanding, `ConnectionClosed` if the node hangs up, or whatever
    /// reading reports.
    pub async fn await_reply(&mut self, id: TransactionId) -> NetResult<ResolvedReply> {
        let timeout = self.tracker.timeout();
        let deadline = tokio::time::Instant::now() + timeout;
        while self.tracker.is_pending(id) {
            let received = match tokio::time::timeout_at(deadline, self.channel.recv()).await {
                Ok(received) => received?,
                Err(_) => {
                    self.tracker.expire(Instant::now());
                    self.tracker.cancel(id);
                    tracing::warn!(id, ?timeout, "named transaction timed out");
                    break;
                }
            };
            match received {
                Some(Message::TransactionReply(reply)) => {
                    if let Some(resolved) = self.tracker.resolve(reply, Instant::now()) {
                        if resolved.id == id {
                            return Ok(resolved);
                        }
                        tracing::debug!(id = resolved.id, "reply resolved while awaiting another");
                    }
                }
                Some(other) => {
                    tracing::debug!(got = ?other.id(), "ignoring message while awaiting reply");
                }
                None => return Err(NetError::ConnectionClosed),
            }
        }
        Err(NetError::ReplyTimeout { id, timeout })
    }

    /// Sends a named transaction and waits for its reply.
    ///
    /// # Errors
    ///
    /// As [`Client::send_named`] and [`Client::await_reply`].
    pub async fn named_transaction(&mut self, messages: Vec<ContentMessage>) -> NetResult<ResolvedReply> {
        let id = self.send_named(messages).await?;
        self.await_reply(id).await
    }

    /// Ends the session.
    ///
    /// # Errors
    ///
    /// `Io` if the shutdown fails.
    pub async fn close(self) -> NetResult<()> {
        self.channel.close().await
    }
}

/// Probes a node over TCP for its session name and icon.
///
/// # Errors
///
/// `Io` if the connection fails, otherwise as [`probe_over`].
pub async fn probe(addr: impl ToSocketAddrs) -> NetResult<ProbeReply> {
    let stream = TcpStream::connect(addr).await?;
    probe_over(stream, DEFAULT_MAX_MESSAGE_SIZE).await
}

/// Sends a probe over `io` and returns the answer.
///
/// # Errors
///
/// `ConnectionClosed` if the node hangs up without answering, `Protocol` for
/// illegal input, or `Io`.
pub async fn probe_over<S>(io: S, max_message_size: usize) -> NetResult<ProbeReply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut channel = PrimaryChannel::new(
        io,
        Role::Initiator,
        Arc::new(ComponentRegistry::empty()),
        max_message_size,
    );
    channel.send(&Message::Probe).await?;
    match channel.recv().await? {
        Some(Message::ProbeReply(reply)) => Ok(reply),
        Some(other) => Err(NetError::UnexpectedMessage { got: other.id() }),
        None => Err(NetError::ConnectionClosed),
    }
}
