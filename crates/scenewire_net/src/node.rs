//! # Node (Responder)
//!
//! Accepts primary-channel connections, answers probes, runs the handshake
//! and applies inbound transactions to a shared scene store. Optionally
//! serves large assets on the ports it advertises.
//!
//! ## Per-connection flow
//!
//! ```text
//! Probe         ──► ProbeReply ──► close
//! Introduction  ──► version check ──► IntroductionReply ──► transaction loop
//!                               └──► close (no compatible version)
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use scenewire_protocol::handshake::negotiate_version;
use scenewire_protocol::{
    ComponentRegistry, Introduction, IntroductionReply, LargeAssetProtocol, Message, ProbeReply,
    Role, SceneStore,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;

use crate::asset_channel::{serve_assets, AssetSource};
use crate::channel::PrimaryChannel;
use crate::config::NodeConfig;
use crate::error::{NetError, NetResult};

/// A SCENEWIRE responder sharing one scene store between its connections.
pub struct Node<S> {
    config: NodeConfig,
    large_asset_protocol: LargeAssetProtocol,
    registry: Arc<ComponentRegistry>,
    store: Arc<Mutex<S>>,
    icon: Vec<u8>,
}

impl<S: SceneStore + Send + 'static> Node<S> {
    /// Creates a node over `store`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration does not validate.
    pub fn new(config: NodeConfig, store: Arc<Mutex<S>>) -> NetResult<Self> {
        config.validate()?;
        Ok(Self {
            large_asset_protocol: config.large_asset_protocol()?,
            config,
            registry: Arc::new(ComponentRegistry::default()),
            store,
            icon: Vec::new(),
        })
    }

    /// Replaces the component registry used to decode inbound transactions.
    #[must_use]
    pub fn with_registry(mut self, registry: ComponentRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Sets the image returned in probe replies.
    #[must_use]
    pub fn with_icon(mut self, icon: Vec<u8>) -> Self {
        self.icon = icon;
        self
    }

    /// The configuration.
    pub const fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The shared scene store.
    pub const fn store(&self) -> &Arc<Mutex<S>> {
        &self.store
    }

    /// Binds every configured listener and serves until an accept fails.
    ///
    /// Large-asset listeners are only bound when `assets` is given and at
    /// least one port is configured.
    ///
    /// # Errors
    ///
    /// Returns `Io` if a listener cannot be bound or accepting fails.
    pub async fn run(self: Arc<Self>, assets: Option<Arc<dyn AssetSource>>) -> NetResult<()> {
        if let Some(source) = assets {
            for addr in self.config.large_asset_addresses() {
                let listener = TcpListener::bind(addr).await?;
                tracing::info!(%addr, protocol = %self.large_asset_protocol, "large asset service listening");
                let source = Arc::clone(&source);
                let chunk_size = self.config.chunk_size;
                let max_message_size = self.config.max_message_size;
                tokio::spawn(async move {
                    if let Err(e) = serve_assets(listener, source, chunk_size, max_message_size).await {
                        tracing::error!(%addr, error = %e, "large asset service stopped");
                    }
                });
            }
        }
        let listener = TcpListener::bind(self.config.bind_address).await?;
        tracing::info!(
            addr = %self.config.bind_address,
            session = %self.config.session_name,
            "node listening"
        );
        self.serve(listener).await
    }

    /// Accepts primary-channel connections forever, one task each.
    ///
    /// # Errors
    ///
    /// Returns `Io` if accepting fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> NetResult<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            stream.set_nodelay(true)?;
            tracing::debug!(%peer, "connection accepted");
            let node = Arc::clone(&self);
            tokio::spawn(async move {
                match node.handle_connection(stream).await {
                    Ok(()) => tracing::debug!(%peer, "connection finished"),
                    Err(e) => tracing::warn!(%peer, error = %e, "connection failed"),
                }
            });
        }
    }

    /// Runs one connection to completion.
    ///
    /// # Errors
    ///
    /// `IncompatibleVersion` if the client's version is refused, `Protocol`
    /// for illegal or undecodable input, or `Io`.
    pub async fn handle_connection<T>(&self, io: T) -> NetResult<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut channel = PrimaryChannel::new(
            io,
            Role::Responder,
            Arc::clone(&self.registry),
            self.config.max_message_size,
        );
        match channel.recv().await? {
            None => Ok(()),
            Some(Message::Probe) => {
                let reply = ProbeReply::new(self.config.session_name.clone()).with_icon(self.icon.clone());
                channel.send(&Message::ProbeReply(reply)).await?;
                channel.close().await
            }
            Some(Message::Introduction(intro)) => {
                if let Err(e) = self.introduce(&mut channel, &intro).await {
                    channel.close().await?;
                    return Err(e);
                }
                self.run_session(channel).await
            }
            Some(other) => Err(NetError::UnexpectedMessage { got: other.id() }),
        }
    }

    async fn introduce<T>(&self, channel: &mut PrimaryChannel<T>, intro: &Introduction) -> NetResult<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let min = self.config.min_protocol_version;
        let max = self.config.max_protocol_version;
        let Some(version) = negotiate_version(intro.protocol_version, min, max) else {
            tracing::warn!(
                client = %intro.name,
                version = intro.protocol_version,
                "refusing incompatible client"
            );
            return Err(NetError::IncompatibleVersion {
                peer: intro.protocol_version,
                min,
                max,
            });
        };
        let reply = IntroductionReply {
            protocol_version: version,
            session_name: self.config.session_name.clone(),
            large_asset_protocol: self.large_asset_protocol,
            large_asset_ports: self.config.large_asset_ports.clone(),
        };
        channel.send(&Message::IntroductionReply(reply)).await?;
        tracing::info!(
            client = %intro.name,
            version,
            authority_request = intro.flags.authority_request(),
            "client joined"
        );
        Ok(())
    }

    async fn run_session<T>(&self, mut channel: PrimaryChannel<T>) -> NetResult<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        while let Some(message) = channel.recv().await? {
            match message {
                Message::Transaction(tx) => {
                    let outcome = self.store.lock().apply(&tx.messages);
                    if let Err(reason) = outcome {
                        tracing::warn!(%reason, "unnamed transaction rejected by store");
                    }
                }
                Message::NamedTransaction(tx) => {
                    let reply = self.store.lock().apply_named(&tx);
                    channel.send(&Message::TransactionReply(reply)).await?;
                }
                Message::TransactionReply(reply) => {
                    tracing::debug!(id = reply.id, "ignoring reply to a transaction never sent");
                }
                other => return Err(NetError::UnexpectedMessage { got: other.id() }),
            }
        }
        tracing::info!("client left");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenewire_protocol::{ContentMessage, MemoryScene, NamedTransaction, Transaction, TransactionReply};
    use scenewire_shared::PROTOCOL_VERSION;
    use tokio::io::duplex;

    fn node() -> Node<MemoryScene> {
        let config = NodeConfig {
            session_name: "lab".into(),
            ..NodeConfig::default()
        };
        Node::new(config, Arc::new(Mutex::new(MemoryScene::default()))).unwrap()
    }

    fn client_channel<T: AsyncRead + AsyncWrite + Unpin>(io: T) -> PrimaryChannel<T> {
        PrimaryChannel::new(io, Role::Initiator, Arc::new(ComponentRegistry::default()), 1 << 16)
    }

    #[tokio::test]
    async fn test_probe_answered_and_closed() {
        let node = node().with_icon(vec![9, 9]);
        let (a, b) = duplex(256);
        let mut client = client_channel(a);
        let exchange = async {
            client.send(&Message::Probe).await.unwrap();
            let reply = client.recv().await.unwrap();
            let closed = client.recv().await.unwrap();
            (reply, closed)
        };
        let (served, (reply, closed)) = tokio::join!(node.handle_connection(b), exchange);
        served.unwrap();
        let Some(Message::ProbeReply(reply)) = reply else {
            panic!("expected a probe reply");
        };
        assert_eq!(reply.session_name, "lab");
        assert_eq!(reply.icon(), Some(&[9u8, 9][..]));
        assert_eq!(closed, None);
    }

    #[tokio::test]
    async fn test_transactions_reach_store() {
        let node = node();
        let (a, b) = duplex(256);
        let mut client = client_channel(a);
        let exchange = async {
            client
                .send(&Message::Introduction(Introduction::new(PROTOCOL_VERSION, "viewer", false)))
                .await
                .unwrap();
            let Some(Message::IntroductionReply(intro)) = client.recv().await.unwrap() else {
                panic!("expected an introduction reply");
            };
            assert_eq!(intro.protocol_version, PROTOCOL_VERSION);
            client
                .send(&Message::Transaction(Transaction::new(vec![
                    ContentMessage::CreateEntities(vec![1, 2]),
                ])))
                .await
                .unwrap();
            client
                .send(&Message::NamedTransaction(NamedTransaction::new(
                    5,
                    vec![ContentMessage::CreateEntities(vec![2])],
                )))
                .await
                .unwrap();
            let reply = client.recv().await.unwrap();
            client.close().await.unwrap();
            reply
        };
        let (served, reply) = tokio::join!(node.handle_connection(b), exchange);
        served.unwrap();
        // Entity 2 already exists, so the named batch is refused.
        assert_eq!(reply, Some(Message::TransactionReply(TransactionReply::reject(5))));
        let store = node.store().lock();
        assert_eq!(store.entity_count(), 2);
    }

    #[tokio::test]
    async fn test_incompatible_version_closes_without_reply() {
        let node = node();
        let (a, b) = duplex(256);
        let mut client = client_channel(a);
        let exchange = async {
            client
                .send(&Message::Introduction(Introduction::new(PROTOCOL_VERSION + 1, "future", false)))
                .await
                .unwrap();
            client.recv().await.unwrap()
        };
        let (served, reply) = tokio::join!(node.handle_connection(b), exchange);
        assert!(matches!(served, Err(NetError::IncompatibleVersion { .. })));
        assert_eq!(reply, None);
    }

    #[test]
    fn test_invalid_config_refused() {
        let config = NodeConfig {
            large_asset_protocol: "ftp".into(),
            ..NodeConfig::default()
        };
        assert!(Node::new(config, Arc::new(Mutex::new(MemoryScene::default()))).is_err());
    }
}
