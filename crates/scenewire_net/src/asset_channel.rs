//! # Large-Asset Service
//!
//! Each transfer runs on its own connection: the client sends one request,
//! the server answers with a reply and the asset's chunks (or an error) and
//! closes. Transfers on separate connections run concurrently; the client
//! side tracks them in a shared [`TransferTable`].

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use scenewire_protocol::large_asset::ChunkPlan;
use scenewire_protocol::{
    LargeAssetMessage, LargeAssetReply, ProtocolError, TransferFault, TransferState, TransferTable,
};
use scenewire_shared::LargeAssetId;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

use crate::channel::LargeAssetChannel;
use crate::error::{NetError, NetResult};

/// A large asset held by the server.
#[derive(Clone, Debug)]
pub struct LargeAsset {
    /// Name sent in the reply.
    pub name: String,
    /// Content.
    pub data: Arc<[u8]>,
}

/// Where the large-asset server finds content.
pub trait AssetSource: Send + Sync {
    /// Looks up an asset by id.
    fn large_asset(&self, id: LargeAssetId) -> Option<LargeAsset>;
}

/// An [`AssetSource`] backed by a map.
#[derive(Debug, Default)]
pub struct MemoryAssetSource {
    assets: RwLock<HashMap<LargeAssetId, LargeAsset>>,
}

impl MemoryAssetSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an asset.
    pub fn insert(&self, id: LargeAssetId, name: impl Into<String>, data: impl Into<Arc<[u8]>>) {
        self.assets.write().insert(
            id,
            LargeAsset {
                name: name.into(),
                data: data.into(),
            },
        );
    }

    /// Removes an asset. Returns true if it existed.
    pub fn remove(&self, id: LargeAssetId) -> bool {
        self.assets.write().remove(&id).is_some()
    }

    /// Number of assets held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    /// Returns true if no asset is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.read().is_empty()
    }
}

impl AssetSource for MemoryAssetSource {
    fn large_asset(&self, id: LargeAssetId) -> Option<LargeAsset> {
        self.assets.read().get(&id).cloned()
    }
}

/// Accepts large-asset connections forever, one task per transfer.
///
/// # Errors
///
/// Returns `Io` if accepting fails.
pub async fn serve_assets(
    listener: TcpListener,
    source: Arc<dyn AssetSource>,
    chunk_size: usize,
    max_message_size: usize,
) -> NetResult<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let source = Arc::clone(&source);
        tokio::spawn(async move {
            if let Err(e) = answer_request(stream, source.as_ref(), chunk_size, max_message_size).await
            {
                tracing::warn!(%peer, error = %e, "large asset connection failed");
            }
        });
    }
}

/// Serves one transfer on an accepted stream.
///
/// An unknown id is answered with an error message. A peer that opens with
/// anything but a request gets an error message too.
///
/// # Errors
///
/// `Protocol`, `Encode` or `Io`.
pub async fn answer_request<S>(
    io: S,
    source: &dyn AssetSource,
    chunk_size: usize,
    max_message_size: usize,
) -> NetResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut channel = LargeAssetChannel::new(io, max_message_size);
    let Some(first) = channel.recv().await? else {
        return Ok(());
    };
    let id = match first {
        LargeAssetMessage::Request { id } => id,
        other => {
            tracing::warn!(got = ?other.id(), "large asset connection did not open with a request");
            channel
                .send(&LargeAssetMessage::Error("expected a request".into()))
                .await?;
            return channel.close().await;
        }
    };

    let Some(asset) = source.large_asset(id) else {
        tracing::debug!(id, "request for unknown large asset");
        channel
            .send(&LargeAssetMessage::Error(format!("unknown large asset {id}")))
            .await?;
        return channel.close().await;
    };

    let asset_size = asset.data.len() as u64;
    channel
        .send(&LargeAssetMessage::Reply(LargeAssetReply {
            id,
            asset_size,
            name: asset.name.clone(),
        }))
        .await?;
    let plan = ChunkPlan::new(asset_size, chunk_size);
    tracing::debug!(id, asset_size, chunks = plan.len(), "serving large asset");
    for range in plan {
        let chunk = asset.data[range.start as usize..range.end as usize].to_vec();
        channel.send(&LargeAssetMessage::Chunk(chunk)).await?;
    }
    channel.close().await
}

/// Requests one asset over `io` and collects it in memory.
///
/// The transfer is registered in `transfers` for its duration and removed
/// when it finishes either way.
///
/// # Errors
///
/// `Protocol` with `AlreadyActive` if the id is already being fetched,
/// `TransferFailed` if the server answered with an error, `Protocol` for a
/// transfer violation, `ConnectionClosed` if the server hung up early, or
/// `Io`.
pub async fn fetch<S>(
    io: S,
    id: LargeAssetId,
    transfers: &TransferTable,
    max_message_size: usize,
) -> NetResult<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    transfers.begin(id)?;
    let result = fetch_registered(io, id, transfers, max_message_size).await;
    if result.is_err() {
        transfers.abandon(id);
    }
    result
}

async fn fetch_registered<S>(
    io: S,
    id: LargeAssetId,
    transfers: &TransferTable,
    max_message_size: usize,
) -> NetResult<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut channel = LargeAssetChannel::new(io, max_message_size);
    channel.send(&LargeAssetMessage::Request { id }).await?;
    loop {
        let Some(message) = channel.recv().await? else {
            return Err(NetError::ConnectionClosed);
        };
        match transfers.feed(id, &message)? {
            TransferState::Completed => break,
            TransferState::Errored => {
                let reason = match message {
                    LargeAssetMessage::Error(text) => text,
                    _ => String::new(),
                };
                return Err(NetError::TransferFailed { id, reason });
            }
            TransferState::Requested | TransferState::Replied | TransferState::Streaming => {}
        }
    }
    transfers.take_completed(id).ok_or(NetError::Protocol(
        ProtocolError::TransferViolation {
            id,
            fault: TransferFault::UnknownTransfer,
        },
    ))
}

/// Connects to a large-asset server and fetches one asset.
///
/// # Errors
///
/// As [`fetch`], plus `Io` if the connection fails.
pub async fn fetch_from(
    addr: SocketAddr,
    id: LargeAssetId,
    transfers: &TransferTable,
    max_message_size: usize,
) -> NetResult<Vec<u8>> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    fetch(stream, id, transfers, max_message_size).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn source() -> MemoryAssetSource {
        let source = MemoryAssetSource::new();
        source.insert(7, "mesh.bin", (0..=255u8).cycle().take(1000).collect::<Vec<_>>());
        source.insert(8, "empty", Vec::<u8>::new());
        source
    }

    async fn run(id: LargeAssetId, chunk_size: usize) -> (NetResult<Vec<u8>>, TransferTable) {
        let (client, server) = duplex(64);
        let source = source();
        let transfers = TransferTable::new();
        let (fetched, served) = tokio::join!(
            fetch(client, id, &transfers, 4096),
            answer_request(server, &source, chunk_size, 4096)
        );
        served.unwrap();
        (fetched, transfers)
    }

    #[tokio::test]
    async fn test_fetch_in_chunks() {
        let (fetched, transfers) = run(7, 64).await;
        let expected: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        assert_eq!(fetched.unwrap(), expected);
        assert!(transfers.is_empty());
    }

    #[tokio::test]
    async fn test_zero_size_asset() {
        let (fetched, _) = run(8, 64).await;
        assert_eq!(fetched.unwrap(), Vec::<u8>::new());
    }

    #[tokio::test]
    async fn test_unknown_asset_reports_error() {
        let (fetched, transfers) = run(99, 64).await;
        match fetched {
            Err(NetError::TransferFailed { id, reason }) => {
                assert_eq!(id, 99);
                assert!(reason.contains("99"));
            }
            other => panic!("expected transfer failure, got {other:?}"),
        }
        assert!(transfers.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_fetch_refused() {
        let transfers = TransferTable::new();
        transfers.begin(7).unwrap();
        let (client, _server) = duplex(64);
        let err = fetch(client, 7, &transfers, 4096).await.unwrap_err();
        assert!(matches!(
            err,
            NetError::Protocol(ProtocolError::TransferViolation {
                fault: TransferFault::AlreadyActive,
                ..
            })
        ));
        assert_eq!(transfers.state(7), Some(TransferState::Requested));
    }

    #[tokio::test]
    async fn test_server_hangs_up_early() {
        let (client, server) = duplex(64);
        drop(server);
        let transfers = TransferTable::new();
        assert!(fetch(client, 7, &transfers, 4096).await.is_err());
        assert!(transfers.is_empty());
    }

    #[test]
    fn test_memory_source() {
        let source = source();
        assert_eq!(source.len(), 2);
        assert_eq!(source.large_asset(7).unwrap().data.len(), 1000);
        assert!(source.remove(8));
        assert!(source.large_asset(8).is_none());
    }
}
