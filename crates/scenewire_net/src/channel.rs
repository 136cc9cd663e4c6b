//! # Stream Channels
//!
//! Whole-message send and receive over any ordered byte stream. The primary
//! channel also runs the session state machine, so every message that
//! crosses it in either direction is checked for legality.

use std::sync::Arc;

use scenewire_protocol::{
    ComponentRegistry, LargeAssetMessage, Message, MessageBuffer, ProtocolResult, Role, Session,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{NetError, NetResult};

/// Bytes requested from the stream per read.
const READ_CHUNK: usize = 8 * 1024;

/// A byte stream plus the receive buffer that reassembles messages from it.
#[derive(Debug)]
struct ByteStream<S> {
    io: S,
    rx: MessageBuffer,
    scratch: Box<[u8]>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ByteStream<S> {
    fn new(io: S, max_message_size: usize) -> Self {
        Self {
            io,
            rx: MessageBuffer::new(max_message_size),
            scratch: vec![0; READ_CHUNK].into_boxed_slice(),
        }
    }

    async fn write(&mut self, bytes: &[u8]) -> NetResult<()> {
        self.io.write_all(bytes).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Reads until `decode` yields a message.
    ///
    /// Returns `Ok(None)` on a clean end of stream. Cancel-safe: bytes are
    /// only buffered once a read has completed.
    async fn read<T, F>(&mut self, mut decode: F) -> NetResult<Option<T>>
    where
        F: FnMut(&mut MessageBuffer) -> ProtocolResult<Option<T>>,
    {
        loop {
            if let Some(value) = decode(&mut self.rx)? {
                return Ok(Some(value));
            }
            let n = self.io.read(&mut self.scratch).await?;
            if n == 0 {
                if self.rx.is_empty() {
                    return Ok(None);
                }
                return Err(NetError::TruncatedStream {
                    pending: self.rx.len(),
                });
            }
            self.rx.extend(&self.scratch[..n]);
        }
    }

    async fn shutdown(&mut self) -> NetResult<()> {
        self.io.shutdown().await?;
        Ok(())
    }
}

/// One end of a primary channel.
#[derive(Debug)]
pub struct PrimaryChannel<S> {
    bytes: ByteStream<S>,
    registry: Arc<ComponentRegistry>,
    session: Session,
}

impl<S: AsyncRead + AsyncWrite + Unpin> PrimaryChannel<S> {
    /// Wraps a connected stream.
    pub fn new(io: S, role: Role, registry: Arc<ComponentRegistry>, max_message_size: usize) -> Self {
        Self {
            bytes: ByteStream::new(io, max_message_size),
            registry,
            session: Session::new(role),
        }
    }

    /// The session state machine for this connection.
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// The underlying stream.
    pub const fn get_ref(&self) -> &S {
        &self.bytes.io
    }

    /// Encodes and writes one message.
    ///
    /// # Errors
    ///
    /// `Encode` if the message cannot be encoded, `Protocol` if the session
    /// does not allow it now, or `Io`.
    pub async fn send(&mut self, message: &Message) -> NetResult<()> {
        let bytes = message.to_bytes()?;
        self.session.outbound(message)?;
        tracing::trace!(id = ?message.id(), len = bytes.len(), "primary send");
        self.bytes.write(&bytes).await
    }

    /// Reads the next message.
    ///
    /// Returns `Ok(None)` when the peer closed the stream between messages.
    /// Any error closes the session.
    ///
    /// # Errors
    ///
    /// `Protocol` for undecodable or illegal input, `TruncatedStream` if the
    /// peer closed mid-message, or `Io`.
    pub async fn recv(&mut self) -> NetResult<Option<Message>> {
        let registry = &self.registry;
        match self.bytes.read(|rx| rx.next_message(registry)).await {
            Ok(Some(message)) => {
                self.session.inbound(&message)?;
                tracing::trace!(id = ?message.id(), "primary recv");
                Ok(Some(message))
            }
            Ok(None) => {
                self.session.close();
                Ok(None)
            }
            Err(e) => {
                self.session.close();
                Err(e)
            }
        }
    }

    /// Closes the session and shuts down the write half.
    ///
    /// # Errors
    ///
    /// `Io` if the shutdown fails.
    pub async fn close(mut self) -> NetResult<()> {
        self.session.close();
        self.bytes.shutdown().await
    }
}

/// One end of a large-asset channel.
#[derive(Debug)]
pub struct LargeAssetChannel<S> {
    bytes: ByteStream<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> LargeAssetChannel<S> {
    /// Wraps a connected stream.
    pub fn new(io: S, max_message_size: usize) -> Self {
        Self {
            bytes: ByteStream::new(io, max_message_size),
        }
    }

    /// Encodes and writes one message.
    ///
    /// # Errors
    ///
    /// `Encode` or `Io`.
    pub async fn send(&mut self, message: &LargeAssetMessage) -> NetResult<()> {
        let bytes = message.to_bytes()?;
        self.bytes.write(&bytes).await
    }

    /// Reads the next message, or `None` at a clean end of stream.
    ///
    /// # Errors
    ///
    /// `Protocol`, `TruncatedStream` or `Io`.
    pub async fn recv(&mut self) -> NetResult<Option<LargeAssetMessage>> {
        self.bytes.read(MessageBuffer::next_large_asset_message).await
    }

    /// Shuts down the write half.
    ///
    /// # Errors
    ///
    /// `Io` if the shutdown fails.
    pub async fn close(mut self) -> NetResult<()> {
        self.bytes.shutdown().await
    }
}
