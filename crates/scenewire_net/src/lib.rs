//! # SCENEWIRE Net
//!
//! tokio drivers that put the protocol state machines on real streams.
//!
//! ## Architecture
//!
//! ```text
//! CLIENT (initiator)                     NODE (responder)
//!   |                                       |
//!   |--- Introduction --------------------->| version check
//!   |<-- IntroductionReply -----------------|
//!   |--- NamedTransaction ----------------->| SceneStore::apply_named
//!   |<-- TransactionReply ------------------|
//!   |                                       |
//!   |=== large-asset connection (per id) ==>| AssetSource
//!   |--- Request -------------------------->|
//!   |<-- Reply, Chunk* / Error -------------|
//! ```
//!
//! Every driver is generic over `AsyncRead + AsyncWrite`, so the same code
//! runs on TCP sockets and in-memory pipes.
//!
//! ## Example
//!
//! ```rust,ignore
//! use scenewire_net::{Client, ClientOptions};
//! use scenewire_protocol::ContentMessage;
//!
//! let mut client = Client::connect("127.0.0.1:50000", &ClientOptions::default()).await?;
//! let reply = client
//!     .named_transaction(vec![ContentMessage::CreateEntities(vec![1])])
//!     .await?;
//! assert!(reply.code.is_accept());
//! ```

#![deny(unsafe_code)]

pub mod asset_channel;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod node;

pub use asset_channel::{fetch, fetch_from, AssetSource, LargeAsset, MemoryAssetSource};
pub use channel::{LargeAssetChannel, PrimaryChannel};
pub use client::{probe, probe_over, Client, ClientOptions};
pub use config::NodeConfig;
pub use error::{NetError, NetResult};
pub use node::Node;
