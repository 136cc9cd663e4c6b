//! # SCENEWIRE Protocol
//!
//! Everything that travels on a SCENEWIRE connection, and the state machines
//! that decide when it may travel.
//!
//! ## Channels
//!
//! ```text
//! PRIMARY (one ordered stream per connection)
//!   Introduction ──► IntroductionReply ──► Transaction / NamedTransaction ◄─► TransactionReply
//!   Probe ──► ProbeReply ──► close
//!
//! LARGE ASSET (one stream per transfer)
//!   Request ──► Reply ──► Chunk* ──► (completed)
//!                    └──► Error
//! ```
//!
//! ## Modules
//!
//! - [`message`]: the primary-channel message union
//! - [`content`]: scene mutations carried inside transactions
//! - [`registry`]: component payload layouts needed to walk MODIFY_COMPONENT
//! - [`catalog`]: typed component, resource and asset payloads
//! - [`transaction`], [`handshake`], [`probe`]: message bodies
//! - [`session`]: per-connection legality of each message
//! - [`large_asset`]: large-asset channel messages and transfer tracking
//! - [`store`]: the scene-store collaborator and an in-memory reference store
//! - [`stream`]: incremental decoding of partially received streams
//! - [`any`]: self-describing values

#![deny(unsafe_code)]

pub mod any;
pub mod catalog;
pub mod content;
pub mod error;
pub mod handshake;
pub mod large_asset;
pub mod message;
pub mod probe;
pub mod registry;
pub mod session;
pub mod store;
pub mod stream;
pub mod transaction;

pub use any::Any;
pub use content::{ComponentEntry, ContentMessage, ContentMessageId};
pub use error::{ProtocolError, ProtocolResult, TransferFault};
pub use handshake::{Introduction, IntroductionReply, LargeAssetProtocol};
pub use large_asset::{
    LargeAssetMessage, LargeAssetReply, TransferAssembler, TransferState, TransferTable,
};
pub use message::{Message, MessageId};
pub use probe::ProbeReply;
pub use registry::{ComponentRegistry, PayloadLayout};
pub use session::{Role, Session, SessionState};
pub use store::{DuplicatePolicy, MemoryScene, SceneStore, StoreRejection};
pub use stream::MessageBuffer;
pub use transaction::{NamedTransaction, ReplyCode, ReplyTracker, Transaction, TransactionReply};
