//! # Scoreboard Sync
//!
//! Live-state synchronization for server-pushed sports feeds.
//!
//! ## Core Concepts
//!
//! - **Frames**: Text pushed by the server, either a full snapshot or an
//!   RFC 6902 JSON Patch batch (told apart by shape)
//! - **Reconciler**: Per-topic state machine holding the authoritative document
//! - **Cache**: Last known state per topic, shared by every subscriber
//! - **Projections**: Cheap pure views (all fixtures, one match, its events)
//!
//! ## Example
//!
//! ```ignore
//! use scoreboard_sync::{ChannelTransport, Handlers, StateManager, SyncConfig, TopicConfig};
//!
//! let transport = ChannelTransport::new();
//! let config = SyncConfig::default()
//!     .with_topic(TopicConfig::new("football-live", "mem://football").with_id_field("match_id"));
//! let manager = StateManager::new(Arc::new(transport.clone()), config)?;
//!
//! let handle = manager.subscribe(
//!     "football-live",
//!     projection::by_id(IdAccessor::field("match_id"), "1"),
//!     Handlers::new(|fixture| println!("{:?}", fixture)),
//! )?;
//!
//! transport.push("mem://football", r#"[{"match_id":"1","status":"1st Half"}]"#);
//! manager.pump();
//! ```

pub mod cache;
pub mod classify;
pub mod config;
pub mod connection;
pub mod error;
pub mod patch;
pub mod projection;
pub mod reconciler;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use cache::{CacheSlot, SharedStateCache};
pub use classify::{classify, decode, Frame, FrameKind};
pub use config::{CredentialsMode, SyncConfig, TopicConfig};
pub use connection::{ChannelTransport, Endpoint, StreamConnection, StreamEvent, Transport};
pub use error::{PatchError, Result, SyncError, TransportError};
pub use patch::{apply_batch, apply_operation, PatchBatch, PatchOperation};
pub use projection::IdAccessor;
pub use reconciler::{Reconciled, ReconcilerPhase, ReconcilerStats, StateReconciler};
pub use subscriptions::{
    ChannelSubscription, Handlers, PatchSynchronizer, StateManager, SubscriptionHandle,
    SubscriptionId, ViewEvent,
};
pub use types::{Timestamp, Topic};
