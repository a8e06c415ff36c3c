//! Subscription system for live topic views.
//!
//! This module glues the pipeline together:
//! - One push channel per topic, opened by the first subscriber and shared
//! - One reconciler per topic holding the authoritative document
//! - A shared cache so late subscribers see the latest state at once
//!
//! # Example
//!
//! ```ignore
//! let manager = Arc::new(StateManager::new(transport, config)?);
//! let football = PatchSynchronizer::<Value>::new(manager.clone(), "football-live")?;
//!
//! // Follow one match
//! let handle = football.subscribe_by_id("1", Handlers::new(|fixture| {
//!     if let Some(fixture) = fixture {
//!         println!("score: {}", fixture["localteam"]["goals"]);
//!     }
//! }))?;
//!
//! // Drive the pipeline from the event loop
//! loop {
//!     manager.pump_topic_timeout("football-live", Duration::from_millis(250));
//! }
//! ```

mod manager;
mod synchronizer;
mod types;

pub use manager::StateManager;
pub use synchronizer::PatchSynchronizer;
pub use types::{ChannelSubscription, Handlers, SubscriptionHandle, SubscriptionId, ViewEvent};
