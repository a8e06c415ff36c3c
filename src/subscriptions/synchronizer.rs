//! Per-domain view of a topic.

use super::manager::StateManager;
use super::types::{ChannelSubscription, Handlers, SubscriptionHandle};
use crate::error::{Result, SyncError};
use crate::projection::{self, IdAccessor};
use crate::types::{Timestamp, Topic};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// One sport domain's live feed: a topic on a shared [`StateManager`] plus
/// the entity type and id accessor its projections use.
pub struct PatchSynchronizer<T = Value> {
    manager: Arc<StateManager>,
    topic: Topic,
    ids: IdAccessor,
    _entity: PhantomData<fn() -> T>,
}

impl<T> PatchSynchronizer<T>
where
    T: DeserializeOwned + 'static,
{
    /// Bind to a registered topic. The id accessor comes from the topic's
    /// `id_field`, defaulting to `id`.
    pub fn new(manager: Arc<StateManager>, topic: &str) -> Result<Self> {
        let config = manager
            .topic_config(topic)
            .ok_or_else(|| SyncError::TopicNotRegistered(topic.to_string()))?;
        let ids = config
            .id_field
            .clone()
            .map(IdAccessor::Field)
            .unwrap_or_default();
        Ok(Self {
            manager,
            topic: config.topic(),
            ids,
            _entity: PhantomData,
        })
    }

    pub fn with_id_accessor(mut self, ids: IdAccessor) -> Self {
        self.ids = ids;
        self
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn ids(&self) -> &IdAccessor {
        &self.ids
    }

    pub fn manager(&self) -> &Arc<StateManager> {
        &self.manager
    }

    /// Subscribe an arbitrary projection.
    pub fn subscribe_with<V, P>(
        &self,
        projection: P,
        handlers: Handlers<V>,
    ) -> Result<SubscriptionHandle>
    where
        P: Fn(&Arc<Value>) -> V + Send + 'static,
        V: 'static,
    {
        self.manager.subscribe(self.topic.as_str(), projection, handlers)
    }

    /// All entities, unfiltered.
    pub fn subscribe_all(&self, handlers: Handlers<Vec<T>>) -> Result<SubscriptionHandle> {
        self.subscribe_with(projection::entities::<T>(), handlers)
    }

    /// The single entity with `id`, or `None` while it is absent.
    pub fn subscribe_by_id(
        &self,
        id: impl Into<String>,
        handlers: Handlers<Option<T>>,
    ) -> Result<SubscriptionHandle> {
        self.subscribe_with(projection::entity::<T>(self.ids.clone(), id), handlers)
    }

    /// A field nested in the entity with `id`, e.g. its `events` array.
    pub fn subscribe_nested(
        &self,
        id: impl Into<String>,
        field: impl Into<String>,
        handlers: Handlers<Option<Value>>,
    ) -> Result<SubscriptionHandle> {
        self.subscribe_with(projection::nested(self.ids.clone(), id, field), handlers)
    }

    /// Entities delivered on a channel.
    pub fn subscribe_channel(&self) -> Result<ChannelSubscription<Vec<T>>>
    where
        T: Send,
    {
        self.manager
            .subscribe_channel(self.topic.as_str(), projection::entities::<T>())
    }

    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.manager.unsubscribe(handle)
    }

    /// Latest full state, if any.
    pub fn current(&self) -> Option<Arc<Value>> {
        self.manager.current(self.topic.as_str())
    }

    /// Latest entities decoded as `T`.
    pub fn current_entities(&self) -> Vec<T> {
        self.current()
            .map(|state| projection::entities::<T>()(&state))
            .unwrap_or_default()
    }

    /// Latest entity with `id`.
    pub fn current_by_id(&self, id: &str) -> Option<T> {
        let state = self.current()?;
        projection::entity::<T>(self.ids.clone(), id)(&state)
    }

    /// When the topic's state last changed.
    pub fn last_updated(&self) -> Option<Timestamp> {
        self.manager
            .cache()
            .slot(self.topic.as_str())
            .map(|slot| slot.last_updated_at)
    }
}

impl<T> Clone for PatchSynchronizer<T> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            topic: self.topic.clone(),
            ids: self.ids.clone(),
            _entity: PhantomData,
        }
    }
}
