//! Subscription manager tying connections, reconcilers and the cache together.

use crate::cache::SharedStateCache;
use crate::classify;
use crate::config::{SyncConfig, TopicConfig};
use crate::connection::{Endpoint, StreamConnection, StreamEvent, Transport};
use crate::error::{Result, SyncError, TransportError};
use crate::reconciler::{Reconciled, ReconcilerStats, StateReconciler};
use crate::types::Topic;
use crossbeam_channel::unbounded;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::types::{
    ChannelSubscription, ErrorFn, Handlers, SubscriptionHandle, SubscriptionId, ViewEvent,
};

type DeliverFn = Box<dyn FnMut(&Arc<Value>) + Send>;

/// Internal subscription state.
struct Subscriber {
    id: SubscriptionId,
    /// Projection composed with the update callback.
    deliver: Mutex<DeliverFn>,
    on_error: Mutex<ErrorFn>,
}

impl Subscriber {
    fn deliver(&self, state: &Arc<Value>) {
        let mut deliver = self.deliver.lock();
        (*deliver)(state);
    }

    fn report(&self, error: &TransportError) {
        let mut on_error = self.on_error.lock();
        (*on_error)(error);
    }
}

/// Everything owned for one topic: its connection, reconciler and subscribers.
struct TopicPipeline {
    topic: Topic,
    endpoint: Endpoint,
    connection: Mutex<Option<Arc<StreamConnection>>>,
    reconciler: Mutex<StateReconciler>,
    subscribers: RwLock<BTreeMap<SubscriptionId, Arc<Subscriber>>>,
    /// Held while one frame is processed, and while a new subscriber is
    /// primed, so deliveries for a topic never interleave. Reentrant so
    /// callbacks may subscribe.
    frame_lock: ReentrantMutex<()>,
}

impl TopicPipeline {
    fn new(config: &TopicConfig, max_pending: Option<usize>) -> Self {
        Self {
            topic: config.topic(),
            endpoint: config.endpoint(),
            connection: Mutex::new(None),
            reconciler: Mutex::new(StateReconciler::with_max_pending(max_pending)),
            subscribers: RwLock::new(BTreeMap::new()),
            frame_lock: ReentrantMutex::new(()),
        }
    }

    /// Open the push channel unless an active one exists.
    fn ensure_connected(&self, transport: &dyn Transport) -> Option<TransportError> {
        let mut connection = self.connection.lock();
        if connection.as_ref().is_some_and(|c| c.is_active()) {
            return None;
        }
        match transport.open(&self.endpoint) {
            Ok(opened) => {
                debug!(topic = %self.topic, url = %self.endpoint.url, "Opened push channel");
                if let Some(stale) = connection.replace(Arc::new(opened)) {
                    stale.close();
                }
                None
            }
            Err(e) => {
                warn!(topic = %self.topic, error = %e, "Failed to open push channel");
                Some(e)
            }
        }
    }

    fn current_connection(&self) -> Option<Arc<StreamConnection>> {
        self.connection.lock().clone()
    }

    fn is_connected(&self) -> bool {
        self.connection.lock().as_ref().is_some_and(|c| c.is_active())
    }

    fn subscriber_list(&self) -> Vec<Arc<Subscriber>> {
        self.subscribers.read().values().cloned().collect()
    }

    /// Process every event currently available.
    fn drain(&self, cache: &SharedStateCache) -> usize {
        let mut processed = 0;
        while self.process_next(cache) {
            processed += 1;
        }
        processed
    }

    fn process_next(&self, cache: &SharedStateCache) -> bool {
        let _frame = self.frame_lock.lock();
        let Some(event) = self.current_connection().and_then(|c| c.try_next()) else {
            return false;
        };
        self.handle_event(event, cache);
        true
    }

    fn handle_event(&self, event: StreamEvent, cache: &SharedStateCache) {
        match event {
            StreamEvent::Open => debug!(topic = %self.topic, "Push channel open"),
            StreamEvent::Message(raw) => self.handle_frame(&raw, cache),
            StreamEvent::Error(error) => {
                let subscribers = self.subscriber_list();
                warn!(
                    topic = %self.topic,
                    error = %error,
                    subscribers = subscribers.len(),
                    "Push channel error"
                );
                for subscriber in subscribers {
                    subscriber.report(&error);
                }
            }
        }
    }

    fn handle_frame(&self, raw: &str, cache: &SharedStateCache) {
        let frame = match classify::decode(raw) {
            Ok(frame) => frame,
            Err(SyncError::Decode(reason)) => {
                debug!(topic = %self.topic, %reason, "Dropping undecodable frame");
                return;
            }
            Err(e) => {
                warn!(topic = %self.topic, error = %e, "Dropping malformed patch batch");
                return;
            }
        };

        let outcome = self.reconciler.lock().reconcile(frame);
        match outcome {
            Reconciled::Updated(state) => {
                cache.set(&self.topic, state.clone());
                let subscribers = self.subscriber_list();
                trace!(topic = %self.topic, subscribers = subscribers.len(), "Publishing state");
                for subscriber in subscribers {
                    subscriber.deliver(&state);
                }
            }
            Reconciled::Queued { pending } => {
                debug!(topic = %self.topic, pending, "Queued patch batch before first snapshot");
            }
            Reconciled::Rejected(e) => {
                warn!(topic = %self.topic, error = %e, "Rejected patch batch, state unchanged");
            }
        }
    }
}

/// Owns the per-topic pipelines and the shared state cache.
///
/// Frames are processed on whichever thread calls [`pump`](Self::pump) (or
/// one of its variants): each frame is classified, reconciled, cached and
/// delivered to every subscriber before the next frame of that topic is
/// taken. Callbacks may subscribe and unsubscribe, but must not pump.
pub struct StateManager {
    transport: Arc<dyn Transport>,
    cache: Arc<SharedStateCache>,
    max_pending: Option<usize>,
    /// Known topics by name.
    registry: RwLock<HashMap<Topic, TopicConfig>>,
    /// Pipelines created on first subscribe; kept for the manager's lifetime.
    pipelines: RwLock<HashMap<Topic, Arc<TopicPipeline>>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl StateManager {
    /// Create a manager with its own cache.
    pub fn new(transport: Arc<dyn Transport>, config: SyncConfig) -> Result<Self> {
        Self::with_cache(transport, config, Arc::new(SharedStateCache::new()))
    }

    /// Create a manager publishing into an existing cache.
    pub fn with_cache(
        transport: Arc<dyn Transport>,
        config: SyncConfig,
        cache: Arc<SharedStateCache>,
    ) -> Result<Self> {
        config.validate()?;
        let manager = Self {
            transport,
            cache,
            max_pending: config.max_pending_batches,
            registry: RwLock::new(HashMap::new()),
            pipelines: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        };
        for topic in config.topics {
            manager.register_topic(topic)?;
        }
        Ok(manager)
    }

    /// Make a topic available for subscription.
    pub fn register_topic(&self, config: TopicConfig) -> Result<()> {
        let mut registry = self.registry.write();
        let topic = config.topic();
        if registry.contains_key(&topic) {
            return Err(SyncError::TopicExists(config.name));
        }
        registry.insert(topic, config);
        Ok(())
    }

    pub fn topic_config(&self, topic: &str) -> Option<TopicConfig> {
        self.registry.read().get(topic).cloned()
    }

    /// Registered topic names, sorted.
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<_> = self.registry.read().keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn cache(&self) -> &Arc<SharedStateCache> {
        &self.cache
    }

    /// Latest reconciled state of a topic.
    pub fn current(&self, topic: &str) -> Option<Arc<Value>> {
        self.cache.get(topic)
    }

    /// Subscribe a projection to a topic.
    ///
    /// The first subscriber opens the topic's push channel; later ones share
    /// it. If a state is cached, the new projection receives it before this
    /// returns. A failed open is reported to `on_error` only; the
    /// subscription stays registered and the next subscribe tries again.
    pub fn subscribe<V, P>(
        &self,
        topic: &str,
        projection: P,
        handlers: Handlers<V>,
    ) -> Result<SubscriptionHandle>
    where
        P: Fn(&Arc<Value>) -> V + Send + 'static,
        V: 'static,
    {
        let pipeline = self.pipeline(topic)?;
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));

        let Handlers {
            mut on_update,
            on_error,
        } = handlers;
        let deliver: DeliverFn = Box::new(move |state: &Arc<Value>| on_update(projection(state)));
        let subscriber = Arc::new(Subscriber {
            id,
            deliver: Mutex::new(deliver),
            on_error: Mutex::new(on_error),
        });

        let _frame = pipeline.frame_lock.lock();
        let open_error = {
            let mut subscribers = pipeline.subscribers.write();
            subscribers.insert(id, subscriber.clone());
            pipeline.ensure_connected(self.transport.as_ref())
        };
        debug!(topic = %pipeline.topic, id = subscriber.id.0, "Subscribed");

        if let Some(state) = self.cache.get(topic) {
            subscriber.deliver(&state);
        }
        if let Some(error) = open_error {
            subscriber.report(&error);
        }

        Ok(SubscriptionHandle {
            id,
            topic: pipeline.topic.clone(),
        })
    }

    /// Subscribe with views delivered on a channel.
    pub fn subscribe_channel<V, P>(
        &self,
        topic: &str,
        projection: P,
    ) -> Result<ChannelSubscription<V>>
    where
        P: Fn(&Arc<Value>) -> V + Send + 'static,
        V: Send + 'static,
    {
        let (sender, receiver) = unbounded();
        let errors = sender.clone();
        let handlers = Handlers::new(move |view| {
            let _ = sender.send(ViewEvent::Update(view));
        })
        .on_error(move |error| {
            let _ = errors.send(ViewEvent::Error(error.clone()));
        });
        let handle = self.subscribe(topic, projection, handlers)?;
        Ok(ChannelSubscription { handle, receiver })
    }

    /// Detach a subscription. The last one for a topic closes its connection;
    /// the cached state is kept. Returns false if it was already gone.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let Some(pipeline) = self.pipelines.read().get(&handle.topic).cloned() else {
            return false;
        };

        let released = {
            let mut subscribers = pipeline.subscribers.write();
            if subscribers.remove(&handle.id).is_none() {
                return false;
            }
            if subscribers.is_empty() {
                pipeline.connection.lock().take()
            } else {
                None
            }
        };
        debug!(topic = %handle.topic, id = handle.id.0, "Unsubscribed");

        if let Some(connection) = released {
            debug!(topic = %handle.topic, "Last subscriber left, closing push channel");
            connection.close();
        }
        true
    }

    /// Process every event currently available on every topic.
    pub fn pump(&self) -> usize {
        let pipelines: Vec<_> = self.pipelines.read().values().cloned().collect();
        pipelines
            .iter()
            .map(|pipeline| pipeline.drain(&self.cache))
            .sum()
    }

    /// Process every event currently available on one topic.
    pub fn pump_topic(&self, topic: &str) -> usize {
        match self.existing_pipeline(topic) {
            Some(pipeline) => pipeline.drain(&self.cache),
            None => 0,
        }
    }

    /// Wait up to `timeout` for an event on `topic`, then drain.
    pub fn pump_topic_timeout(&self, topic: &str, timeout: Duration) -> usize {
        let Some(pipeline) = self.existing_pipeline(topic) else {
            return 0;
        };
        {
            // Wait under the frame lock so a concurrent pump cannot overtake
            // the event taken here.
            let _frame = pipeline.frame_lock.lock();
            let Some(connection) = pipeline.current_connection() else {
                return 0;
            };
            let Some(event) = connection.next_timeout(timeout) else {
                return 0;
            };
            pipeline.handle_event(event, &self.cache);
        }
        1 + pipeline.drain(&self.cache)
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.existing_pipeline(topic)
            .map_or(0, |pipeline| pipeline.subscribers.read().len())
    }

    /// Whether the topic has a live push channel.
    pub fn is_connected(&self, topic: &str) -> bool {
        self.existing_pipeline(topic)
            .is_some_and(|pipeline| pipeline.is_connected())
    }

    /// Reconciler counters for a topic that has been subscribed to.
    pub fn reconciler_stats(&self, topic: &str) -> Option<ReconcilerStats> {
        self.existing_pipeline(topic)
            .map(|pipeline| pipeline.reconciler.lock().stats())
    }

    /// Patch batches waiting for the topic's first snapshot.
    pub fn pending_batches(&self, topic: &str) -> usize {
        self.existing_pipeline(topic)
            .map_or(0, |pipeline| pipeline.reconciler.lock().pending_len())
    }

    fn existing_pipeline(&self, topic: &str) -> Option<Arc<TopicPipeline>> {
        self.pipelines.read().get(topic).cloned()
    }

    fn pipeline(&self, topic: &str) -> Result<Arc<TopicPipeline>> {
        if let Some(pipeline) = self.existing_pipeline(topic) {
            return Ok(pipeline);
        }
        let config = self
            .topic_config(topic)
            .ok_or_else(|| SyncError::TopicNotRegistered(topic.to_string()))?;

        let mut pipelines = self.pipelines.write();
        let pipeline = pipelines
            .entry(config.topic())
            .or_insert_with(|| Arc::new(TopicPipeline::new(&config, self.max_pending)));
        Ok(pipeline.clone())
    }
}
