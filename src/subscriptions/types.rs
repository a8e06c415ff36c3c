//! Subscription types for live topic views.

use crate::error::TransportError;
use crate::types::Topic;
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    pub topic: Topic,
}

pub(crate) type UpdateFn<V> = Box<dyn FnMut(V) + Send>;
pub(crate) type ErrorFn = Box<dyn FnMut(&TransportError) + Send>;

/// Callbacks receiving a subscription's derived views and transport errors.
pub struct Handlers<V> {
    pub(crate) on_update: UpdateFn<V>,
    pub(crate) on_error: ErrorFn,
}

impl<V> Handlers<V> {
    /// Deliver views to `on_update`; transport errors are ignored.
    pub fn new(on_update: impl FnMut(V) + Send + 'static) -> Self {
        Self {
            on_update: Box::new(on_update),
            on_error: Box::new(|_| {}),
        }
    }

    /// Also report transport errors to `on_error`.
    pub fn on_error(mut self, on_error: impl FnMut(&TransportError) + Send + 'static) -> Self {
        self.on_error = Box::new(on_error);
        self
    }
}

/// Event received through a [`ChannelSubscription`].
#[derive(Clone, Debug, PartialEq)]
pub enum ViewEvent<V> {
    Update(V),
    Error(TransportError),
}

/// Subscription whose views arrive on a channel instead of a callback.
pub struct ChannelSubscription<V> {
    pub handle: SubscriptionHandle,
    /// Channel to receive views.
    pub receiver: Receiver<ViewEvent<V>>,
}

impl<V> ChannelSubscription<V> {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<ViewEvent<V>, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<ViewEvent<V>, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ViewEvent<V>, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Most recent view currently queued, discarding older ones.
    pub fn latest(&self) -> Option<V> {
        let mut latest = None;
        while let Ok(event) = self.receiver.try_recv() {
            if let ViewEvent::Update(view) = event {
                latest = Some(view);
            }
        }
        latest
    }
}
