//! Push-channel connections.
//!
//! A [`Transport`] opens one [`StreamConnection`] per endpoint. The connection
//! delivers [`StreamEvent`]s in transport order through a single-consumer
//! channel and is closed explicitly (or on drop). There is no retry logic
//! here: if the transport reconnects on its own, frames simply resume.

mod channel;

pub use channel::ChannelTransport;

use crate::config::CredentialsMode;
use crate::error::TransportError;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Where and how to open a push channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub credentials: CredentialsMode,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, credentials: CredentialsMode) -> Self {
        Self {
            url: url.into(),
            credentials,
        }
    }
}

/// Inbound lifecycle and data events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// The channel is open.
    Open,
    /// One raw text frame.
    Message(String),
    /// The channel failed or reported an error.
    Error(TransportError),
}

/// Opens push channels.
pub trait Transport: Send + Sync {
    fn open(&self, endpoint: &Endpoint) -> Result<StreamConnection, TransportError>;
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// One open push channel.
pub struct StreamConnection {
    endpoint: Endpoint,
    /// `None` once closed or after the disconnect has been reported.
    events: Mutex<Option<Receiver<StreamEvent>>>,
    release: Mutex<Option<ReleaseHook>>,
    closed: AtomicBool,
}

impl StreamConnection {
    pub fn new(endpoint: Endpoint, events: Receiver<StreamEvent>) -> Self {
        Self {
            endpoint,
            events: Mutex::new(Some(events)),
            release: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Attach a hook that releases the underlying transport on close.
    pub fn with_release(self, release: impl FnOnce() + Send + 'static) -> Self {
        *self.release.lock() = Some(Box::new(release));
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Whether events can still arrive.
    pub fn is_active(&self) -> bool {
        self.events.lock().is_some()
    }

    /// Whether `close` has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Next event if one is ready (non-blocking).
    pub fn try_next(&self) -> Option<StreamEvent> {
        let mut events = self.events.lock();
        let result = events.as_ref()?.try_recv();
        match result {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                *events = None;
                Some(self.disconnected())
            }
        }
    }

    /// Next event, waiting up to `timeout`.
    pub fn next_timeout(&self, timeout: Duration) -> Option<StreamEvent> {
        // Wait on a clone so `close` is never blocked behind the wait.
        let receiver = self.events.lock().as_ref()?.clone();
        match receiver.recv_timeout(timeout) {
            Ok(event) => self.is_active().then_some(event),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                let mut events = self.events.lock();
                events.take().map(|_| self.disconnected())
            }
        }
    }

    fn disconnected(&self) -> StreamEvent {
        StreamEvent::Error(TransportError::Disconnected {
            url: self.endpoint.url.clone(),
        })
    }

    /// Detach the receiver and release the transport. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.events.lock().take();
        let release = self.release.lock().take();
        if let Some(release) = release {
            release();
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConnection")
            .field("endpoint", &self.endpoint)
            .field("active", &self.is_active())
            .finish()
    }
}
