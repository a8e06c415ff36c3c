//! In-process transport backed by crossbeam channels.
//!
//! The server side is driven through the transport handle: frames pushed to a
//! URL reach every live connection opened for that URL.

use super::{Endpoint, StreamConnection, StreamEvent, Transport};
use crate::error::TransportError;
use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

#[derive(Default)]
struct ChannelState {
    /// Live connections by URL.
    live: HashMap<String, Vec<(u64, Sender<StreamEvent>)>>,
    /// URLs whose opens fail, with the reason reported.
    refused: HashMap<String, String>,
    /// Total successful opens per URL.
    opens: HashMap<String, usize>,
    next_id: u64,
}

/// Transport whose push channels live in process memory.
#[derive(Clone, Default)]
pub struct ChannelTransport {
    state: Arc<Mutex<ChannelState>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send a text frame to every live connection for `url`.
    ///
    /// Returns the number of connections that received it.
    pub fn push(&self, url: &str, frame: impl Into<String>) -> usize {
        self.send(url, StreamEvent::Message(frame.into()))
    }

    /// Report a stream error to every live connection for `url`.
    pub fn fail(&self, url: &str, message: impl Into<String>) -> usize {
        let error = TransportError::Stream {
            url: url.to_string(),
            message: message.into(),
        };
        self.send(url, StreamEvent::Error(error))
    }

    /// Drop the server side of every live connection for `url`.
    pub fn disconnect(&self, url: &str) -> usize {
        self.state
            .lock()
            .live
            .remove(url)
            .map(|senders| senders.len())
            .unwrap_or(0)
    }

    /// Make future opens of `url` fail.
    pub fn refuse(&self, url: &str, reason: impl Into<String>) {
        self.state
            .lock()
            .refused
            .insert(url.to_string(), reason.into());
    }

    /// Allow opens of `url` again.
    pub fn accept(&self, url: &str) {
        self.state.lock().refused.remove(url);
    }

    /// Number of connections currently open for `url`.
    pub fn open_connections(&self, url: &str) -> usize {
        self.state.lock().live.get(url).map_or(0, Vec::len)
    }

    /// Number of successful opens for `url` since creation.
    pub fn total_opens(&self, url: &str) -> usize {
        self.state.lock().opens.get(url).copied().unwrap_or(0)
    }

    fn send(&self, url: &str, event: StreamEvent) -> usize {
        let state = self.state.lock();
        let Some(senders) = state.live.get(url) else {
            return 0;
        };
        senders
            .iter()
            .filter(|(_, sender)| sender.send(event.clone()).is_ok())
            .count()
    }
}

impl Transport for ChannelTransport {
    fn open(&self, endpoint: &Endpoint) -> Result<StreamConnection, TransportError> {
        let mut state = self.state.lock();

        if let Some(reason) = state.refused.get(&endpoint.url) {
            return Err(TransportError::OpenFailed {
                url: endpoint.url.clone(),
                reason: reason.clone(),
            });
        }

        let (sender, receiver) = unbounded();
        // Unbounded and the receiver is alive, so this cannot fail.
        let _ = sender.send(StreamEvent::Open);

        let id = state.next_id;
        state.next_id += 1;
        state
            .live
            .entry(endpoint.url.clone())
            .or_default()
            .push((id, sender));
        *state.opens.entry(endpoint.url.clone()).or_default() += 1;
        trace!(url = %endpoint.url, id, "Opened in-process channel");

        let shared = self.state.clone();
        let url = endpoint.url.clone();
        let connection =
            StreamConnection::new(endpoint.clone(), receiver).with_release(move || {
                let mut state = shared.lock();
                if let Some(senders) = state.live.get_mut(&url) {
                    senders.retain(|(other, _)| *other != id);
                    if senders.is_empty() {
                        state.live.remove(&url);
                    }
                }
            });
        Ok(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CredentialsMode;

    const URL: &str = "mem://basketball-live";

    fn endpoint() -> Endpoint {
        Endpoint::new(URL, CredentialsMode::SameOrigin)
    }

    #[test]
    fn test_open_emits_open_event() {
        let transport = ChannelTransport::new();
        let conn = transport.open(&endpoint()).unwrap();
        assert_eq!(conn.try_next(), Some(StreamEvent::Open));
        assert_eq!(transport.open_connections(URL), 1);
    }

    #[test]
    fn test_push_reaches_connection() {
        let transport = ChannelTransport::new();
        let conn = transport.open(&endpoint()).unwrap();
        conn.try_next();

        assert_eq!(transport.push(URL, "[]"), 1);
        assert_eq!(conn.try_next(), Some(StreamEvent::Message("[]".into())));
        assert_eq!(transport.push("mem://other", "[]"), 0);
    }

    #[test]
    fn test_close_releases_slot() {
        let transport = ChannelTransport::new();
        let conn = transport.open(&endpoint()).unwrap();
        conn.close();
        conn.close();
        assert_eq!(transport.open_connections(URL), 0);
        assert_eq!(transport.total_opens(URL), 1);
        assert_eq!(transport.push(URL, "[]"), 0);
    }

    #[test]
    fn test_refuse_and_accept() {
        let transport = ChannelTransport::new();
        transport.refuse(URL, "503");
        let err = transport.open(&endpoint()).unwrap_err();
        assert_eq!(
            err,
            TransportError::OpenFailed {
                url: URL.to_string(),
                reason: "503".to_string()
            }
        );

        transport.accept(URL);
        assert!(transport.open(&endpoint()).is_ok());
    }

    #[test]
    fn test_fail_and_disconnect() {
        let transport = ChannelTransport::new();
        let conn = transport.open(&endpoint()).unwrap();
        conn.try_next();

        transport.fail(URL, "bad gateway");
        assert!(matches!(
            conn.try_next(),
            Some(StreamEvent::Error(TransportError::Stream { .. }))
        ));

        assert_eq!(transport.disconnect(URL), 1);
        assert!(matches!(
            conn.try_next(),
            Some(StreamEvent::Error(TransportError::Disconnected { .. }))
        ));
    }
}
