//! In-process transport for tests and offline demos.
//!
//! [`MemoryTransport`] implements [`ChannelTransport`] against shared
//! in-memory state instead of a broker. The paired [`MemoryHandle`] is the
//! test's remote control: script connect failures, toggle publish
//! failures, inspect everything the client published, inject server
//! pushes, and cut the connection.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use expedition_types::{ClientEvent, ServerEvent};

use crate::channel::{ChannelError, ChannelTransport, EVENT_CHANNEL_CAPACITY, ServerEventStream};

/// State shared between the transport and its handle.
#[derive(Debug, Default)]
struct Shared {
    /// Every event the client has published, in order.
    published: Mutex<Vec<ClientEvent>>,
    /// Number of upcoming connect attempts to fail.
    fail_next_connects: AtomicU32,
    /// When set, every connect attempt fails.
    fail_all_connects: AtomicBool,
    /// When set, every publish fails.
    fail_publishes: AtomicBool,
    /// Total connect attempts observed.
    connect_attempts: AtomicU32,
    /// Downlink sender for the current connection, if one is up.
    downlink: Mutex<Option<mpsc::Sender<ServerEvent>>>,
}

/// In-memory implementation of [`ChannelTransport`].
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

/// Remote control over a [`MemoryTransport`].
#[derive(Clone)]
pub struct MemoryHandle {
    shared: Arc<Shared>,
}

impl MemoryTransport {
    /// Create a transport and the handle that controls it.
    pub fn new() -> (Self, MemoryHandle) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: Arc::clone(&shared),
            },
            MemoryHandle { shared },
        )
    }
}

impl ChannelTransport for MemoryTransport {
    async fn connect(&mut self) -> Result<ServerEventStream, ChannelError> {
        self.shared.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let scripted_failure = self.shared.fail_all_connects.load(Ordering::SeqCst)
            || self
                .shared
                .fail_next_connects
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if scripted_failure {
            return Err(ChannelError::Connect("scripted connect failure".to_owned()));
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        if let Ok(mut downlink) = self.shared.downlink.lock() {
            *downlink = Some(tx);
        }
        Ok(rx)
    }

    async fn publish(&mut self, event: &ClientEvent) -> Result<(), ChannelError> {
        if self.shared.fail_publishes.load(Ordering::SeqCst) {
            return Err(ChannelError::Publish("scripted publish failure".to_owned()));
        }
        if let Ok(mut published) = self.shared.published.lock() {
            published.push(event.clone());
        }
        Ok(())
    }

    async fn close(&mut self) {
        if let Ok(mut downlink) = self.shared.downlink.lock() {
            downlink.take();
        }
    }
}

impl MemoryHandle {
    /// Snapshot of everything published so far, in order.
    pub fn published(&self) -> Vec<ClientEvent> {
        self.shared
            .published
            .lock()
            .map(|published| published.clone())
            .unwrap_or_default()
    }

    /// Total connect attempts the transport has seen.
    pub fn connect_attempts(&self) -> u32 {
        self.shared.connect_attempts.load(Ordering::SeqCst)
    }

    /// Fail the next `n` connect attempts.
    pub fn fail_next_connects(&self, n: u32) {
        self.shared.fail_next_connects.store(n, Ordering::SeqCst);
    }

    /// Fail every connect attempt until cleared.
    pub fn fail_all_connects(&self, fail: bool) {
        self.shared.fail_all_connects.store(fail, Ordering::SeqCst);
    }

    /// Fail every publish until cleared.
    pub fn fail_publishes(&self, fail: bool) {
        self.shared.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Push a server event down the current connection.
    ///
    /// Returns `false` when no connection is up or the client has stopped
    /// listening.
    pub async fn push_server_event(&self, event: ServerEvent) -> bool {
        let sender = self
            .shared
            .downlink
            .lock()
            .ok()
            .and_then(|downlink| downlink.clone());
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Cut the current connection, as a transport-level disconnect would.
    pub fn drop_connection(&self) {
        if let Ok(mut downlink) = self.shared.downlink.lock() {
            downlink.take();
        }
    }
}
