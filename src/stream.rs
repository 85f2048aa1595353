// Hydro Sentinel - Water monitoring alert engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Inbound snapshot stream.
//!
//! A feed is a single-consumer channel of [`RawFields`]. The producer side
//! ([`FeedPublisher`]) may be cloned freely; the consumer side
//! ([`Subscription`]) is unique and delivers snapshots in arrival order.
//!
//! The feed closes when every publisher and every [`CancelHandle`] has been
//! dropped, or when a cancel handle is triggered. Either way the consumer
//! sees `None` from [`Subscription::next`] once queued snapshots ahead of a
//! cancel have been delivered.

use crate::error::{FeedError, SubscribeError};
use crate::snapshot::RawFields;
use log::{debug, warn};
use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

enum Message {
    Fields(RawFields),
    Stop,
}

/// Create a connected publisher/subscription pair.
pub fn feed() -> (FeedPublisher, Subscription) {
    let (tx, rx) = mpsc::channel();
    (
        FeedPublisher { tx },
        Subscription {
            rx,
            stopped: Cell::new(false),
        },
    )
}

/// Producer side of a feed.
#[derive(Clone)]
pub struct FeedPublisher {
    tx: Sender<Message>,
}

impl FeedPublisher {
    /// Push one snapshot.
    ///
    /// Fails with [`FeedError::Closed`] once the consumer has unsubscribed.
    pub fn publish(&self, fields: RawFields) -> Result<(), FeedError> {
        self.tx
            .send(Message::Fields(fields))
            .map_err(|_| FeedError::Closed)
    }

    /// Handle that stops the consumer from any thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.tx.clone(),
        }
    }
}

impl std::fmt::Debug for FeedPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedPublisher").finish_non_exhaustive()
    }
}

/// Stops a subscription, waking it if it is blocked in [`Subscription::next`].
#[derive(Clone)]
pub struct CancelHandle {
    tx: Sender<Message>,
}

impl CancelHandle {
    /// Request the consumer to stop. Idempotent.
    pub fn cancel(&self) {
        if self.tx.send(Message::Stop).is_err() {
            debug!("cancel requested after consumer unsubscribed");
        }
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle").finish_non_exhaustive()
    }
}

/// Consumer side of a feed.
pub struct Subscription {
    rx: Receiver<Message>,
    stopped: Cell<bool>,
}

impl Subscription {
    /// Block until the next snapshot. `None` once the feed is closed or cancelled.
    pub fn next(&self) -> Option<RawFields> {
        if self.stopped.get() {
            return None;
        }
        match self.rx.recv() {
            Ok(Message::Fields(fields)) => Some(fields),
            Ok(Message::Stop) => {
                self.stopped.set(true);
                None
            }
            Err(_) => None,
        }
    }

    /// Poll without blocking.
    ///
    /// `Ok(None)` when nothing is queued, `Err(Closed)` when the feed has
    /// ended.
    pub fn try_next(&self) -> Result<Option<RawFields>, FeedError> {
        if self.stopped.get() {
            return Err(FeedError::Closed);
        }
        match self.rx.try_recv() {
            Ok(Message::Fields(fields)) => Ok(Some(fields)),
            Ok(Message::Stop) => {
                self.stopped.set(true);
                Err(FeedError::Closed)
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(FeedError::Closed),
        }
    }

    /// Whether a cancel handle stopped this subscription.
    pub fn is_cancelled(&self) -> bool {
        self.stopped.get()
    }

    /// Stop receiving. Later publishes fail with [`FeedError::Closed`].
    pub fn unsubscribe(self) {
        debug!("subscription released");
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.stopped.get())
            .finish_non_exhaustive()
    }
}

/// A source of raw snapshots that can be subscribed to.
pub trait SnapshotSource {
    /// Open the stream. Failure is fatal for the engine and must reach the caller.
    fn subscribe(&mut self) -> Result<Subscription, SubscribeError>;
}

/// In-process source with a single subscriber.
#[derive(Debug)]
pub struct MemorySource {
    publisher: Option<FeedPublisher>,
    pending: Option<Subscription>,
}

impl MemorySource {
    pub fn new() -> Self {
        let (publisher, subscription) = feed();
        Self {
            publisher: Some(publisher),
            pending: Some(subscription),
        }
    }

    /// Push one snapshot to the subscriber.
    pub fn publish(&self, fields: RawFields) -> Result<(), FeedError> {
        match &self.publisher {
            Some(publisher) => publisher.publish(fields),
            None => Err(FeedError::Closed),
        }
    }

    /// Publisher for use from another thread.
    pub fn publisher(&self) -> Option<FeedPublisher> {
        self.publisher.clone()
    }

    /// Cancel handle for the subscriber, if the source is still open.
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        self.publisher.as_ref().map(FeedPublisher::cancel_handle)
    }

    /// Drop this source's publisher. The feed ends once every clone is gone.
    pub fn close(&mut self) {
        self.publisher = None;
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotSource for MemorySource {
    fn subscribe(&mut self) -> Result<Subscription, SubscribeError> {
        if self.publisher.is_none() {
            warn!("memory source closed before subscription");
            return Err(SubscribeError::Unavailable("source closed".to_string()));
        }
        match self.pending.take() {
            Some(subscription) => Ok(subscription),
            None => {
                warn!("memory source already has a subscriber");
                Err(SubscribeError::AlreadySubscribed)
            }
        }
    }
}
