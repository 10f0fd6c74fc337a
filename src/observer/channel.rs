//! Channel observer
//!
//! Hands copies of every event to an in-process consumer over a crossbeam
//! channel.

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::{ProxyError, Result};
use super::Observer;

/// Which hook produced a notification
#[derive(Debug, Clone, PartialEq)]
pub enum Notification<E> {
    Begin(E),
    Complete(E),
}

impl<E> Notification<E> {
    pub fn event(&self) -> &E {
        match self {
            Notification::Begin(event) | Notification::Complete(event) => event,
        }
    }

    pub fn is_begin(&self) -> bool {
        matches!(self, Notification::Begin(_))
    }
}

/// Sends a clone of each event down a channel
///
/// With a bounded channel a slow consumer blocks the sessions that feed
/// it. A dropped receiver turns every send into an observer error.
pub struct ChannelObserver<E> {
    name: String,
    sender: Sender<Notification<E>>,
}

impl<E> ChannelObserver<E> {
    /// Observer plus the receiving end of a fresh unbounded channel
    pub fn unbounded(name: impl Into<String>) -> (Self, Receiver<Notification<E>>) {
        let (sender, receiver) = channel::unbounded();
        (Self::with_sender(name, sender), receiver)
    }

    /// Observer plus the receiving end of a fresh channel holding `cap` items
    pub fn bounded(name: impl Into<String>, cap: usize) -> (Self, Receiver<Notification<E>>) {
        let (sender, receiver) = channel::bounded(cap);
        (Self::with_sender(name, sender), receiver)
    }

    pub fn with_sender(name: impl Into<String>, sender: Sender<Notification<E>>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }

    fn send(&self, notification: Notification<E>) -> Result<()> {
        self.sender
            .send(notification)
            .map_err(|_| ProxyError::observer(&self.name, "receiver disconnected"))
    }
}

impl<E: Clone + Send> Observer<E> for ChannelObserver<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_begin(&self, event: &E) -> Result<()> {
        self.send(Notification::Begin(event.clone()))
    }

    fn on_complete(&self, event: &E) -> Result<()> {
        self.send(Notification::Complete(event.clone()))
    }
}
