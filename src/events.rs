//! Minimal event/log sink used by [`crate::context::Context`].
//!
//! The full messenger reports dozens of event kinds (message and chat
//! changes, IMAP/SMTP progress, secure-join handshakes...); the persistence
//! core only ever needs to report informational/warning/error strings, so
//! this is trimmed down to that.

use std::sync::mpsc::{Receiver, Sender};

#[derive(Debug)]
pub struct Events {
    sender: Sender<Event>,
    receiver: Receiver<Event>,
}

impl Default for Events {
    fn default() -> Self {
        let (sender, receiver) = std::sync::mpsc::channel();
        Self { sender, receiver }
    }
}

impl Events {
    pub fn emit(&self, event: Event) {
        // The receiving end is only ever dropped together with `self`, so a
        // send error here would mean we are emitting through a half-torn-down
        // `Events`; silently dropping the event is preferable to panicking
        // inside a logging call.
        let _ = self.sender.send(event);
    }

    /// Retrieve the event emitter, which can be cloned and handed to readers
    /// independently of the `Events` instance itself.
    pub fn get_emitter(&self) -> EventEmitter {
        EventEmitter(self.sender.clone())
    }

    /// Blocking receive of the next emitted event, mainly for tests.
    pub fn recv(&self) -> Option<Event> {
        self.receiver.recv().ok()
    }
}

#[derive(Debug, Clone)]
pub struct EventEmitter(Sender<Event>);

impl EventEmitter {
    pub fn emit(&self, event: Event) {
        let _ = self.0.send(event);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// An informational string, not meant to interrupt the end user.
    Info(String),
    /// Something unexpected happened, but execution continued.
    Warning(String),
    /// Something failed; the end user should probably learn about it.
    Error(String),
}
