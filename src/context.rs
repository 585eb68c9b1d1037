//! The host-side log/event sink the persistence core reports through.
//!
//! In the full messenger, `Context` is the big shared object that owns the
//! database, the IMAP/SMTP schedulers, blob directory, and so on, and `Sql`
//! is just one of its fields. This crate inverts that relationship: the
//! persistence core is the thing being built, and `Context` is trimmed down
//! to the one thing it contributes to that core — a place to call `info!`/
//! `warn!`/`error!` on. A real embedding application's `Context` would carry
//! everything else; `Sql::open` only ever borrows this slice of it.

use std::sync::Arc;

use crate::events::{Event, EventEmitter, Events};

/// A cheap-to-clone handle callers pass to [`crate::sql::Sql::open`] so
/// migration and bootstrap code has somewhere to log to.
#[derive(Clone, Debug)]
pub struct Context {
    inner: Arc<InnerContext>,
}

#[derive(Debug)]
struct InnerContext {
    os_name: Option<String>,
    events: Events,
}

impl Context {
    pub fn new(os_name: impl Into<Option<String>>) -> Self {
        Context {
            inner: Arc::new(InnerContext {
                os_name: os_name.into(),
                events: Events::default(),
            }),
        }
    }

    /// Emits a single event. Called by the `info!`/`warn!`/`error!` macros.
    pub fn call_cb(&self, event: Event) {
        self.inner.events.emit(event);
    }

    pub fn emit_event(&self, event: Event) {
        self.call_cb(event);
    }

    pub fn get_event_emitter(&self) -> EventEmitter {
        self.inner.events.get_emitter()
    }

    pub fn os_name(&self) -> Option<&str> {
        self.inner.os_name.as_deref()
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_info_through_call_cb() {
        let ctx = Context::new(Some("FakeOS".into()));
        info!(ctx, "hello {}", "world");
        assert_eq!(
            ctx.inner.events.recv(),
            Some(Event::Info("hello world".into()))
        );
    }
}
