//! Persistence core for a chat-over-email messenger: connection lifecycle,
//! prepared-statement reuse, a forward-only schema migration ladder, a
//! central lock plus nested transactions, and a typed config key/value
//! store.
//!
//! Message parsing, MIME, E2EE and IMAP/SMTP plumbing live above this crate
//! and are not its concern; the only place this crate reaches out past its
//! own schema is the injected [`sql::FingerprintRepair`] collaborator used
//! by the version-34 migration repair pass.

#[macro_use]
pub mod log;

pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod events;
pub mod key;
pub mod peerstate;
pub mod sql;

pub mod test_utils;

pub use context::Context;
pub use error::{Error, Result};
pub use events::Event;
pub use sql::{FingerprintRepair, OpenFlags, Sql};
