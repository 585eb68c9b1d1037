//! Utilities to help writing tests.
//!
//! This module is only compiled for test runs.

use tempfile::{tempdir, TempDir};

use crate::context::Context;
use crate::sql::Sql;

/// A [`Sql`] handle backed by a temporary directory, cleaned up on drop.
///
/// Mirrors the teacher's `TestContext` (tempdir + context, torn down
/// automatically), trimmed to this crate's synchronous `Sql` instead of the
/// full async `Context`.
pub struct TestStore {
    pub ctx: Context,
    pub sql: Sql,
    pub dir: TempDir,
}

impl TestStore {
    /// Creates a new, opened `TestStore` with a database named "db.sqlite"
    /// in a fresh temporary directory.
    pub fn new() -> Self {
        Self::new_named(None)
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self::new_named(Some(name.into()))
    }

    fn new_named(name: Option<String>) -> Self {
        let dir = tempdir().expect("failed to create tempdir");
        let dbfile = dir.path().join("db.sqlite");
        let ctx = Context::new(name);
        let sql = Sql::new();
        sql.open(&ctx, &dbfile, false, None)
            .expect("failed to open test database");
        Self { ctx, sql, dir }
    }

    pub fn dbfile(&self) -> std::path::PathBuf {
        self.dir.path().join("db.sqlite")
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs a `tracing` subscriber that prints to stderr, once per test
/// process. Mirrors the teacher's `deltachat-repl` binary's own
/// `tracing-subscriber`/`nu-ansi-term` setup, trimmed to a plain
/// color-by-level layer with no `EnvFilter` knobs to configure from a CLI.
///
/// Safe to call from every test; only the first call takes effect.
#[cfg(test)]
pub fn init_test_logging() {
    use once_cell::sync::OnceCell;
    use tracing_subscriber::prelude::*;

    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_init(|| {
        let layer = tracing_subscriber::fmt::layer().with_ansi(true).compact();
        let _ = tracing::subscriber::set_global_default(
            tracing_subscriber::Registry::default().with(layer),
        );
        log::info!(
            "{}",
            nu_ansi_term::Color::Green.paint("test logging initialized")
        );
    });
}
