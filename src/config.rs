//! Typed config keys over the raw string key/value store in [`crate::sql`].
//!
//! The full messenger's `Config` enum (teacher's `src/config.rs`) lists
//! every user-facing setting key with `#[strum(serialize_all = "snake_case")]`
//! and dispatches get/set through `EnumProperty`/`IntoEnumIterator`. The
//! persistence core only needs the one key it manages itself —
//! `dbversion` — so this is that pattern trimmed to a single variant, ready
//! for an embedding application to extend.

use strum_macros::{AsRefStr, EnumString};

use crate::error::Result;
use crate::sql::Sql;

/// A typed config key. `AsRefStr`/`EnumString` give it the same
/// `snake_case` string form the raw `config` table stores, so
/// [`Sql::get_config`]/[`Sql::set_config`] can delegate straight to the
/// existing raw string-keyed methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ConfigKey {
    /// The schema version this handle's migration ladder last persisted.
    Dbversion,
}

impl Sql {
    /// Typed wrapper over [`Sql::get_raw_config`].
    pub fn get_config(&self, key: ConfigKey) -> Option<String> {
        self.get_raw_config(key.as_ref())
    }

    /// Typed wrapper over [`Sql::set_raw_config`].
    pub fn set_config(&self, key: ConfigKey, value: Option<&str>) -> Result<()> {
        self.set_raw_config(key.as_ref(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestStore;

    #[test]
    fn dbversion_key_round_trips_through_raw_store() {
        crate::test_utils::init_test_logging();
        assert_eq!(ConfigKey::Dbversion.as_ref(), "dbversion");

        let store = TestStore::new();
        assert_eq!(
            store.sql.get_config(ConfigKey::Dbversion),
            store.sql.get_raw_config("dbversion")
        );
    }
}
