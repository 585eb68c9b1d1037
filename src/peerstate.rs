//! Autocrypt peer state — trimmed to the one collaborator the persistence
//! core needs: the version-34-to-39 migration repair pass (spec §4.C) loads
//! each `acpeerstates` row, recomputes its fingerprints and saves it back.
//! The full messenger's `Peerstate` also parses Autocrypt headers and tracks
//! degrade events; none of that is reachable from the schema migration, so
//! it is not reproduced here.

use crate::context::Context;
use crate::key::Fingerprint;
use crate::sql::{FingerprintRepair, Sql};

/// Autocrypt peer state for one address, as far as the persistence core's
/// migration repair pass needs to see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peerstate {
    addr: String,
    last_seen: i64,
    last_seen_autocrypt: i64,
    gossip_timestamp: i64,
    public_key: Option<Vec<u8>>,
    public_key_fingerprint: Option<Fingerprint>,
    gossip_key: Option<Vec<u8>>,
    gossip_key_fingerprint: Option<Fingerprint>,
    verified_key: Option<Vec<u8>>,
    verified_key_fingerprint: Option<Fingerprint>,
}

impl Peerstate {
    pub fn new(_context: &Context, addr: impl Into<String>) -> Self {
        Peerstate {
            addr: addr.into(),
            last_seen: 0,
            last_seen_autocrypt: 0,
            gossip_timestamp: 0,
            public_key: None,
            public_key_fingerprint: None,
            gossip_key: None,
            gossip_key_fingerprint: None,
            verified_key: None,
            verified_key_fingerprint: None,
        }
    }

    /// Loads the row for `addr`, if any. Returns `false` (rather than an
    /// error) when there is no such row, matching the boolean collaborator
    /// contract the migration repair pass expects.
    pub fn load_by_addr(&mut self, sql: &Sql, addr: &str) -> bool {
        let loaded = sql.query_row(
            "SELECT addr, last_seen, last_seen_autocrypt, gossip_timestamp, \
             public_key, public_key_fingerprint, gossip_key, gossip_key_fingerprint, \
             verified_key, verified_key_fingerprint \
             FROM acpeerstates WHERE addr=? COLLATE NOCASE",
            [addr],
            |row| {
                Ok(Peerstate {
                    addr: row.get(0)?,
                    last_seen: row.get(1)?,
                    last_seen_autocrypt: row.get(2)?,
                    gossip_timestamp: row.get(3)?,
                    public_key: row.get(4)?,
                    public_key_fingerprint: row.get(5)?,
                    gossip_key: row.get(6)?,
                    gossip_key_fingerprint: row.get(7)?,
                    verified_key: row.get(8)?,
                    verified_key_fingerprint: row.get(9)?,
                })
            },
        );
        match loaded {
            Ok(peerstate) => {
                *self = peerstate;
                true
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => false,
            Err(_) => false,
        }
    }

    /// Recomputes `*_fingerprint` from the corresponding key bytes. Returns
    /// whether anything changed, so callers can skip a write when nothing
    /// did.
    pub fn recalc_fingerprint(&mut self) -> bool {
        let mut changed = false;

        let new_public = self.public_key.as_deref().map(Fingerprint::of);
        if new_public != self.public_key_fingerprint {
            self.public_key_fingerprint = new_public;
            changed = true;
        }

        let new_gossip = self.gossip_key.as_deref().map(Fingerprint::of);
        if new_gossip != self.gossip_key_fingerprint {
            self.gossip_key_fingerprint = new_gossip;
            changed = true;
        }

        let new_verified = self.verified_key.as_deref().map(Fingerprint::of);
        if new_verified != self.verified_key_fingerprint {
            self.verified_key_fingerprint = new_verified;
            changed = true;
        }

        changed
    }

    /// Writes the current state back to `acpeerstates`. If `create_if_missing`
    /// is false and there is no existing row for `self.addr`, this is a no-op
    /// that returns `false`.
    pub fn save_to_db(&self, sql: &Sql, create_if_missing: bool) -> bool {
        if !create_if_missing {
            let exists: Option<i64> = sql
                .query_row_optional(
                    "SELECT id FROM acpeerstates WHERE addr=? COLLATE NOCASE",
                    [&self.addr],
                    |row| row.get(0),
                )
                .unwrap_or(None);
            if exists.is_none() {
                return false;
            }
        }

        sql.execute(
            "INSERT INTO acpeerstates \
             (addr, last_seen, last_seen_autocrypt, gossip_timestamp, \
              public_key, public_key_fingerprint, gossip_key, gossip_key_fingerprint, \
              verified_key, verified_key_fingerprint) \
             VALUES (?,?,?,?,?,?,?,?,?,?) \
             ON CONFLICT(addr) DO UPDATE SET \
               last_seen=excluded.last_seen, \
               last_seen_autocrypt=excluded.last_seen_autocrypt, \
               gossip_timestamp=excluded.gossip_timestamp, \
               public_key=excluded.public_key, \
               public_key_fingerprint=excluded.public_key_fingerprint, \
               gossip_key=excluded.gossip_key, \
               gossip_key_fingerprint=excluded.gossip_key_fingerprint, \
               verified_key=excluded.verified_key, \
               verified_key_fingerprint=excluded.verified_key_fingerprint",
            rusqlite::params![
                self.addr,
                self.last_seen,
                self.last_seen_autocrypt,
                self.gossip_timestamp,
                self.public_key,
                self.public_key_fingerprint,
                self.gossip_key,
                self.gossip_key_fingerprint,
                self.verified_key,
                self.verified_key_fingerprint,
            ],
        )
        .is_ok()
    }
}

impl FingerprintRepair for Peerstate {
    fn repair(&self, context: &Context, sql: &Sql, addr: &str) -> bool {
        let mut peerstate = Peerstate::new(context, addr);
        if !peerstate.load_by_addr(sql, addr) {
            return false;
        }
        if peerstate.recalc_fingerprint() {
            peerstate.save_to_db(sql, false)
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recalc_fingerprint_reports_change() {
        let ctx = Context::new(None);
        let mut p = Peerstate::new(&ctx, "a@b");
        assert!(!p.recalc_fingerprint());
        p.gossip_key = Some(b"some key material".to_vec());
        assert!(p.recalc_fingerprint());
        assert_eq!(
            p.gossip_key_fingerprint,
            Some(Fingerprint::of(b"some key material"))
        );
    }
}
