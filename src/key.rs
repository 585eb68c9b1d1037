//! Key material as the persistence core sees it.
//!
//! The full messenger's `key.rs` wraps rPGP key types end to end (parsing,
//! armoring, signing...); none of that belongs in the persistence core. What
//! survives here is only the bit the schema itself depends on: fingerprints
//! are stored as upper-cased ASCII hex (spec invariant on the
//! `acpeerstates.*_fingerprint` columns), computed with the same
//! `sha-1`/`hex` pair the teacher uses for its own `Key::fingerprint`.

use sha1::{Digest, Sha1};

/// A SHA-1 fingerprint of a key's raw bytes, rendered as upper-cased ASCII
/// hex for storage in a `*_fingerprint` column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of some key material. Mirrors the teacher's
    /// `Key::fingerprint`, which hex-encodes (upper-case) the digest of the
    /// key's bytes.
    pub fn of(key_bytes: &[u8]) -> Self {
        let digest = Sha1::digest(key_bytes);
        Fingerprint(hex::encode_upper(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl rusqlite::types::FromSql for Fingerprint {
    fn column_result(value: rusqlite::types::ValueRef) -> rusqlite::types::FromSqlResult<Self> {
        String::column_result(value).map(Fingerprint)
    }
}

impl rusqlite::types::ToSql for Fingerprint {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(rusqlite::types::ToSqlOutput::from(self.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_upper_case_ascii() {
        let fp = Fingerprint::of(b"some key bytes");
        assert!(fp
            .as_str()
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(Fingerprint::of(b"abc"), Fingerprint::of(b"abc"));
        assert_ne!(Fingerprint::of(b"abc"), Fingerprint::of(b"abd"));
    }
}
