//! First-time schema creation and reserved-row seeding.
//!
//! Grounded in the teacher's legacy `dc_sqlite3_open` bootstrap block: the
//! exact `CREATE TABLE`/`CREATE INDEX`/`INSERT` statements below are the
//! same ones that block runs the first time `config` does not exist yet,
//! down to the reserved contact/chat/message rows and the
//! [`Origin::Internal`] flag stamped on them.

use rusqlite::Connection;

use crate::constants::Origin;
use crate::error::{Error, Result};

/// Runs once, only when the `config` table does not exist yet. Leaves the
/// engine at schema version 0; the migration ladder in
/// [`super::migrations`] takes it from there.
pub(super) fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE config (id INTEGER PRIMARY KEY, keyname TEXT, value TEXT);
         CREATE INDEX config_index1 ON config (keyname);

         CREATE TABLE contacts (
           id INTEGER PRIMARY KEY AUTOINCREMENT,
           name TEXT DEFAULT '',
           addr TEXT DEFAULT '' COLLATE NOCASE,
           origin INTEGER DEFAULT 0,
           blocked INTEGER DEFAULT 0,
           last_seen INTEGER DEFAULT 0,
           param TEXT DEFAULT ''
         );
         CREATE INDEX contacts_index1 ON contacts (name COLLATE NOCASE);
         CREATE INDEX contacts_index2 ON contacts (addr COLLATE NOCASE);",
    )
    .map_err(Error::SchemaCreationFailed)?;

    conn.execute(
        "INSERT INTO contacts (id,name,origin) VALUES
           (1,'self',?1), (2,'device',?1), (3,'rsvd',?1),
           (4,'rsvd',?1), (5,'rsvd',?1), (6,'rsvd',?1),
           (7,'rsvd',?1), (8,'rsvd',?1), (9,'rsvd',?1)",
        [Origin::Internal],
    )
    .map_err(Error::SchemaCreationFailed)?;

    conn.execute_batch(
        "CREATE TABLE chats (
           id INTEGER PRIMARY KEY AUTOINCREMENT,
           type INTEGER DEFAULT 0,
           name TEXT DEFAULT '',
           draft_timestamp INTEGER DEFAULT 0,
           draft_txt TEXT DEFAULT '',
           blocked INTEGER DEFAULT 0,
           grpid TEXT DEFAULT '',
           param TEXT DEFAULT ''
         );
         CREATE INDEX chats_index1 ON chats (grpid);
         CREATE TABLE chats_contacts (chat_id INTEGER, contact_id INTEGER);
         CREATE INDEX chats_contacts_index1 ON chats_contacts (chat_id);
         INSERT INTO chats (id,type,name) VALUES
           (1,120,'deaddrop'), (2,120,'rsvd'), (3,120,'trash'),
           (4,120,'msgs_in_creation'), (5,120,'starred'), (6,120,'archivedlink'),
           (7,100,'rsvd'), (8,100,'rsvd'), (9,100,'rsvd');

         CREATE TABLE msgs (
           id INTEGER PRIMARY KEY AUTOINCREMENT,
           rfc724_mid TEXT DEFAULT '',
           server_folder TEXT DEFAULT '',
           server_uid INTEGER DEFAULT 0,
           chat_id INTEGER DEFAULT 0,
           from_id INTEGER DEFAULT 0,
           to_id INTEGER DEFAULT 0,
           timestamp INTEGER DEFAULT 0,
           type INTEGER DEFAULT 0,
           state INTEGER DEFAULT 0,
           msgrmsg INTEGER DEFAULT 1,
           bytes INTEGER DEFAULT 0,
           txt TEXT DEFAULT '',
           txt_raw TEXT DEFAULT '',
           param TEXT DEFAULT ''
         );
         CREATE INDEX msgs_index1 ON msgs (rfc724_mid);
         CREATE INDEX msgs_index2 ON msgs (chat_id);
         CREATE INDEX msgs_index3 ON msgs (timestamp);
         CREATE INDEX msgs_index4 ON msgs (state);
         INSERT INTO msgs (id,msgrmsg,txt) VALUES
           (1,0,'marker1'), (2,0,'rsvd'), (3,0,'rsvd'), (4,0,'rsvd'),
           (5,0,'rsvd'), (6,0,'rsvd'), (7,0,'rsvd'), (8,0,'rsvd'), (9,0,'daymarker');

         CREATE TABLE jobs (
           id INTEGER PRIMARY KEY AUTOINCREMENT,
           added_timestamp INTEGER,
           desired_timestamp INTEGER DEFAULT 0,
           action INTEGER,
           foreign_id INTEGER,
           param TEXT DEFAULT ''
         );
         CREATE INDEX jobs_index1 ON jobs (desired_timestamp);",
    )
    .map_err(Error::SchemaCreationFailed)?;

    for table in ["config", "contacts", "chats", "chats_contacts", "msgs", "jobs"] {
        if !super::table_exists(conn, table)? {
            return Err(Error::SchemaCreationFailed(rusqlite::Error::InvalidQuery));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_conn() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn seeds_reserved_rows() {
        let conn = memory_conn();
        run(&conn).unwrap();

        let contacts: i64 = conn
            .query_row("SELECT COUNT(*) FROM contacts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(contacts, 9);

        let origin: i64 = conn
            .query_row("SELECT origin FROM contacts WHERE id=1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(origin, Origin::Internal as i64);

        let chats: i64 = conn
            .query_row("SELECT COUNT(*) FROM chats", [], |r| r.get(0))
            .unwrap();
        assert_eq!(chats, 9);

        let msgs: i64 = conn
            .query_row("SELECT COUNT(*) FROM msgs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(msgs, 9);
    }
}
