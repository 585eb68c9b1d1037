//! Reserved row ids and origin flags seeded by the bootstrap schema.
#![allow(dead_code)]

/// virtual chat showing all messages belonging to chats flagged with chats.blocked=2
pub(crate) const DC_CHAT_ID_DEADDROP: u32 = 1;
/// messages that should be deleted get this chat_id; the messages are deleted
/// from the working thread later then.
pub const DC_CHAT_ID_TRASH: u32 = 3;
/// a message is just in creation but not yet assigned to a chat
pub(crate) const DC_CHAT_ID_MSGS_IN_CREATION: u32 = 4;
/// virtual chat showing all messages flagged with msgs.starred=2
pub const DC_CHAT_ID_STARRED: u32 = 5;
/// only an indicator in a chatlist
pub const DC_CHAT_ID_ARCHIVED_LINK: u32 = 6;
/// larger chat IDs are "real" chats, their messages are "real" messages.
pub const DC_CHAT_ID_LAST_SPECIAL: u32 = 9;

pub const DC_MSG_ID_MARKER1: u32 = 1;
pub const DC_MSG_ID_DAYMARKER: u32 = 9;
pub const DC_MSG_ID_LAST_SPECIAL: u32 = 9;

pub const DC_CONTACT_ID_UNDEFINED: u32 = 0;
pub const DC_CONTACT_ID_SELF: u32 = 1;
pub const DC_CONTACT_ID_INFO: u32 = 2;
pub const DC_CONTACT_ID_DEVICE: u32 = 5;
pub const DC_CONTACT_ID_LAST_SPECIAL: u32 = 9;

/// decorative address used for [`DC_CONTACT_ID_DEVICE`] when an API that returns
/// an email address is called.
pub const DC_CONTACT_ID_DEVICE_ADDR: &str = "device@localhost";

/// Origin of a contact row. The persistence core only cares about the
/// `Internal` value, used to flag rows it seeds itself during bootstrap so
/// callers can tell reserved rows apart from user-created ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i64)]
pub enum Origin {
    Unknown = 0,
    /// internal use — set on contact rows created by the schema bootstrap
    Internal = 0x40000,
}

impl Default for Origin {
    fn default() -> Self {
        Origin::Unknown
    }
}

impl rusqlite::types::FromSql for Origin {
    fn column_result(value: rusqlite::types::ValueRef) -> rusqlite::types::FromSqlResult<Self> {
        i64::column_result(value).map(|val| match val {
            0x40000 => Origin::Internal,
            _ => Origin::Unknown,
        })
    }
}

impl rusqlite::types::ToSql for Origin {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(rusqlite::types::ToSqlOutput::from(*self as i64))
    }
}
