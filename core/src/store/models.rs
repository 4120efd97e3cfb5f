//! Database row models

use diesel::prelude::*;

use crate::store::schema::{clipboard_items, paired_devices};

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = clipboard_items)]
#[diesel(treat_none_as_null = true)]
pub struct ClipboardItemRow {
    pub id: String,
    /// Envelope-codec textual form under the device-bound at-rest key
    pub content: String,
    pub content_type: String,
    pub timestamp: i64,
    pub ttl: i64,
    pub synced: bool,
    pub source_device_id: Option<String>,
    pub hash: String,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = paired_devices)]
#[diesel(treat_none_as_null = true)]
pub struct DeviceRow {
    pub id: String,
    pub name: String,
    pub public_key: String,
    pub certificate_fingerprint: String,
    pub last_seen: i64,
    pub is_trusted: bool,
    pub fallback_address: Option<String>,
}
