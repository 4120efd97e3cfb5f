//! Clipboard item store
//!
//! The authoritative source for durable clipboard state. Content is stored
//! in the envelope textual form under the device-bound at-rest key and
//! decrypted transparently at read time; a failed decryption (for example
//! after a key reset) yields a sentinel marker instead of an error so
//! stale rows never crash a caller.

use diesel::prelude::*;
use tokio::sync::watch;

use crate::crypto::AeadKey;
use crate::protocol::{ClipboardItem, ContentType, Envelope};
use crate::store::db::DbPool;
use crate::store::models::ClipboardItemRow;
use crate::store::schema::clipboard_items::dsl as items_dsl;
use crate::{Error, Result};

/// Placeholder returned when at-rest decryption fails.
pub const DECRYPT_FAILED_SENTINEL: &str = "[Decryption Failed]";

/// Durable clipboard store with hot snapshot streams.
pub struct ClipboardStore {
    pool: DbPool,
    at_rest: AeadKey,
    items_tx: watch::Sender<Vec<ClipboardItem>>,
    unsynced_tx: watch::Sender<Vec<ClipboardItem>>,
}

impl ClipboardStore {
    pub fn open(pool: DbPool, at_rest: AeadKey) -> Result<Self> {
        let store = Self {
            pool,
            at_rest,
            items_tx: watch::channel(Vec::new()).0,
            unsynced_tx: watch::channel(Vec::new()).0,
        };
        store.refresh_blocking()?;
        Ok(store)
    }

    /// Upsert an item by id.
    pub async fn put(&self, item: &ClipboardItem) -> Result<()> {
        let row = self.to_row(item)?;
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool.get().map_err(|e| Error::Storage(e.to_string()))?;
            diesel::insert_into(items_dsl::clipboard_items)
                .values(&row)
                .on_conflict(items_dsl::id)
                .do_update()
                .set(&row)
                .execute(&mut conn)
                .map_err(|e| Error::Storage(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(e.to_string()))??;

        self.refresh().await
    }

    pub async fn get(&self, id: &str) -> Result<Option<ClipboardItem>> {
        let pool = self.pool.clone();
        let id_owned = id.to_string();

        let row: Option<ClipboardItemRow> =
            tokio::task::spawn_blocking(move || -> Result<Option<ClipboardItemRow>> {
                let mut conn = pool.get().map_err(|e| Error::Storage(e.to_string()))?;
                items_dsl::clipboard_items
                    .filter(items_dsl::id.eq(&id_owned))
                    .first(&mut conn)
                    .optional()
                    .map_err(|e| Error::Storage(e.to_string()))
            })
            .await
            .map_err(|e| Error::Storage(e.to_string()))??;

        Ok(row.map(|r| self.from_row(r)))
    }

    pub async fn mark_synced(&self, id: &str) -> Result<()> {
        let pool = self.pool.clone();
        let id_owned = id.to_string();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool.get().map_err(|e| Error::Storage(e.to_string()))?;
            diesel::update(items_dsl::clipboard_items.filter(items_dsl::id.eq(&id_owned)))
                .set(items_dsl::synced.eq(true))
                .execute(&mut conn)
                .map_err(|e| Error::Storage(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(e.to_string()))??;

        self.refresh().await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let pool = self.pool.clone();
        let id_owned = id.to_string();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool.get().map_err(|e| Error::Storage(e.to_string()))?;
            diesel::delete(items_dsl::clipboard_items.filter(items_dsl::id.eq(&id_owned)))
                .execute(&mut conn)
                .map_err(|e| Error::Storage(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(e.to_string()))??;

        self.refresh().await
    }

    /// Delete all rows whose TTL has elapsed; returns the count deleted.
    pub async fn sweep(&self, now: i64) -> Result<usize> {
        let pool = self.pool.clone();

        let deleted = tokio::task::spawn_blocking(move || -> Result<usize> {
            let mut conn = pool.get().map_err(|e| Error::Storage(e.to_string()))?;

            let rows: Vec<(String, i64, i64)> = items_dsl::clipboard_items
                .select((items_dsl::id, items_dsl::timestamp, items_dsl::ttl))
                .load(&mut conn)
                .map_err(|e| Error::Storage(e.to_string()))?;

            let expired: Vec<String> = rows
                .into_iter()
                .filter(|(_, ts, ttl)| ts.saturating_add(*ttl) < now)
                .map(|(id, _, _)| id)
                .collect();

            if expired.is_empty() {
                return Ok(0);
            }

            diesel::delete(items_dsl::clipboard_items.filter(items_dsl::id.eq_any(&expired)))
                .execute(&mut conn)
                .map_err(|e| Error::Storage(e.to_string()))
        })
        .await
        .map_err(|e| Error::Storage(e.to_string()))??;

        if deleted > 0 {
            self.refresh().await?;
        }
        Ok(deleted)
    }

    /// Hot stream of all items, newest first.
    pub fn items_flow(&self) -> watch::Receiver<Vec<ClipboardItem>> {
        self.items_tx.subscribe()
    }

    /// Hot stream of unsynced items, oldest first.
    pub fn unsynced_flow(&self) -> watch::Receiver<Vec<ClipboardItem>> {
        self.unsynced_tx.subscribe()
    }

    async fn refresh(&self) -> Result<()> {
        let pool = self.pool.clone();

        let rows: Vec<ClipboardItemRow> =
            tokio::task::spawn_blocking(move || -> Result<Vec<ClipboardItemRow>> {
                let mut conn = pool.get().map_err(|e| Error::Storage(e.to_string()))?;
                items_dsl::clipboard_items
                    .order(items_dsl::timestamp.desc())
                    .load(&mut conn)
                    .map_err(|e| Error::Storage(e.to_string()))
            })
            .await
            .map_err(|e| Error::Storage(e.to_string()))??;

        self.publish(rows);
        Ok(())
    }

    fn refresh_blocking(&self) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Storage(e.to_string()))?;

        let rows: Vec<ClipboardItemRow> = items_dsl::clipboard_items
            .order(items_dsl::timestamp.desc())
            .load(&mut conn)
            .map_err(|e| Error::Storage(e.to_string()))?;

        self.publish(rows);
        Ok(())
    }

    fn publish(&self, rows: Vec<ClipboardItemRow>) {
        let items: Vec<ClipboardItem> = rows.into_iter().map(|r| self.from_row(r)).collect();

        let mut unsynced: Vec<ClipboardItem> =
            items.iter().filter(|i| !i.synced).cloned().collect();
        unsynced.sort_by_key(|i| i.timestamp);

        self.items_tx.send_replace(items);
        self.unsynced_tx.send_replace(unsynced);
    }

    fn to_row(&self, item: &ClipboardItem) -> Result<ClipboardItemRow> {
        let sealed = Envelope::seal(&self.at_rest, item.content.as_bytes())?;
        Ok(ClipboardItemRow {
            id: item.id.clone(),
            content: sealed.to_wire(),
            content_type: item.content_type.to_string(),
            timestamp: item.timestamp,
            ttl: item.ttl,
            synced: item.synced,
            source_device_id: item.source_device_id.clone(),
            hash: item.hash.clone(),
        })
    }

    fn from_row(&self, row: ClipboardItemRow) -> ClipboardItem {
        let content = Envelope::from_wire(&row.content)
            .and_then(|env| env.open(&self.at_rest))
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or_else(|| {
                tracing::warn!(item = %row.id, "stored clipboard content failed to decrypt");
                DECRYPT_FAILED_SENTINEL.to_string()
            });

        ClipboardItem {
            id: row.id,
            content,
            content_type: parse_content_type(&row.content_type),
            timestamp: row.timestamp,
            ttl: row.ttl,
            synced: row.synced,
            source_device_id: row.source_device_id,
            hash: row.hash,
        }
    }
}

fn parse_content_type(value: &str) -> ContentType {
    match value {
        "IMAGE" => ContentType::Image,
        "FILE" => ContentType::File,
        _ => ContentType::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::db::init_db_pool;

    fn test_store() -> (tempfile::TempDir, ClipboardStore) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("clipboard.db");
        let pool = init_db_pool(db_path.to_str().unwrap()).unwrap();
        (dir, ClipboardStore::open(pool, AeadKey::generate()).unwrap())
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let (_dir, store) = test_store();
        let item = ClipboardItem::new_text("hello", None);

        store.put(&item).await.unwrap();
        let loaded = store.get(&item.id).await.unwrap().unwrap();

        assert_eq!(loaded, item);
    }

    #[tokio::test]
    async fn test_content_encrypted_at_rest() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("clipboard.db");
        let pool = init_db_pool(db_path.to_str().unwrap()).unwrap();
        let store = ClipboardStore::open(pool.clone(), AeadKey::generate()).unwrap();

        let item = ClipboardItem::new_text("top secret", None);
        store.put(&item).await.unwrap();

        let mut conn = pool.get().unwrap();
        let stored: String = items_dsl::clipboard_items
            .filter(items_dsl::id.eq(&item.id))
            .select(items_dsl::content)
            .first(&mut conn)
            .unwrap();

        assert!(!stored.contains("top secret"));
        assert!(stored.contains('|'));
    }

    #[tokio::test]
    async fn test_reset_key_yields_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("clipboard.db");
        let pool = init_db_pool(db_path.to_str().unwrap()).unwrap();

        let item = ClipboardItem::new_text("old content", None);
        {
            let store = ClipboardStore::open(pool.clone(), AeadKey::generate()).unwrap();
            store.put(&item).await.unwrap();
        }

        // Reopen with a different at-rest key, as after a key reset.
        let store = ClipboardStore::open(pool, AeadKey::generate()).unwrap();
        let loaded = store.get(&item.id).await.unwrap().unwrap();

        assert_eq!(loaded.content, DECRYPT_FAILED_SENTINEL);
    }

    #[tokio::test]
    async fn test_mark_synced() {
        let (_dir, store) = test_store();
        let item = ClipboardItem::new_text("x", None);

        store.put(&item).await.unwrap();
        store.mark_synced(&item.id).await.unwrap();

        assert!(store.get(&item.id).await.unwrap().unwrap().synced);
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_expired() {
        let (_dir, store) = test_store();

        let mut expired = ClipboardItem::new_text("old", None);
        expired.timestamp = 1_000;
        expired.ttl = 1_000;

        let mut live = ClipboardItem::new_text("new", None);
        live.timestamp = 2_000;
        live.ttl = 10_000;

        store.put(&expired).await.unwrap();
        store.put(&live).await.unwrap();

        let deleted = store.sweep(2_500).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(store.get(&expired.id).await.unwrap().is_none());
        assert!(store.get(&live.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sweep_boundary_is_strict() {
        let (_dir, store) = test_store();

        let mut item = ClipboardItem::new_text("boundary", None);
        item.timestamp = 1_000;
        item.ttl = 500;
        store.put(&item).await.unwrap();

        // timestamp + ttl == now is not yet past the deadline
        assert_eq!(store.sweep(1_500).await.unwrap(), 0);
        assert_eq!(store.sweep(1_501).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_flows_track_mutations() {
        let (_dir, store) = test_store();
        let items_rx = store.items_flow();
        let unsynced_rx = store.unsynced_flow();

        let mut first = ClipboardItem::new_text("first", None);
        first.timestamp = 1_000;
        let mut second = ClipboardItem::new_text("second", None);
        second.timestamp = 2_000;

        store.put(&first).await.unwrap();
        store.put(&second).await.unwrap();

        let items = items_rx.borrow().clone();
        assert_eq!(items.len(), 2);
        // Newest first
        assert_eq!(items[0].content, "second");

        // Oldest first among unsynced
        let unsynced = unsynced_rx.borrow().clone();
        assert_eq!(unsynced[0].content, "first");

        store.mark_synced(&first.id).await.unwrap();
        assert_eq!(unsynced_rx.borrow().len(), 1);
    }
}
