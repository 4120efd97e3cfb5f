//! Background TTL sweeper
//!
//! Periodically expires stale clipboard rows. The handle aborts the task
//! on drop so teardown releases the schedule with the owning component.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::protocol::now_ms;
use crate::store::ClipboardStore;

pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start the periodic sweep.
pub fn start(store: Arc<ClipboardStore>, interval: Duration) -> SweeperHandle {
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.sweep(now_ms()).await {
                Ok(0) => tracing::debug!("sweep found nothing to expire"),
                Ok(count) => tracing::info!(count, "swept expired clipboard items"),
                Err(e) => tracing::warn!(error = %e, "sweep failed"),
            }
        }
    });

    SweeperHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::AeadKey;
    use crate::protocol::ClipboardItem;
    use crate::store::db::init_db_pool;

    #[tokio::test]
    async fn test_sweeper_expires_stale_items() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_db_pool(dir.path().join("sweep.db").to_str().unwrap()).unwrap();
        let store = Arc::new(ClipboardStore::open(pool, AeadKey::generate()).unwrap());

        let mut stale = ClipboardItem::new_text("stale", None);
        stale.timestamp = 1_000;
        stale.ttl = 1_000;
        store.put(&stale).await.unwrap();

        let _handle = start(store.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(store.get(&stale.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_handle_drop_stops_task() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_db_pool(dir.path().join("sweep.db").to_str().unwrap()).unwrap();
        let store = Arc::new(ClipboardStore::open(pool, AeadKey::generate()).unwrap());

        let handle = start(store, Duration::from_millis(10));
        drop(handle);
        // Nothing to assert beyond not panicking; the abort is immediate.
    }
}
