//! Bidirectional clipboard sync engine
//!
//! Outbound: local change → loop suppression → persist → policy check →
//! seal → send → mark synced, strictly in that order. Inbound: envelope →
//! decrypt → persist → deliver (directly when foreground, via a debounced
//! notification otherwise). No inbound failure terminates the engine;
//! every branch converges on log, drop, continue.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::crypto::{sha256_hex_upper, AeadKey};
use crate::ports::{ForegroundProbe, LocalClipboard, Notifier};
use crate::protocol::constants::{LOOP_SUPPRESSION_WINDOW_MS, NOTIFY_DEBOUNCE_MS};
use crate::protocol::{
    classify, ClipboardItem, ContentType, ControlMessage, Envelope, Frame,
};
use crate::store::ClipboardStore;
use crate::transport::{Transport, TransportKind};
use crate::{Error, Result};

const PREVIEW_LEN: usize = 50;

struct LastWrite {
    hash: String,
    at: Instant,
}

pub struct SyncEngine {
    store: Arc<ClipboardStore>,
    transport: Arc<dyn Transport>,
    /// Device-bound key, used only when no session is established
    local_key: AeadKey,
    clipboard: Arc<dyn LocalClipboard>,
    notifier: Arc<dyn Notifier>,
    foreground: Arc<dyn ForegroundProbe>,
    device_id: String,
    last_written: Mutex<Option<LastWrite>>,
    pending_notify: Mutex<Option<JoinHandle<()>>>,
}

impl SyncEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<ClipboardStore>,
        transport: Arc<dyn Transport>,
        local_key: AeadKey,
        clipboard: Arc<dyn LocalClipboard>,
        notifier: Arc<dyn Notifier>,
        foreground: Arc<dyn ForegroundProbe>,
        device_id: String,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            transport,
            local_key,
            clipboard,
            notifier,
            foreground,
            device_id,
            last_written: Mutex::new(None),
            pending_notify: Mutex::new(None),
        })
    }

    /// Outbound pipeline, triggered by a local clipboard change event.
    pub async fn handle_local_change(&self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        let hash = sha256_hex_upper(text.as_bytes());
        if self.suppressed(&hash) {
            tracing::debug!("suppressing clipboard echo");
            return Ok(());
        }

        // Persisted with a null source: locally created.
        let item = ClipboardItem::new_text(text, None);
        self.send_item(item).await
    }

    /// Persist and send one item. Public so callers with richer content
    /// types than the text adapter can reuse the pipeline.
    pub async fn send_item(&self, item: ClipboardItem) -> Result<()> {
        self.store.put(&item).await?;

        if item.content_type != ContentType::Text
            && self.transport.kind() == TransportKind::Fallback
        {
            let reason = format!(
                "{} content cannot be sent over the fallback channel",
                item.content_type
            );
            self.notifier.message(&reason).await;
            return Err(Error::ContentUnsupported(reason));
        }

        let mut wire_item = item.clone();
        wire_item.source_device_id = Some(self.device_id.clone());
        let frame = self.seal(&wire_item)?;

        if self.transport.send(frame).await {
            self.store.mark_synced(&item.id).await?;
            tracing::debug!(item = %item.id, "clipboard item sent");
            Ok(())
        } else {
            self.report_error("SEND_FAIL", "transport refused frame").await;
            Err(Error::SendFail("transport refused frame".to_string()))
        }
    }

    /// Re-send items that never made it out, oldest first. Runs when a
    /// connection (re)establishes to drain the offline queue.
    pub async fn replay_unsynced(&self) {
        let pending: Vec<ClipboardItem> = self.store.unsynced_flow().borrow().clone();
        if pending.is_empty() {
            return;
        }

        tracing::info!(count = pending.len(), "replaying unsynced items");
        for item in pending {
            if let Err(e) = self.send_item(item).await {
                tracing::warn!(error = %e, "replay stopped, will retry next connection");
                break;
            }
        }
    }

    /// Inbound entry point. Never propagates an error.
    pub async fn handle_frame(self: &Arc<Self>, raw: &str) {
        if let Err(e) = self.process_frame(raw).await {
            match e {
                Error::DecryptAuth => {
                    tracing::warn!("dropping frame that failed authentication");
                    self.report_error("DECRYPT_AUTH", "inbound frame failed authentication")
                        .await;
                }
                other => {
                    tracing::warn!(error = %other, "dropping inbound frame");
                }
            }
        }
    }

    async fn process_frame(self: &Arc<Self>, raw: &str) -> Result<()> {
        let envelope = match classify(raw)? {
            Frame::Encrypted(envelope) => envelope,
            Frame::Unknown(value) => {
                tracing::debug!(?value, "ignoring frame with unknown type");
                return Ok(());
            }
            Frame::Control(control) => {
                tracing::debug!(?control, "ignoring stray control frame");
                return Ok(());
            }
        };

        let plaintext = envelope.open(&self.cipher())?;
        let json = String::from_utf8(plaintext)
            .map_err(|_| Error::InvalidMessage("payload is not UTF-8".to_string()))?;
        let mut item = ClipboardItem::from_json(&json)?;

        // Peer-received items have nothing pending to send; storing them
        // synced keeps them out of the offline replay queue.
        item.synced = true;
        self.store.put(&item).await?;

        if self.foreground.is_foreground() {
            self.write_local_and_arm(&item.content);
        } else {
            self.notify_debounced(item.clone()).await;
        }

        self.report_sync_result(true, &item.id).await;
        Ok(())
    }

    /// Write to the local clipboard and arm loop suppression so the
    /// resulting change event is not echoed back to the peer.
    pub fn write_local_and_arm(&self, text: &str) {
        if let Err(e) = self.clipboard.write_text(text) {
            tracing::warn!(error = %e, "local clipboard write failed");
            return;
        }

        *self.last_written.lock().expect("last_written lock poisoned") = Some(LastWrite {
            hash: sha256_hex_upper(text.as_bytes()),
            at: Instant::now(),
        });
    }

    fn suppressed(&self, hash: &str) -> bool {
        match &*self.last_written.lock().expect("last_written lock poisoned") {
            Some(last) => {
                last.hash == hash
                    && last.at.elapsed() < Duration::from_millis(LOOP_SUPPRESSION_WINDOW_MS)
            }
            None => false,
        }
    }

    /// Debounce the notification: a newer inbound item within the window
    /// supersedes the pending one instead of queueing behind it.
    async fn notify_debounced(self: &Arc<Self>, item: ClipboardItem) {
        if let Some(pending) = self
            .pending_notify
            .lock()
            .expect("pending_notify lock poisoned")
            .take()
        {
            pending.abort();
        }

        let engine = self.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(NOTIFY_DEBOUNCE_MS)).await;

            let preview = preview_of(&item.content);
            let text = item.content.clone();
            let for_copy = engine.clone();

            engine
                .notifier
                .notify(
                    &preview,
                    Box::new(move || {
                        for_copy.write_local_and_arm(&text);
                    }),
                )
                .await;
        });

        *self
            .pending_notify
            .lock()
            .expect("pending_notify lock poisoned") = Some(task);
    }

    /// The active cipher: the per-session key, or the device-bound key
    /// when no session is established (dev/test path only).
    fn cipher(&self) -> AeadKey {
        match self.transport.session_key() {
            Some(key) => key,
            None => {
                tracing::debug!("no session key, falling back to device-bound key");
                self.local_key.clone()
            }
        }
    }

    fn seal(&self, item: &ClipboardItem) -> Result<String> {
        let json = item.to_json()?;
        Ok(Envelope::seal(&self.cipher(), json.as_bytes())?.to_wire())
    }

    async fn report_error(&self, error_type: &str, message: &str) {
        if let Ok(frame) = ControlMessage::error_report(error_type, message).to_json() {
            let _ = self.transport.send(frame).await;
        }
    }

    async fn report_sync_result(&self, success: bool, clipboard_id: &str) {
        let message = if success { "stored" } else { "failed" };
        if let Ok(frame) = ControlMessage::sync_result(success, clipboard_id, message).to_json() {
            let _ = self.transport.send(frame).await;
        }
    }
}

fn preview_of(content: &str) -> String {
    if content.chars().count() > PREVIEW_LEN {
        let truncated: String = content.chars().take(PREVIEW_LEN).collect();
        format!("{}...", truncated)
    } else {
        content.to_string()
    }
}
