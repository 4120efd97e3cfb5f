//! Desktop clipboard adapter
//!
//! Poll-based change monitor plus a thin arboard wrapper implementing the
//! [`LocalClipboard`] port. Mobile hosts bring their own adapter; the core
//! only assumes a change-event stream and a text write.

use std::time::Duration;

use arboard::Clipboard as ArboardClipboard;
use tokio::sync::mpsc;

use crate::crypto::sha256_hex_upper;
use crate::ports::LocalClipboard;
use crate::{Error, Result};

/// arboard-backed clipboard access.
///
/// arboard handles are not Sync, so one is opened per operation.
pub struct SystemClipboard;

impl LocalClipboard for SystemClipboard {
    fn read_text(&self) -> Result<Option<String>> {
        let mut clipboard =
            ArboardClipboard::new().map_err(|e| Error::Clipboard(e.to_string()))?;

        match clipboard.get_text() {
            Ok(text) if !text.is_empty() => Ok(Some(text)),
            Ok(_) => Ok(None),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(Error::Clipboard(e.to_string())),
        }
    }

    fn write_text(&self, text: &str) -> Result<()> {
        let mut clipboard =
            ArboardClipboard::new().map_err(|e| Error::Clipboard(e.to_string()))?;
        clipboard
            .set_text(text)
            .map_err(|e| Error::Clipboard(e.to_string()))
    }
}

/// Change detector around any [`LocalClipboard`].
pub struct ChangeDetector<C> {
    clipboard: C,
    last_hash: Option<String>,
}

impl<C: LocalClipboard> ChangeDetector<C> {
    pub fn new(clipboard: C) -> Self {
        Self {
            clipboard,
            last_hash: None,
        }
    }

    /// Returns the new text if the clipboard changed since the last poll.
    pub fn check_change(&mut self) -> Result<Option<String>> {
        match self.clipboard.read_text()? {
            Some(text) => {
                let hash = sha256_hex_upper(text.as_bytes());
                if self.last_hash.as_deref() != Some(hash.as_str()) {
                    self.last_hash = Some(hash);
                    Ok(Some(text))
                } else {
                    Ok(None)
                }
            }
            None => {
                self.last_hash = None;
                Ok(None)
            }
        }
    }
}

/// Start a polling monitor that emits local clipboard changes.
pub fn start_monitor(
    poll_interval: Duration,
) -> (mpsc::Receiver<String>, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(16);

    let handle = tokio::spawn(async move {
        let mut detector = ChangeDetector::new(SystemClipboard);

        loop {
            tokio::time::sleep(poll_interval).await;

            match detector.check_change() {
                Ok(Some(text)) => {
                    if tx.send(text).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "clipboard read error");
                }
            }
        }
    });

    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MemClipboard {
        content: Mutex<Option<String>>,
    }

    impl LocalClipboard for MemClipboard {
        fn read_text(&self) -> Result<Option<String>> {
            Ok(self.content.lock().unwrap().clone())
        }

        fn write_text(&self, text: &str) -> Result<()> {
            *self.content.lock().unwrap() = Some(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_change_detection_fires_once() {
        let clipboard = MemClipboard {
            content: Mutex::new(Some("a".to_string())),
        };
        let mut detector = ChangeDetector::new(clipboard);

        assert_eq!(detector.check_change().unwrap().as_deref(), Some("a"));
        assert!(detector.check_change().unwrap().is_none());
    }

    #[test]
    fn test_change_detection_tracks_updates() {
        let clipboard = MemClipboard {
            content: Mutex::new(Some("a".to_string())),
        };
        let mut detector = ChangeDetector::new(clipboard);
        let _ = detector.check_change();

        detector.clipboard.write_text("b").unwrap();
        assert_eq!(detector.check_change().unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn test_empty_clipboard_resets_state() {
        let clipboard = MemClipboard {
            content: Mutex::new(Some("a".to_string())),
        };
        let mut detector = ChangeDetector::new(clipboard);
        let _ = detector.check_change();

        *detector.clipboard.content.lock().unwrap() = None;
        assert!(detector.check_change().unwrap().is_none());

        detector.clipboard.write_text("a").unwrap();
        assert_eq!(detector.check_change().unwrap().as_deref(), Some("a"));
    }
}
