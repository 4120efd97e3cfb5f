//! Desktop implementations of the core's platform ports.

use std::sync::Arc;

use async_trait::async_trait;

use appconnect_core::ports::{CopyAction, ForegroundProbe, Notifier};

/// A terminal session is always "foreground": inbound items go straight
/// to the clipboard instead of through a notification.
pub struct TerminalForeground;

impl ForegroundProbe for TerminalForeground {
    fn is_foreground(&self) -> bool {
        true
    }
}

/// Notification surface backed by plain terminal output. Terminals have
/// no actionable notifications, so the Copy action fires immediately
/// after the preview is shown.
pub struct TerminalNotifier;

#[async_trait]
impl Notifier for TerminalNotifier {
    async fn notify(&self, preview: &str, copy: CopyAction) {
        println!("\x1b[1;34m📋\x1b[0m Received: \"{}\"", preview);
        copy();
    }

    async fn message(&self, text: &str) {
        println!("\x1b[1;33m!\x1b[0m {}", text);
    }
}

pub fn terminal_notifier() -> Arc<TerminalNotifier> {
    Arc::new(TerminalNotifier)
}
