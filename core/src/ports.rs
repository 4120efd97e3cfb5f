//! Platform boundary
//!
//! The host OS integration is expressed as a handful of narrow traits:
//! local clipboard access, foreground detection, notifications, and the
//! companion-device association flow. The CLI supplies desktop
//! implementations; tests supply fakes.

use async_trait::async_trait;

use crate::store::Device;
use crate::Result;

/// Local clipboard access.
pub trait LocalClipboard: Send + Sync {
    /// Current clipboard text, `None` when empty or non-textual.
    fn read_text(&self) -> Result<Option<String>>;

    fn write_text(&self, text: &str) -> Result<()>;
}

/// Whether the application is currently foreground-visible.
pub trait ForegroundProbe: Send + Sync {
    fn is_foreground(&self) -> bool;
}

/// Deferred clipboard write triggered from a notification.
pub type CopyAction = Box<dyn FnOnce() + Send + 'static>;

/// User-facing notification surface.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Surface an inbound clipboard preview with a "Copy" action.
    async fn notify(&self, preview: &str, copy: CopyAction);

    /// Surface a plain user-visible message.
    async fn message(&self, text: &str);
}

/// Host-OS companion device association. Informational: the trust anchor
/// is already pinned by the time this runs, so failures are non-fatal.
#[async_trait]
pub trait Associator: Send + Sync {
    async fn associate(&self, device: &Device) -> Result<()>;
}

/// Association flow for platforms without one.
pub struct NoopAssociator;

#[async_trait]
impl Associator for NoopAssociator {
    async fn associate(&self, _device: &Device) -> Result<()> {
        Ok(())
    }
}
