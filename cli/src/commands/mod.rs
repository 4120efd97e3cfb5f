//! CLI command implementations.

mod devices;
mod info;
mod pair;
mod run;

pub use devices::{list_devices, unpair};
pub use info::show_info;
pub use pair::pair;
pub use run::run_service;

use std::sync::Arc;

use appconnect_core::clipboard::SystemClipboard;
use appconnect_core::ports::NoopAssociator;
use appconnect_core::{Config, SyncService};

use crate::platform::{terminal_notifier, TerminalForeground};

/// Build the service with the desktop platform adapters.
pub(crate) fn build_service(device_name: String) -> anyhow::Result<SyncService> {
    let config = Config {
        device_name,
        ..Config::default()
    };

    let service = SyncService::new(
        config,
        Arc::new(SystemClipboard),
        terminal_notifier(),
        Arc::new(TerminalForeground),
        Arc::new(NoopAssociator),
    )?;

    Ok(service)
}
