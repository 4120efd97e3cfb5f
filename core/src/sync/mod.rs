//! Clipboard sync orchestration

mod engine;
mod sweeper;

pub use engine::SyncEngine;
pub use sweeper::{start as start_sweeper, SweeperHandle};
