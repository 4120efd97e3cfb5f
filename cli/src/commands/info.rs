//! Info command implementation.

use crate::commands::build_service;

/// Display device information.
pub fn show_info(device_name: String) -> anyhow::Result<()> {
    let service = build_service(device_name)?;

    println!("\n\x1b[1mAppConnect Device Info\x1b[0m");
    println!("═══════════════════════════════════════");
    println!("\x1b[1mName:\x1b[0m    {}", service.device_name());
    println!("\x1b[1mID:\x1b[0m      {}", service.device_id());
    println!("\x1b[1mPaired:\x1b[0m  {} device(s)", service.devices().len());
    println!();

    Ok(())
}
