//! Device listing and unpairing.

use crate::commands::build_service;

/// Print the paired device table.
pub fn list_devices(device_name: String) -> anyhow::Result<()> {
    let service = build_service(device_name)?;
    let devices = service.devices();

    if devices.is_empty() {
        println!("No paired devices.");
        return Ok(());
    }

    println!("\n\x1b[1mPaired devices\x1b[0m");
    println!("═══════════════════════════════════════");
    for device in devices {
        let trust = if device.is_trusted { "trusted" } else { "revoked" };
        println!("\x1b[1m{}\x1b[0m ({})", device.name, trust);
        println!("  ID:          {}", device.id);
        println!("  Fingerprint: {}", device.certificate_fingerprint);
        if let Some(fallback) = &device.fallback_address {
            println!("  Fallback:    {}", fallback);
        }
    }
    println!();

    Ok(())
}

/// Remove a paired device.
pub async fn unpair(device_name: String, device_id: String) -> anyhow::Result<()> {
    let service = build_service(device_name)?;
    service.unpair(&device_id).await?;
    println!("\x1b[1;32m✓\x1b[0m Device {} unpaired", device_id);
    Ok(())
}
