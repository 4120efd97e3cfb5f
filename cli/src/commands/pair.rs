//! Pair command implementation.

use std::io::Read;

use crate::commands::build_service;

/// Pair with a peer from its QR payload JSON.
pub async fn pair(device_name: String, payload: Option<String>) -> anyhow::Result<()> {
    let payload = match payload {
        Some(text) => text,
        None => {
            println!("Paste the QR payload JSON, then press Ctrl+D:");
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let service = build_service(device_name)?;
    let device = service.pair(payload.trim()).await?;

    println!("\x1b[1;32m✓\x1b[0m Paired with \x1b[1m{}\x1b[0m", device.name);
    println!("  ID:          {}", device.id);
    println!("  Fingerprint: {}", device.certificate_fingerprint);
    println!("\nStart syncing with: appconnect run");

    Ok(())
}
