//! Run command implementation.

use appconnect_core::ConnectionState;

use crate::commands::build_service;
use crate::ui::print_banner;

/// Run the sync service until interrupted.
pub async fn run_service(
    device_name: String,
    host: Option<String>,
    port: u16,
    device: Option<String>,
) -> anyhow::Result<()> {
    print_banner();

    let service = build_service(device_name)?;

    println!("\x1b[1mDevice:\x1b[0m {}", service.device_name());
    println!("\x1b[1mID:\x1b[0m     {}", service.device_id());

    service.start()?;

    if let Some(host) = host {
        let device_id = match device {
            Some(id) => id,
            None => {
                let devices = service.devices();
                match devices.as_slice() {
                    [only] => only.id.clone(),
                    [] => anyhow::bail!("no paired devices; run `appconnect pair` first"),
                    _ => anyhow::bail!("several paired devices; pass --device <id>"),
                }
            }
        };
        service.connect_to(&host, port, &device_id)?;
        println!("Connecting to {}:{}...", host, port);
    } else if service.devices().is_empty() {
        println!("\x1b[2mNo paired devices yet. Pair with: appconnect pair\x1b[0m");
    }

    println!("\x1b[1;32m✓\x1b[0m Watching the clipboard...");
    println!("\x1b[2mPress Ctrl+C to stop.\x1b[0m\n");

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(1);
    ctrlc::set_handler(move || {
        let _ = tx.blocking_send(());
    })?;

    let mut state = service.connection_state();
    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                print_state(*state.borrow());
            }
            _ = rx.recv() => {
                println!("\n\x1b[1;33mShutting down...\x1b[0m");
                break;
            }
        }
    }

    service.shutdown();
    Ok(())
}

fn print_state(state: ConnectionState) {
    match state {
        ConnectionState::Connected => {
            println!("\x1b[1;32m⬤\x1b[0m Connected");
        }
        ConnectionState::Connecting => {
            println!("\x1b[1;33m⬤\x1b[0m Connecting...");
        }
        ConnectionState::Disconnecting => {}
        ConnectionState::Disconnected => {
            println!("\x1b[1;31m⬤\x1b[0m Disconnected");
        }
    }
}
