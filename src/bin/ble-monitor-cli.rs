use std::io::{self, Write};
use std::sync::Arc;
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::signal;
use tokio::time::Duration;
use ble_monitor::config::io::ConfigIO;
use ble_monitor::device::btle::BtleBackend;
use ble_monitor::device::permission::PlatformPermissions;
use ble_monitor::error::AppRunError;
use ble_monitor::init_logging;
use ble_monitor::session::controller::SessionController;

type Controller = SessionController<BtleBackend>;

#[derive(Parser, Debug)]
#[command(author, version)]
#[command(about = "Scans for Bluetooth Low Energy devices and prints the notifications they send.", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Scan for nearby devices and list them (id, name)
    Scan {
        /// Length of the scan in seconds, overrides the config file
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Connect to a device and print every notification it sends, until Ctrl-C
    Monitor {
        /// Address of the device (a UUID on macOS), as printed by `scan`
        id: String,
    },
}

async fn scan(controller: &Controller) -> Result<(), AppRunError> {
    let scan = controller.scan_devices().await?;
    if let Err(err) = scan.await {
        warn!("Scan task failed: {}", err);
    }

    for device in controller.state().devices.values() {
        println!("{}\t{}", device.id, device.display_name());
    }
    Ok(())
}

async fn monitor(controller: &Controller, id: &str) -> Result<(), AppRunError> {
    let mut receiver = controller.subscribe();
    let device_id = controller.connect_to_device(id).await?;
    info!("Monitoring {}, press Ctrl-C to stop", device_id);

    let mut printed = 0;
    'mainloop: loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                break 'mainloop;
            },
            changed = receiver.changed() => {
                if changed.is_err() {
                    break 'mainloop;
                }

                let data = receiver.borrow_and_update().data.clone();
                // the log only grows while connected
                if let Some(records) = data.get(printed..) {
                    print!("{}", records);
                    let _ = io::stdout().flush();
                }
                printed = data.len();
            },
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppRunError> {
    init_logging();
    let args = Args::parse();

    let config_io = ConfigIO::new_sync()?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;
    let config = config_io.read().await?;

    let scan_duration = match &args.command {
        CliCommand::Scan { duration: Some(secs) } => Duration::from_secs((*secs).max(1)),
        _ => config.scan_duration(),
    };

    let backend = BtleBackend::new(config.adapter.as_deref()).await?;
    let controller = SessionController::new(Arc::new(backend), PlatformPermissions, scan_duration);

    let result = match &args.command {
        CliCommand::Scan { .. } => scan(&controller).await,
        CliCommand::Monitor { id } => monitor(&controller, id).await,
    };

    controller.shutdown().await;
    result
}
