use std::env;
use log::info;
use msgbox::IconType;
use ble_monitor::{init_logging, run};
use ble_monitor::error::{error_msgbox, AppRunError, ConfigError};

// Without the embedded Info.plist macOS terminates the process on the first CoreBluetooth call.
#[cfg(target_os = "macos")]
embed_plist::embed_info_plist!(concat!(env!("OUT_DIR"), "/Info.plist"));

fn main() -> Result<(), AppRunError> {
    init_logging();
    info!(concat!("BLE Monitor ", env!("CARGO_PKG_VERSION")));

    let args = env::args();

    match run(args) {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            if let Err(err) = msgbox::create(
                concat!("BLE Monitor ", env!("CARGO_PKG_VERSION")),
                "This application has already been started",
                IconType::Error,
            ) {
                eprintln!("Failed to create msgbox: {:?}", err);
            }
            Ok(())
        },
        Err(err) => {
            error_msgbox("Unexpected error", &err);
            Err(err)
        }
        Ok(_) => Ok(())
    }
}
