use std::{env, fs};
use std::path::PathBuf;

fn out_dir() -> String {
    env::var("OUT_DIR").expect("No OUT_DIR env var")
}

// macOS refuses CoreBluetooth access (and never shows the permission prompt) unless the
// binary carries a usage description.
fn build_info_plist() {
    let out_path: PathBuf = [out_dir().as_str(), "Info.plist"].iter().collect();
    let version = env::var("CARGO_PKG_VERSION").expect("No CARGO_PKG_VERSION env var");

    let plist = format!(r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleIdentifier</key>
    <string>nl.blemonitor.ble-monitor</string>
    <key>CFBundleName</key>
    <string>BLE Monitor</string>
    <key>CFBundleShortVersionString</key>
    <string>{version}</string>
    <key>NSBluetoothAlwaysUsageDescription</key>
    <string>BLE Monitor scans for nearby Bluetooth devices and shows the data they send.</string>
</dict>
</plist>
"#);

    println!("DEBUG: writing Info.plist to {}", out_path.to_string_lossy());
    fs::write(&out_path, plist).expect("Failed to write Info.plist");
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    build_info_plist();
}
