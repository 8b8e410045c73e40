//! Crash-dump server firmware for ESP32.
//!
//! This binary requires the ESP32 Rust toolchain.
//! It will not compile with the standard Rust toolchain.
//!
//! Brings up NVS, starts a soft-AP, and serves:
//! - `GET /`         landing page
//! - `GET /download` the `coredump` partition as `core.bin`
//! - `GET /crash`    landing page, then abort (writes a fresh core dump)
//!
//! The partition table must contain a `coredump` data partition:
//!
//! ```text
//! espflash flash --partition-table partitions.csv --monitor
//! ```

use std::time::Duration;

use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use log::info;

use coredump_esp32::{config, http, nvs, wifi};

fn main() -> anyhow::Result<()> {
    // ESP32-specific: Initialize ESP-IDF
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    let settings = config::device_settings();
    settings.validate()?;

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = nvs::init()?;

    info!("ESP_WIFI_MODE_AP");
    let _wifi = wifi::start_access_point(
        &settings.access_point,
        peripherals.modem,
        sysloop.clone(),
        nvs,
    )?;

    let _server = http::run_server(&sysloop, settings.http, settings.dump)?;
    info!("Core dump server ready");

    // Keep the Wi-Fi driver and server subscription alive.
    loop {
        std::thread::sleep(Duration::from_secs(60));
    }
}
