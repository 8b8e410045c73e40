//! Soft-AP Wi-Fi bring-up for ESP32.
//!
//! The device runs its own access point so a laptop can join it directly
//! and fetch the dump, without any existing network.

use anyhow::{anyhow, Result};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::peripheral,
    nvs::EspDefaultNvsPartition,
    wifi::{AccessPointConfiguration, AuthMethod, BlockingWifi, Configuration, EspWifi},
};
use log::info;

use coredump_core::{AccessPointConfig, AuthMode};

/// Start the access point described by `config`.
///
/// Returns the driver, which must be kept alive for the access point to
/// stay up.
pub fn start_access_point(
    config: &AccessPointConfig,
    modem: impl peripheral::Peripheral<P = esp_idf_svc::hal::modem::Modem> + 'static,
    sysloop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
) -> Result<Box<EspWifi<'static>>> {
    config.validate()?;

    let auth_method = match config.auth_mode() {
        AuthMode::Open => {
            info!("WiFi password is empty, using open network");
            AuthMethod::None
        }
        AuthMode::WpaWpa2Personal => AuthMethod::WPAWPA2Personal,
    };

    let mut esp_wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;
    let mut wifi = BlockingWifi::wrap(&mut esp_wifi, sysloop)?;

    wifi.set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
        ssid: config
            .ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("SSID too long (max 32 bytes)"))?,
        password: config
            .password
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("Password too long (max 64 bytes)"))?,
        channel: config.channel,
        auth_method,
        max_connections: config.max_connections,
        ..Default::default()
    }))?;

    wifi.start()?;
    wifi.wait_netif_up()?;

    let ip_info = wifi.wifi().ap_netif().get_ip_info()?;
    info!(
        "Soft-AP started. SSID: {} channel: {}",
        config.ssid, config.channel
    );
    info!("  IP address: {}", ip_info.ip);

    Ok(Box::new(esp_wifi))
}
