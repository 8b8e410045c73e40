//! Build-time device configuration.
//!
//! The device has no configuration UI, so settings are the shared defaults
//! with the access point credentials optionally overridden at build time:
//!
//! ```text
//! COREDUMP_WIFI_SSID=Workbench COREDUMP_WIFI_PASS=hunter22 cargo build
//! ```

use coredump_core::Settings;

const SSID: Option<&str> = option_env!("COREDUMP_WIFI_SSID");
const PASSWORD: Option<&str> = option_env!("COREDUMP_WIFI_PASS");

/// Settings baked into this firmware image.
pub fn device_settings() -> Settings {
    let mut settings = Settings::default();
    if let Some(ssid) = SSID {
        settings.access_point.ssid = ssid.to_string();
    }
    if let Some(password) = PASSWORD {
        settings.access_point.password = password.to_string();
    }
    settings
}
