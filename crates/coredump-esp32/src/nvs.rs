//! NVS (Non-Volatile Storage) initialization.
//!
//! The Wi-Fi driver keeps its calibration data in NVS, so the default
//! partition must be usable before the access point starts.

use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys::{self, esp, EspError};
use log::warn;

/// Initialize the default NVS partition, erasing it if it is full or was
/// written by a newer IDF version.
pub fn init() -> Result<EspDefaultNvsPartition, EspError> {
    let ret = unsafe { sys::nvs_flash_init() };

    if ret == sys::ESP_ERR_NVS_NO_FREE_PAGES as sys::esp_err_t
        || ret == sys::ESP_ERR_NVS_NEW_VERSION_FOUND as sys::esp_err_t
    {
        warn!("NVS partition needs erasing ({}), reinitializing", ret);
        esp!(unsafe { sys::nvs_flash_erase() })?;
        esp!(unsafe { sys::nvs_flash_init() })?;
    } else {
        esp!(ret)?;
    }

    EspDefaultNvsPartition::take()
}
