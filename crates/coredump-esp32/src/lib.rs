//! ESP32-specific components for the crash-dump server.
//!
//! This crate provides the device side of `coredump-core`:
//! - Flash partition lookup and reads for the core dump region
//! - Soft-AP Wi-Fi bring-up
//! - NVS initialization
//! - `EspHttpServer` handler registration and lifecycle wiring
//!
//! # Example
//!
//! ```ignore
//! use coredump_esp32::{config, http, nvs, wifi};
//!
//! let settings = config::device_settings();
//! let nvs = nvs::init()?;
//! let wifi = wifi::start_access_point(&settings.access_point, peripherals.modem, sysloop.clone(), nvs)?;
//! let lifecycle = http::run_server(&sysloop, settings.http, settings.dump)?;
//! ```

pub mod config;
pub mod http;
pub mod nvs;
pub mod partition;
pub mod wifi;
