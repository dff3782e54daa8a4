//! Compiled-in settings.
//!
//! Network credentials and the endpoint are taken from the build environment
//! (`WIFI_SSID`, `WIFI_PASSWORD`, `ENDPOINT_URL`, `API_TOKEN`), falling back
//! to placeholders.

use crate::sensors::ccs811::CCS811_I2C_ADDR_LOW;
use crate::sensors::zmod4xxx::config::{RegisterProfile, LOW_POWER};

pub const SCD30_READ_INTERVAL_MS: u64 = 3000;
pub const ZMOD_READ_INTERVAL_MS: u64 = 1990;
pub const CCS811_READ_INTERVAL_MS: u64 = 2000;
pub const SERVER_WRITE_INTERVAL_MS: u64 = 10_000;
pub const STATUS_LED_INTERVAL_MS: u64 = 2000;

pub const SCD30_MEASUREMENT_INTERVAL_S: u16 = 2;
/// 0 disables pressure compensation.
pub const SCD30_AMBIENT_PRESSURE_MBAR: u16 = 0;

pub const CCS811_ADDR: u8 = CCS811_I2C_ADDR_LOW;

pub const GAS_PROFILE: &RegisterProfile = &LOW_POWER;
pub const GAS_MAX_POLLS: u32 = 200;
/// Test IAQ handles run next to the production one.
pub const GAS_TEST_CHANNELS: usize = 1;

/// Records waiting for the uplink before the scheduler starts dropping them.
pub const RECORD_QUEUE_DEPTH: usize = 4;

pub const I2C_HALF_PERIOD_US: u32 = 5;

pub const HOSTNAME: &str = "ESP-CO2-logger";

pub const WIFI_SSID: &str = env_or(option_env!("WIFI_SSID"), "SSID");
pub const WIFI_PASSWORD: &str = env_or(option_env!("WIFI_PASSWORD"), "PASSWORD");
pub const ENDPOINT_URL: &str = env_or(
    option_env!("ENDPOINT_URL"),
    "http://192.168.1.10:8086/api/v2/write?org=home&bucket=air&precision=s",
);
pub const API_TOKEN: &str = env_or(option_env!("API_TOKEN"), "");

const fn env_or(value: Option<&'static str>, default: &'static str) -> &'static str {
    match value {
        Some(value) => value,
        None => default,
    }
}
