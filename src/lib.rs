#![cfg_attr(not(test), no_std)]

// Must stay first so the logging macros are visible in every module.
#[macro_use]
mod fmt;

pub mod config;
pub mod hal;
pub mod led;
pub mod scheduler;
pub mod sensors;
#[cfg(feature = "esp32c6")]
pub mod tasks;
pub mod telemetry;

/// Sensirion CRC-8 polynomial (x^8 + x^5 + x^4 + 1).
pub const CRC8_POLYNOMIAL: u8 = 0x31;
pub const CRC8_INIT: u8 = 0xFF;

/// Size of one response group on the wire: two data bytes plus their CRC.
pub const CRC_GROUP_LEN: usize = 3;

// CRC calculation for the SCD30 command/response framing
pub fn calculate_crc(data: &[u8]) -> u8 {
    let mut crc: u8 = CRC8_INIT;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ CRC8_POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Checks one `[data, data, crc]` group.
pub fn crc_group_valid(group: &[u8]) -> bool {
    group.len() == CRC_GROUP_LEN && calculate_crc(&group[..2]) == group[2]
}

/// Checks every group of a response. A single bad group rejects the whole
/// buffer, as does a length that is not a whole number of groups.
pub fn check_crc_groups(data: &[u8]) -> bool {
    data.len() % CRC_GROUP_LEN == 0 && data.chunks_exact(CRC_GROUP_LEN).all(crc_group_valid)
}
