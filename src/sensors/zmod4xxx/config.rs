//! ZMOD4410 register tables.
//!
//! Each profile describes what goes into the heater (H), delay (D),
//! measurement (M) and sequencer (S) register blocks, the value written to
//! the command register to run it, and where its results are read back.

pub const ZMOD4410_PID: u16 = 0x2310;
pub const ZMOD4410_I2C_ADDR: u8 = 0x32;

pub const ZMOD4410_H_ADDR: u8 = 0x40;
pub const ZMOD4410_D_ADDR: u8 = 0x50;
pub const ZMOD4410_M_ADDR: u8 = 0x60;
pub const ZMOD4410_S_ADDR: u8 = 0x68;

pub const ZMOD4410_PROD_DATA_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterBlock {
    pub address: u8,
    pub data: &'static [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultBlock {
    pub address: u8,
    pub len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterProfile {
    /// Value written to the command register to run the sequence.
    pub start: u8,
    /// Heater targets as big-endian words, converted per device before
    /// they are written.
    pub h: RegisterBlock,
    pub d: RegisterBlock,
    pub m: RegisterBlock,
    pub s: RegisterBlock,
    pub r: ResultBlock,
    pub prod_data_len: usize,
    /// Seconds between samples, as the IAQ algorithm expects them.
    pub sample_period_s: f32,
}

impl RegisterProfile {
    /// Sequencer step reported once the last ADC conversion is done.
    pub const fn final_step(&self) -> u8 {
        (self.s.data.len() / 2).saturating_sub(1) as u8
    }
}

/// One-shot sequence used during preparation to read the MOX calibration
/// (`mox_lr`, `mox_er`).
pub const INIT: RegisterProfile = RegisterProfile {
    start: 0x80,
    h: RegisterBlock { address: ZMOD4410_H_ADDR, data: &[0x00, 0x50] },
    d: RegisterBlock { address: ZMOD4410_D_ADDR, data: &[0x00, 0x28] },
    m: RegisterBlock { address: ZMOD4410_M_ADDR, data: &[0xC3, 0xE3] },
    s: RegisterBlock { address: ZMOD4410_S_ADDR, data: &[0x00, 0x00, 0x80, 0x40] },
    r: ResultBlock { address: 0x97, len: 4 },
    prod_data_len: ZMOD4410_PROD_DATA_LEN,
    sample_period_s: 0.0,
};

pub const CONTINUOUS: RegisterProfile = RegisterProfile {
    start: 0xC0,
    h: RegisterBlock { address: ZMOD4410_H_ADDR, data: &[0xFD, 0xA8] },
    d: RegisterBlock { address: ZMOD4410_D_ADDR, data: &[0x20, 0x04, 0x20, 0x04] },
    m: RegisterBlock { address: ZMOD4410_M_ADDR, data: &[0x03] },
    s: RegisterBlock { address: ZMOD4410_S_ADDR, data: &[0x00, 0x00, 0x80, 0x08] },
    r: ResultBlock { address: 0x99, len: 2 },
    prod_data_len: ZMOD4410_PROD_DATA_LEN,
    sample_period_s: 2.0,
};

pub const LOW_POWER: RegisterProfile = RegisterProfile {
    start: 0x80,
    h: RegisterBlock { address: ZMOD4410_H_ADDR, data: &[0x00, 0x50, 0xFD, 0xA8] },
    d: RegisterBlock {
        address: ZMOD4410_D_ADDR,
        data: &[0x00, 0xCD, 0x01, 0x9A, 0x03, 0x34],
    },
    m: RegisterBlock { address: ZMOD4410_M_ADDR, data: &[0x23, 0x03] },
    s: RegisterBlock {
        address: ZMOD4410_S_ADDR,
        data: &[
            0x00, 0x00, 0x0A, 0x41, 0x0A, 0x41, 0x00, 0x41, 0x00, 0x41, 0x00, 0x49, 0x00, 0x49,
            0x00, 0x51, 0x00, 0x09, 0x00, 0x49, 0x00, 0x40, 0x00, 0x40, 0x00, 0x40, 0x80, 0x40,
        ],
    },
    r: ResultBlock { address: 0xA9, len: 2 },
    prod_data_len: ZMOD4410_PROD_DATA_LEN,
    sample_period_s: 6.0,
};
