//! ScioSense/AMS CCS811 eCO2 / TVOC sensor.
//!
//! Plain register protocol without checksums. Health is reported through
//! the status and error-id registers instead.

use crate::hal::{BusError, RegisterHal};
use crate::sensors::{InitError, Sensor, SensorStatus};

pub const CCS811_I2C_ADDR_LOW: u8 = 0x5A;
pub const CCS811_I2C_ADDR_HIGH: u8 = 0x5B;
pub const CCS811_HW_ID: u8 = 0x81;

pub mod reg {
    pub const STATUS: u8 = 0x00;
    pub const MEAS_MODE: u8 = 0x01;
    pub const ALG_RESULT_DATA: u8 = 0x02;
    pub const RAW_DATA: u8 = 0x03;
    pub const ENV_DATA: u8 = 0x05;
    pub const THRESHOLDS: u8 = 0x10;
    pub const BASELINE: u8 = 0x11;
    pub const HW_ID: u8 = 0x20;
    pub const HW_VERSION: u8 = 0x21;
    pub const FW_BOOT_VERSION: u8 = 0x23;
    pub const FW_APP_VERSION: u8 = 0x24;
    pub const INTERNAL_STATE: u8 = 0xA0;
    pub const ERROR_ID: u8 = 0xE0;
    pub const APP_START: u8 = 0xF4;
    pub const SW_RESET: u8 = 0xFF;
}

const RESET_SEQUENCE: [u8; 4] = [0x11, 0xE5, 0x72, 0x8A];
const RESET_DELAY_MS: u32 = 2;
const APP_START_DELAY_MS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ccs811Error {
    /// The handle has no register HAL bound to it.
    Hal,
    Bus(BusError),
    /// Hardware id read back from the device.
    InvalidSensor(u8),
    /// No valid application firmware is loaded.
    InvalidApplication,
    /// Still in boot mode after `APP_START`.
    NotInApplicationMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FirmwareMode {
    Boot,
    Application,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(pub u8);

impl Status {
    pub const fn firmware_mode(self) -> FirmwareMode {
        if self.0 & 0x80 != 0 {
            FirmwareMode::Application
        } else {
            FirmwareMode::Boot
        }
    }

    pub const fn app_erase(self) -> bool {
        self.0 & 0x40 != 0
    }

    pub const fn app_verify(self) -> bool {
        self.0 & 0x20 != 0
    }

    pub const fn app_valid(self) -> bool {
        self.0 & 0x10 != 0
    }

    pub const fn data_ready(self) -> bool {
        self.0 & 0x08 != 0
    }

    pub const fn error(self) -> bool {
        self.0 & 0x01 != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorId(pub u8);

impl ErrorId {
    pub const fn write_reg_invalid(self) -> bool {
        self.0 & 0x80 != 0
    }

    pub const fn read_reg_invalid(self) -> bool {
        self.0 & 0x40 != 0
    }

    pub const fn meas_mode_invalid(self) -> bool {
        self.0 & 0x20 != 0
    }

    pub const fn max_resistance(self) -> bool {
        self.0 & 0x10 != 0
    }

    pub const fn heater_fault(self) -> bool {
        self.0 & 0x08 != 0
    }

    pub const fn heater_supply(self) -> bool {
        self.0 & 0x04 != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DriveMode {
    Idle = 0,
    EverySecond = 1,
    Every10Seconds = 2,
    Every60Seconds = 3,
    /// Constant power, a sample every 250 ms.
    Constant = 4,
}

impl DriveMode {
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(DriveMode::Idle),
            1 => Some(DriveMode::EverySecond),
            2 => Some(DriveMode::Every10Seconds),
            3 => Some(DriveMode::Every60Seconds),
            4 => Some(DriveMode::Constant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MeasMode(pub u8);

impl MeasMode {
    pub const fn new(drive_mode: DriveMode, interrupt: bool, threshold: bool) -> Self {
        Self(((drive_mode as u8) << 4) | ((interrupt as u8) << 3) | ((threshold as u8) << 2))
    }

    pub const fn drive_mode(self) -> Option<DriveMode> {
        DriveMode::from_bits((self.0 & 0x70) >> 4)
    }

    pub const fn interrupt(self) -> bool {
        self.0 & 0x08 != 0
    }

    pub const fn threshold(self) -> bool {
        self.0 & 0x04 != 0
    }
}

/// Heater current in bits 15..10, ADC reading in bits 9..0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawData(pub u16);

impl RawData {
    pub const fn current_ua(self) -> u8 {
        ((self.0 & 0xFC00) >> 10) as u8
    }

    pub const fn adc(self) -> u16 {
        self.0 & 0x03FF
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlgorithmResult {
    pub eco2_ppm: u16,
    pub tvoc_ppb: u16,
    pub status: Status,
    pub error_id: ErrorId,
    pub raw: RawData,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorInfo {
    pub hw_id: u8,
    pub hw_version: u8,
    pub fw_boot_version: u16,
    pub fw_app_version: u16,
}

/// ENV_DATA words for the given conditions: humidity in 1/512 %RH and
/// temperature in 1/512 °C offset by 25 °C.
pub fn env_data_params(temperature_c: f32, humidity_pct: f32) -> (u16, u16) {
    let humidity = humidity_pct.clamp(0.0, 100.0) * 512.0 + 0.5;
    let temperature = (temperature_c + 25.0).clamp(0.0, 127.99) * 512.0 + 0.5;
    (humidity as u16, temperature as u16)
}

pub struct Ccs811<H> {
    hal: Option<H>,
    address: u8,
    drive_mode: DriveMode,
    info: SensorInfo,
}

impl<H> Ccs811<H> {
    /// A handle without a HAL. Every operation fails with
    /// [`Ccs811Error::Hal`] until one is bound.
    pub const fn unbound(address: u8) -> Self {
        Self {
            hal: None,
            address,
            drive_mode: DriveMode::EverySecond,
            info: SensorInfo {
                hw_id: 0,
                hw_version: 0,
                fw_boot_version: 0,
                fw_app_version: 0,
            },
        }
    }

    pub fn bind(&mut self, hal: H) {
        self.hal = Some(hal);
    }

    pub fn release(self) -> Option<H> {
        self.hal
    }
}

impl<H: RegisterHal> Ccs811<H> {
    pub fn new(hal: H, address: u8) -> Self {
        let mut ccs811 = Self::unbound(address);
        ccs811.bind(hal);
        ccs811
    }

    /// Mode programmed by [`Sensor::start`].
    pub fn with_drive_mode(mut self, drive_mode: DriveMode) -> Self {
        self.drive_mode = drive_mode;
        self
    }

    pub fn info(&self) -> &SensorInfo {
        &self.info
    }

    fn hal(&mut self) -> Result<&mut H, Ccs811Error> {
        self.hal.as_mut().ok_or(Ccs811Error::Hal)
    }

    fn read_register(&mut self, register: u8, data: &mut [u8]) -> Result<(), Ccs811Error> {
        let address = self.address;
        self.hal()?.read(address, register, data).map_err(Ccs811Error::Bus)
    }

    fn write_register(&mut self, register: u8, data: &[u8]) -> Result<(), Ccs811Error> {
        let address = self.address;
        self.hal()?.write(address, register, data).map_err(Ccs811Error::Bus)
    }

    fn read_u8(&mut self, register: u8) -> Result<u8, Ccs811Error> {
        let mut data = [0u8; 1];
        self.read_register(register, &mut data)?;
        Ok(data[0])
    }

    fn read_u16(&mut self, register: u8) -> Result<u16, Ccs811Error> {
        let mut data = [0u8; 2];
        self.read_register(register, &mut data)?;
        Ok(u16::from_be_bytes(data))
    }

    pub fn reset(&mut self) -> Result<(), Ccs811Error> {
        self.write_register(reg::SW_RESET, &RESET_SEQUENCE)?;
        self.hal()?.delay_ms(RESET_DELAY_MS);
        Ok(())
    }

    /// Leaves boot mode and starts the application firmware.
    pub fn app_start(&mut self) -> Result<(), Ccs811Error> {
        self.write_register(reg::APP_START, &[])?;
        self.hal()?.delay_ms(APP_START_DELAY_MS);
        Ok(())
    }

    pub fn get_sensor_info(&mut self) -> Result<&SensorInfo, Ccs811Error> {
        let hw_id = self.read_u8(reg::HW_ID)?;
        if hw_id != CCS811_HW_ID {
            warn!("ccs811: unexpected hardware id {:x}", hw_id);
            return Err(Ccs811Error::InvalidSensor(hw_id));
        }
        self.info = SensorInfo {
            hw_id,
            hw_version: self.read_u8(reg::HW_VERSION)?,
            fw_boot_version: self.read_u16(reg::FW_BOOT_VERSION)?,
            fw_app_version: self.read_u16(reg::FW_APP_VERSION)?,
        };
        Ok(&self.info)
    }

    pub fn get_status(&mut self) -> Result<Status, Ccs811Error> {
        self.read_u8(reg::STATUS).map(Status)
    }

    pub fn get_error_id(&mut self) -> Result<ErrorId, Ccs811Error> {
        self.read_u8(reg::ERROR_ID).map(ErrorId)
    }

    pub fn set_meas_mode(&mut self, drive_mode: DriveMode, interrupt: bool, threshold: bool) -> Result<(), Ccs811Error> {
        let mode = MeasMode::new(drive_mode, interrupt, threshold);
        self.write_register(reg::MEAS_MODE, &[mode.0])
    }

    pub fn get_meas_mode(&mut self) -> Result<MeasMode, Ccs811Error> {
        self.read_u8(reg::MEAS_MODE).map(MeasMode)
    }

    pub fn get_co2(&mut self) -> Result<u16, Ccs811Error> {
        self.read_u16(reg::ALG_RESULT_DATA)
    }

    pub fn get_co2_tvoc(&mut self) -> Result<(u16, u16), Ccs811Error> {
        let mut data = [0u8; 4];
        self.read_register(reg::ALG_RESULT_DATA, &mut data)?;
        Ok((u16::from_be_bytes([data[0], data[1]]), u16::from_be_bytes([data[2], data[3]])))
    }

    pub fn get_co2_tvoc_status(&mut self) -> Result<(u16, u16, Status), Ccs811Error> {
        let mut data = [0u8; 5];
        self.read_register(reg::ALG_RESULT_DATA, &mut data)?;
        Ok((
            u16::from_be_bytes([data[0], data[1]]),
            u16::from_be_bytes([data[2], data[3]]),
            Status(data[4]),
        ))
    }

    pub fn get_co2_tvoc_status_eid(&mut self) -> Result<(u16, u16, Status, ErrorId), Ccs811Error> {
        let mut data = [0u8; 6];
        self.read_register(reg::ALG_RESULT_DATA, &mut data)?;
        Ok((
            u16::from_be_bytes([data[0], data[1]]),
            u16::from_be_bytes([data[2], data[3]]),
            Status(data[4]),
            ErrorId(data[5]),
        ))
    }

    /// The full 8-byte result block, including the data-ready bit in
    /// `status`.
    pub fn get_results_with_status_and_raw(&mut self) -> Result<AlgorithmResult, Ccs811Error> {
        let mut data = [0u8; 8];
        self.read_register(reg::ALG_RESULT_DATA, &mut data)?;
        Ok(AlgorithmResult {
            eco2_ppm: u16::from_be_bytes([data[0], data[1]]),
            tvoc_ppb: u16::from_be_bytes([data[2], data[3]]),
            status: Status(data[4]),
            error_id: ErrorId(data[5]),
            raw: RawData(u16::from_be_bytes([data[6], data[7]])),
        })
    }

    pub fn get_raw_data(&mut self) -> Result<RawData, Ccs811Error> {
        self.read_u16(reg::RAW_DATA).map(RawData)
    }

    pub fn set_env_data(&mut self, humidity: u16, temperature: u16) -> Result<(), Ccs811Error> {
        let [h_hi, h_lo] = humidity.to_be_bytes();
        let [t_hi, t_lo] = temperature.to_be_bytes();
        self.write_register(reg::ENV_DATA, &[h_hi, h_lo, t_hi, t_lo])
    }

    pub fn set_environment(&mut self, temperature_c: f32, humidity_pct: f32) -> Result<(), Ccs811Error> {
        let (humidity, temperature) = env_data_params(temperature_c, humidity_pct);
        self.set_env_data(humidity, temperature)
    }

    /// eCO2 thresholds (ppm) used by the threshold interrupt.
    pub fn set_thresholds(&mut self, low_medium: u16, medium_high: u16) -> Result<(), Ccs811Error> {
        let [lm_hi, lm_lo] = low_medium.to_be_bytes();
        let [mh_hi, mh_lo] = medium_high.to_be_bytes();
        self.write_register(reg::THRESHOLDS, &[lm_hi, lm_lo, mh_hi, mh_lo])
    }

    pub fn set_baseline(&mut self, baseline: u16) -> Result<(), Ccs811Error> {
        self.write_register(reg::BASELINE, &baseline.to_be_bytes())
    }

    pub fn get_baseline(&mut self) -> Result<u16, Ccs811Error> {
        self.read_u16(reg::BASELINE)
    }
}

impl<H: RegisterHal> Sensor for Ccs811<H> {
    type Reading = AlgorithmResult;

    fn start(&mut self) -> Result<(), InitError> {
        self.reset()?;
        let info = self.get_sensor_info()?;
        info!(
            "ccs811: hw {:x} boot fw {:x} app fw {:x}",
            info.hw_version,
            info.fw_boot_version,
            info.fw_app_version
        );

        let status = self.get_status()?;
        if !status.app_valid() {
            return Err(Ccs811Error::InvalidApplication.into());
        }
        if status.firmware_mode() == FirmwareMode::Boot {
            self.app_start()?;
            if self.get_status()?.firmware_mode() != FirmwareMode::Application {
                return Err(Ccs811Error::NotInApplicationMode.into());
            }
        }

        self.set_meas_mode(self.drive_mode, false, false)?;
        Ok(())
    }

    fn read(&mut self) -> Result<AlgorithmResult, SensorStatus> {
        let result = self.get_results_with_status_and_raw().map_err(|e| {
            warn!("ccs811: result read failed: {:?}", e);
            SensorStatus::ReadError
        })?;

        if result.status.error() || result.status.firmware_mode() != FirmwareMode::Application {
            warn!("ccs811: status {:x} error id {:x}", result.status.0, result.error_id.0);
            return Err(SensorStatus::DeviceError);
        }
        if !result.status.data_ready() {
            return Err(SensorStatus::NotReady);
        }
        Ok(result)
    }

    fn compensate(&mut self, temperature_c: f32, humidity_pct: f32) {
        if let Err(e) = self.set_environment(temperature_c, humidity_pct) {
            warn!("ccs811: environment update failed: {:?}", e);
        }
    }
}
