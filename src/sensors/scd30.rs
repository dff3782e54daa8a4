//! Sensirion SCD30 CO2 / temperature / humidity module.
//!
//! Commands are 16-bit big-endian codes, optionally followed by a 16-bit
//! argument and its CRC. Responses are groups of two data bytes plus a CRC.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::hal::{bus_error, BusError};
use crate::sensors::{InitError, Sensor, SensorStatus};
use crate::{calculate_crc, check_crc_groups, CRC_GROUP_LEN};

pub const SCD30_I2C_ADDR: u8 = 0x61;

/// Time between a read command and fetching its response.
pub const RESPONSE_DELAY_US: u32 = 3003;

pub const MIN_MEASUREMENT_INTERVAL_S: u16 = 2;
pub const MAX_MEASUREMENT_INTERVAL_S: u16 = 1800;
pub const MIN_AMBIENT_PRESSURE_MBAR: u16 = 700;
pub const MAX_AMBIENT_PRESSURE_MBAR: u16 = 1400;
pub const MIN_FRC_PPM: u16 = 400;
pub const MAX_FRC_PPM: u16 = 2000;

const MEASUREMENT_LEN: usize = 6 * CRC_GROUP_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum Command {
    /// Argument: ambient pressure in mbar, 0 disables compensation.
    StartContinuousMeasurement = 0x0010,
    StopContinuousMeasurement = 0x0104,
    MeasurementInterval = 0x4600,
    GetDataReady = 0x0202,
    ReadMeasurement = 0x0300,
    AutomaticSelfCalibration = 0x5306,
    ForcedRecalibrationValue = 0x5204,
    TemperatureOffset = 0x5403,
    AltitudeCompensation = 0x5102,
    FirmwareVersion = 0xD100,
    SoftReset = 0xD304,
}

impl Command {
    pub const fn code(self) -> u16 {
        self as u16
    }
}

/// Bytes of one command as they go on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    bytes: [u8; 5],
    len: usize,
}

impl CommandFrame {
    /// `[cmd_hi, cmd_lo]`, or `[cmd_hi, cmd_lo, arg_hi, arg_lo, crc]`. The
    /// CRC covers the argument only.
    pub fn new(command: Command, argument: Option<u16>) -> Self {
        let mut bytes = [0u8; 5];
        bytes[..2].copy_from_slice(&command.code().to_be_bytes());
        match argument {
            None => Self { bytes, len: 2 },
            Some(argument) => {
                let argument = argument.to_be_bytes();
                bytes[2..4].copy_from_slice(&argument);
                bytes[4] = calculate_crc(&argument);
                Self { bytes, len: 5 }
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Scd30Error {
    Bus(BusError),
    /// At least one response group failed its CRC.
    Crc,
    /// Argument outside the range the sensor accepts. Nothing was sent.
    InvalidArgument,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    pub co2_ppm: f32,
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

/// Rebuilds a big-endian float from two groups, skipping the CRC byte
/// between them.
fn float_from_groups(groups: &[u8]) -> f32 {
    f32::from_bits(u32::from_be_bytes([groups[0], groups[1], groups[3], groups[4]]))
}

/// Decodes a validated 18-byte measurement response.
pub fn decode_measurement(raw: &[u8; MEASUREMENT_LEN]) -> Measurement {
    Measurement {
        co2_ppm: float_from_groups(&raw[0..6]),
        temperature_c: float_from_groups(&raw[6..12]),
        humidity_pct: float_from_groups(&raw[12..18]),
    }
}

pub struct Scd30<I, D> {
    i2c: I,
    delay: D,
    address: u8,
    interval_s: u16,
    ambient_pressure_mbar: u16,
}

impl<I: I2c, D: DelayNs> Scd30<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            address: SCD30_I2C_ADDR,
            interval_s: MIN_MEASUREMENT_INTERVAL_S,
            ambient_pressure_mbar: 0,
        }
    }

    /// Interval programmed by [`Sensor::start`].
    pub fn with_measurement_interval(mut self, interval_s: u16) -> Self {
        self.interval_s = interval_s;
        self
    }

    /// Pressure passed to the start command by [`Sensor::start`].
    pub fn with_ambient_pressure(mut self, pressure_mbar: u16) -> Self {
        self.ambient_pressure_mbar = pressure_mbar;
        self
    }

    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }

    pub fn write_command(&mut self, command: Command, argument: Option<u16>) -> Result<(), Scd30Error> {
        let frame = CommandFrame::new(command, argument);
        self.i2c
            .write(self.address, frame.as_bytes())
            .map_err(|e| Scd30Error::Bus(bus_error(e)))
    }

    /// Sends `command`, waits for the sensor, then reads `N` bytes
    /// (`N / 3` words) and checks every CRC group.
    pub fn read_command<const N: usize>(&mut self, command: Command) -> Result<[u8; N], Scd30Error> {
        self.write_command(command, None)?;
        self.delay.delay_us(RESPONSE_DELAY_US);

        let mut raw = [0u8; N];
        self.i2c
            .read(self.address, &mut raw)
            .map_err(|e| Scd30Error::Bus(bus_error(e)))?;
        if !check_crc_groups(&raw) {
            warn!("scd30: CRC mismatch in response to {:x}", command.code());
            return Err(Scd30Error::Crc);
        }
        Ok(raw)
    }

    fn read_word(&mut self, command: Command) -> Result<u16, Scd30Error> {
        let raw: [u8; CRC_GROUP_LEN] = self.read_command(command)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }

    /// `0` disables pressure compensation.
    pub fn start_continuous_measurement(&mut self, pressure_mbar: u16) -> Result<(), Scd30Error> {
        if pressure_mbar != 0
            && !(MIN_AMBIENT_PRESSURE_MBAR..=MAX_AMBIENT_PRESSURE_MBAR).contains(&pressure_mbar)
        {
            return Err(Scd30Error::InvalidArgument);
        }
        self.write_command(Command::StartContinuousMeasurement, Some(pressure_mbar))
    }

    pub fn stop_continuous_measurement(&mut self) -> Result<(), Scd30Error> {
        self.write_command(Command::StopContinuousMeasurement, None)
    }

    pub fn set_measurement_interval(&mut self, interval_s: u16) -> Result<(), Scd30Error> {
        if !(MIN_MEASUREMENT_INTERVAL_S..=MAX_MEASUREMENT_INTERVAL_S).contains(&interval_s) {
            return Err(Scd30Error::InvalidArgument);
        }
        self.write_command(Command::MeasurementInterval, Some(interval_s))
    }

    pub fn get_measurement_interval(&mut self) -> Result<u16, Scd30Error> {
        self.read_word(Command::MeasurementInterval)
    }

    pub fn data_ready(&mut self) -> Result<bool, Scd30Error> {
        Ok(self.read_word(Command::GetDataReady)? == 1)
    }

    pub fn read_measurement(&mut self) -> Result<Measurement, Scd30Error> {
        let raw: [u8; MEASUREMENT_LEN] = self.read_command(Command::ReadMeasurement)?;
        Ok(decode_measurement(&raw))
    }

    pub fn set_automatic_self_calibration(&mut self, enabled: bool) -> Result<(), Scd30Error> {
        self.write_command(Command::AutomaticSelfCalibration, Some(u16::from(enabled)))
    }

    pub fn get_automatic_self_calibration(&mut self) -> Result<bool, Scd30Error> {
        Ok(self.read_word(Command::AutomaticSelfCalibration)? == 1)
    }

    pub fn set_forced_recalibration(&mut self, co2_ppm: u16) -> Result<(), Scd30Error> {
        if !(MIN_FRC_PPM..=MAX_FRC_PPM).contains(&co2_ppm) {
            return Err(Scd30Error::InvalidArgument);
        }
        self.write_command(Command::ForcedRecalibrationValue, Some(co2_ppm))
    }

    pub fn get_forced_recalibration(&mut self) -> Result<u16, Scd30Error> {
        self.read_word(Command::ForcedRecalibrationValue)
    }

    /// Offset in units of 0.01 °C.
    pub fn set_temperature_offset(&mut self, centidegrees: u16) -> Result<(), Scd30Error> {
        self.write_command(Command::TemperatureOffset, Some(centidegrees))
    }

    pub fn get_temperature_offset(&mut self) -> Result<u16, Scd30Error> {
        self.read_word(Command::TemperatureOffset)
    }

    /// Height above sea level in metres.
    pub fn set_altitude_compensation(&mut self, altitude_m: u16) -> Result<(), Scd30Error> {
        self.write_command(Command::AltitudeCompensation, Some(altitude_m))
    }

    pub fn get_altitude_compensation(&mut self) -> Result<u16, Scd30Error> {
        self.read_word(Command::AltitudeCompensation)
    }

    pub fn firmware_version(&mut self) -> Result<FirmwareVersion, Scd30Error> {
        let raw: [u8; CRC_GROUP_LEN] = self.read_command(Command::FirmwareVersion)?;
        Ok(FirmwareVersion {
            major: raw[0],
            minor: raw[1],
        })
    }

    pub fn soft_reset(&mut self) -> Result<(), Scd30Error> {
        self.write_command(Command::SoftReset, None)
    }
}

impl<I: I2c, D: DelayNs> Sensor for Scd30<I, D> {
    type Reading = Measurement;

    fn start(&mut self) -> Result<(), InitError> {
        let version = self.firmware_version()?;
        info!("scd30: firmware {}.{}", version.major, version.minor);
        self.set_measurement_interval(self.interval_s)?;
        self.start_continuous_measurement(self.ambient_pressure_mbar)?;
        Ok(())
    }

    fn read(&mut self) -> Result<Measurement, SensorStatus> {
        // Bus and CRC failures are not distinguished past this point.
        match self.data_ready() {
            Ok(true) => {}
            Ok(false) => return Err(SensorStatus::NotReady),
            Err(e) => {
                warn!("scd30: data-ready check failed: {:?}", e);
                return Err(SensorStatus::ReadError);
            }
        }
        self.read_measurement().map_err(|e| {
            warn!("scd30: measurement read failed: {:?}", e);
            SensorStatus::ReadError
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    fn group(word: u16) -> Vec<u8> {
        let [hi, lo] = word.to_be_bytes();
        vec![hi, lo, calculate_crc(&[hi, lo])]
    }

    fn float_groups(value: f32) -> Vec<u8> {
        let bits = value.to_bits();
        let mut out = group((bits >> 16) as u16);
        out.extend(group(bits as u16));
        out
    }

    fn sensor(expectations: &[I2cTransaction]) -> Scd30<I2cMock, NoopDelay> {
        Scd30::new(I2cMock::new(expectations), NoopDelay::new())
    }

    fn finish(scd30: Scd30<I2cMock, NoopDelay>) {
        let (mut i2c, _) = scd30.release();
        i2c.done();
    }

    #[test]
    fn frames_carry_crc_over_argument_only() {
        let commands = [
            Command::StartContinuousMeasurement,
            Command::MeasurementInterval,
            Command::AutomaticSelfCalibration,
            Command::ForcedRecalibrationValue,
            Command::TemperatureOffset,
            Command::AltitudeCompensation,
        ];
        for command in commands {
            for argument in [0u16, 1, 2, 0x00FF, 0x0100, 1013, 0xBEEF, u16::MAX] {
                let [cmd_hi, cmd_lo] = command.code().to_be_bytes();
                let [arg_hi, arg_lo] = argument.to_be_bytes();
                let expected = [cmd_hi, cmd_lo, arg_hi, arg_lo, calculate_crc(&[arg_hi, arg_lo])];
                assert_eq!(CommandFrame::new(command, Some(argument)).as_bytes(), &expected);
            }
        }
        assert_eq!(CommandFrame::new(Command::SoftReset, None).as_bytes(), &[0xD3, 0x04]);
    }

    #[test]
    fn firmware_version_is_two_raw_bytes() {
        let mut scd30 = sensor(&[
            I2cTransaction::write(SCD30_I2C_ADDR, vec![0xD1, 0x00]),
            I2cTransaction::read(SCD30_I2C_ADDR, group(0x0342)),
        ]);
        assert_eq!(scd30.firmware_version(), Ok(FirmwareVersion { major: 3, minor: 0x42 }));
        finish(scd30);
    }

    #[test]
    fn measurement_floats_skip_crc_bytes() {
        let (co2, temperature, humidity) = (612.379_f32, 23.84_f32, 41.25_f32);
        let mut response = float_groups(co2);
        response.extend(float_groups(temperature));
        response.extend(float_groups(humidity));
        assert_eq!(response.len(), 18);

        let mut scd30 = sensor(&[
            I2cTransaction::write(SCD30_I2C_ADDR, vec![0x03, 0x00]),
            I2cTransaction::read(SCD30_I2C_ADDR, response),
        ]);
        let measurement = scd30.read_measurement().unwrap();
        assert_eq!(measurement.co2_ppm.to_bits(), co2.to_bits());
        assert_eq!(measurement.temperature_c.to_bits(), temperature.to_bits());
        assert_eq!(measurement.humidity_pct.to_bits(), humidity.to_bits());
        finish(scd30);
    }

    #[test]
    fn any_bad_crc_group_fails_the_read() {
        let mut response = float_groups(400.0);
        response.extend(float_groups(21.0));
        response.extend(float_groups(50.0));
        response[14] ^= 0x40;

        let mut scd30 = sensor(&[
            I2cTransaction::write(SCD30_I2C_ADDR, vec![0x03, 0x00]),
            I2cTransaction::read(SCD30_I2C_ADDR, response),
        ]);
        assert_eq!(scd30.read_measurement(), Err(Scd30Error::Crc));
        finish(scd30);
    }

    #[test]
    fn nack_is_a_bus_error() {
        let mut scd30 = sensor(&[I2cTransaction::write(SCD30_I2C_ADDR, vec![0x02, 0x02])
            .with_error(ErrorKind::NoAcknowledge(embedded_hal::i2c::NoAcknowledgeSource::Address))]);
        assert_eq!(scd30.data_ready(), Err(Scd30Error::Bus(BusError::Nack)));
        finish(scd30);
    }

    #[test]
    fn out_of_range_arguments_never_reach_the_bus() {
        let mut scd30 = sensor(&[]);
        assert_eq!(scd30.set_measurement_interval(1), Err(Scd30Error::InvalidArgument));
        assert_eq!(scd30.set_measurement_interval(1801), Err(Scd30Error::InvalidArgument));
        assert_eq!(scd30.set_forced_recalibration(399), Err(Scd30Error::InvalidArgument));
        assert_eq!(scd30.start_continuous_measurement(500), Err(Scd30Error::InvalidArgument));
        finish(scd30);
    }

    #[test]
    fn temperature_offset_uses_its_own_command() {
        let offset = 150u16;
        let [hi, lo] = offset.to_be_bytes();
        let mut scd30 = sensor(&[
            I2cTransaction::write(SCD30_I2C_ADDR, vec![0x54, 0x03, hi, lo, calculate_crc(&[hi, lo])]),
            I2cTransaction::write(SCD30_I2C_ADDR, vec![0x54, 0x03]),
            I2cTransaction::read(SCD30_I2C_ADDR, group(offset)),
        ]);
        scd30.set_temperature_offset(offset).unwrap();
        assert_eq!(scd30.get_temperature_offset(), Ok(offset));
        finish(scd30);
    }

    #[test]
    fn poll_reports_not_ready_without_reading() {
        let mut scd30 = sensor(&[
            I2cTransaction::write(SCD30_I2C_ADDR, vec![0x02, 0x02]),
            I2cTransaction::read(SCD30_I2C_ADDR, group(0)),
        ]);
        assert_eq!(scd30.read(), Err(SensorStatus::NotReady));
        finish(scd30);
    }

    #[test]
    fn poll_collapses_crc_failure_to_read_error() {
        let mut bad = group(1);
        bad[2] ^= 0xFF;
        let mut scd30 = sensor(&[
            I2cTransaction::write(SCD30_I2C_ADDR, vec![0x02, 0x02]),
            I2cTransaction::read(SCD30_I2C_ADDR, bad),
        ]);
        assert_eq!(scd30.read(), Err(SensorStatus::ReadError));
        finish(scd30);
    }

    #[test]
    fn start_programs_interval_then_starts() {
        let [ihi, ilo] = 2u16.to_be_bytes();
        let mut scd30 = sensor(&[
            I2cTransaction::write(SCD30_I2C_ADDR, vec![0xD1, 0x00]),
            I2cTransaction::read(SCD30_I2C_ADDR, group(0x0342)),
            I2cTransaction::write(SCD30_I2C_ADDR, vec![0x46, 0x00, ihi, ilo, calculate_crc(&[ihi, ilo])]),
            I2cTransaction::write(SCD30_I2C_ADDR, vec![0x00, 0x10, 0x00, 0x00, calculate_crc(&[0, 0])]),
        ]);
        scd30.start().unwrap();
        finish(scd30);
    }
}
