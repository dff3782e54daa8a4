//! Renesas ZMOD4410 metal-oxide gas sensor.
//!
//! A measurement cycle is split in two halves: [`Zmod4xxx::acquire`] runs the
//! hardware sequence and returns the raw ADC block, and
//! [`Zmod4xxx::evaluate`] feeds that block to an IAQ algorithm handle. The
//! same sample can be evaluated by several handles, which is how
//! [`GasChannel`] runs test baselines next to the production one.

pub mod config;
pub mod iaq;

use heapless::Vec;

use crate::hal::{BusError, RegisterHal, MAX_REGISTER_WRITE};
use crate::sensors::{InitError, Sensor, SensorStatus};

use self::config::{RegisterProfile, INIT, ZMOD4410_I2C_ADDR, ZMOD4410_PID};
use self::iaq::{IaqAlgorithm, IaqError, IaqResults};

pub const REG_PID: u8 = 0x00;
pub const REG_CONF: u8 = 0x20;
pub const REG_PROD_DATA: u8 = 0x26;
pub const REG_CMD: u8 = 0x93;
pub const REG_STATUS: u8 = 0x94;

pub const STATUS_SEQUENCER_RUNNING: u8 = 0x80;
pub const STATUS_SLEEP_TIMER_ENABLED: u8 = 0x40;
pub const STATUS_ALARM: u8 = 0x20;
pub const STATUS_LAST_SEQ_STEP_MASK: u8 = 0x1F;

pub const CONFIG_LEN: usize = 6;
pub const MAX_PROD_DATA_LEN: usize = 10;
pub const MAX_ADC_LEN: usize = 32;

/// Delay between two status polls.
pub const POLL_INTERVAL_MS: u32 = 50;
pub const DEFAULT_MAX_POLLS: u32 = 200;

/// Test baselines a [`GasChannel`] can carry next to the production one.
pub const MAX_TEST_CHANNELS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ZmodError {
    Bus(BusError),
    /// Product id read back from the device.
    UnsupportedSensor(u16),
    /// The sequencer did not finish within the poll budget.
    Timeout,
    /// A profile asks for more bytes than the driver buffers.
    InvalidLength,
}

/// Per-device data read once during bring-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorInfo {
    pub product_id: u16,
    pub config: [u8; CONFIG_LEN],
    pub prod_data: [u8; MAX_PROD_DATA_LEN],
    pub prod_data_len: usize,
    /// Low and high MOX references from the init sequence.
    pub mox_lr: u16,
    pub mox_er: u16,
}

impl SensorInfo {
    pub fn prod_data(&self) -> &[u8] {
        &self.prod_data[..self.prod_data_len]
    }
}

/// Raw result block of one measurement sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcSample {
    bytes: [u8; MAX_ADC_LEN],
    len: usize,
}

impl AdcSample {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Converts heater targets (big-endian words) into the device-specific
/// setpoints written to the H block. Returns the number of bytes written.
pub fn heater_setpoints(config: &[u8; CONFIG_LEN], targets: &[u8], out: &mut [u8]) -> usize {
    let gain = -(f32::from(config[2]) * 256.0 + f32::from(config[3]));
    let slope = f32::from(config[4]) + 640.0;
    let mut written = 0;
    for (target, setpoint) in targets.chunks_exact(2).zip(out.chunks_exact_mut(2)) {
        let target = f32::from(u16::from_be_bytes([target[0], target[1]]));
        let hspf = gain * (slope * (f32::from(config[5]) + target) - 512_000.0) / 12_288_000.0;
        setpoint.copy_from_slice(&(hspf as u16).to_be_bytes());
        written += 2;
    }
    written
}

/// Detects the end of a measurement sequence from successive status polls.
///
/// The sequence is complete when the step field *changes to* the final step.
/// The first poll only records where the sequencer is, so a stale final step
/// left over from the previous cycle is never mistaken for completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceTracker {
    target: u8,
    last: Option<u8>,
}

impl SequenceTracker {
    pub const fn new(target: u8) -> Self {
        Self { target, last: None }
    }

    pub fn observe(&mut self, step: u8) -> bool {
        let complete = matches!(self.last, Some(previous) if previous != step) && step == self.target;
        self.last = Some(step);
        complete
    }
}

pub struct Zmod4xxx<H> {
    hal: H,
    address: u8,
    init: &'static RegisterProfile,
    measurement: &'static RegisterProfile,
    info: SensorInfo,
    max_polls: u32,
}

impl<H: RegisterHal> Zmod4xxx<H> {
    pub fn new(hal: H, measurement: &'static RegisterProfile) -> Self {
        Self {
            hal,
            address: ZMOD4410_I2C_ADDR,
            init: &INIT,
            measurement,
            info: SensorInfo::default(),
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    pub fn info(&self) -> &SensorInfo {
        &self.info
    }

    pub fn measurement_profile(&self) -> &'static RegisterProfile {
        self.measurement
    }

    pub fn release(self) -> H {
        self.hal
    }

    fn read_register(&mut self, register: u8, data: &mut [u8]) -> Result<(), ZmodError> {
        self.hal.read(self.address, register, data).map_err(ZmodError::Bus)
    }

    fn write_register(&mut self, register: u8, data: &[u8]) -> Result<(), ZmodError> {
        self.hal.write(self.address, register, data).map_err(ZmodError::Bus)
    }

    /// Reads product id, configuration and production data.
    pub fn read_sensor_info(&mut self) -> Result<&SensorInfo, ZmodError> {
        let mut pid = [0u8; 2];
        self.read_register(REG_PID, &mut pid)?;
        let product_id = u16::from_be_bytes(pid);
        if product_id != ZMOD4410_PID {
            warn!("zmod4xxx: unsupported product id {:x}", product_id);
            return Err(ZmodError::UnsupportedSensor(product_id));
        }

        let mut config = [0u8; CONFIG_LEN];
        self.read_register(REG_CONF, &mut config)?;

        let prod_data_len = self.measurement.prod_data_len;
        if prod_data_len > MAX_PROD_DATA_LEN {
            return Err(ZmodError::InvalidLength);
        }
        let mut prod_data = [0u8; MAX_PROD_DATA_LEN];
        self.read_register(REG_PROD_DATA, &mut prod_data[..prod_data_len])?;

        self.info = SensorInfo {
            product_id,
            config,
            prod_data,
            prod_data_len,
            ..self.info
        };
        Ok(&self.info)
    }

    fn load_profile(&mut self, profile: &RegisterProfile) -> Result<(), ZmodError> {
        if profile.h.data.len() > MAX_REGISTER_WRITE {
            return Err(ZmodError::InvalidLength);
        }
        let mut heater = [0u8; MAX_REGISTER_WRITE];
        let len = heater_setpoints(&self.info.config, profile.h.data, &mut heater);
        self.write_register(profile.h.address, &heater[..len])?;
        self.write_register(profile.d.address, profile.d.data)?;
        self.write_register(profile.m.address, profile.m.data)?;
        self.write_register(profile.s.address, profile.s.data)
    }

    fn wait_while_running(&mut self) -> Result<(), ZmodError> {
        for _ in 0..self.max_polls {
            if self.read_status()? & STATUS_SEQUENCER_RUNNING == 0 {
                return Ok(());
            }
            self.hal.delay_ms(POLL_INTERVAL_MS);
        }
        Err(ZmodError::Timeout)
    }

    /// Runs the init sequence to obtain the MOX references, then loads the
    /// measurement profile. Requires [`Self::read_sensor_info`] first.
    pub fn prepare_sensor(&mut self) -> Result<(), ZmodError> {
        let init = self.init;
        if init.r.len != 4 {
            return Err(ZmodError::InvalidLength);
        }
        self.load_profile(init)?;
        self.write_register(REG_CMD, &[init.start])?;
        self.wait_while_running()?;

        let mut references = [0u8; 4];
        self.read_register(init.r.address, &mut references)?;
        self.info.mox_lr = u16::from_be_bytes([references[0], references[1]]);
        self.info.mox_er = u16::from_be_bytes([references[2], references[3]]);
        debug!("zmod4xxx: mox_lr={} mox_er={}", self.info.mox_lr, self.info.mox_er);

        let measurement = self.measurement;
        self.load_profile(measurement)
    }

    pub fn start_measurement(&mut self) -> Result<(), ZmodError> {
        let start = self.measurement.start;
        self.write_register(REG_CMD, &[start])
    }

    pub fn read_status(&mut self) -> Result<u8, ZmodError> {
        let mut status = [0u8; 1];
        self.read_register(REG_STATUS, &mut status)?;
        Ok(status[0])
    }

    pub fn read_adc_result(&mut self) -> Result<AdcSample, ZmodError> {
        let r = self.measurement.r;
        if r.len > MAX_ADC_LEN {
            return Err(ZmodError::InvalidLength);
        }
        let mut sample = AdcSample {
            bytes: [0u8; MAX_ADC_LEN],
            len: r.len,
        };
        self.read_register(r.address, &mut sample.bytes[..r.len])?;
        Ok(sample)
    }

    pub fn target_step(&self) -> u8 {
        self.measurement.final_step()
    }

    /// Start, poll until the sequencer reaches its final step, read the ADC
    /// block. Blocks for up to `max_polls` poll intervals.
    pub fn acquire(&mut self) -> Result<AdcSample, SensorStatus> {
        if let Err(e) = self.start_measurement() {
            warn!("zmod4xxx: start failed: {:?}", e);
            return Err(SensorStatus::StartMeasurementError);
        }

        let mut tracker = SequenceTracker::new(self.target_step());
        for _ in 0..self.max_polls {
            let status = self.read_status().map_err(|e| {
                warn!("zmod4xxx: status read failed: {:?}", e);
                SensorStatus::ReadError
            })?;
            let complete = tracker.observe(status & STATUS_LAST_SEQ_STEP_MASK);
            self.hal.delay_ms(POLL_INTERVAL_MS);
            if complete {
                return self.read_adc_result().map_err(|e| {
                    warn!("zmod4xxx: ADC read failed: {:?}", e);
                    SensorStatus::AdcError
                });
            }
        }

        warn!("zmod4xxx: sequence did not complete after {} polls", self.max_polls);
        Err(SensorStatus::Timeout)
    }

    pub fn evaluate<A: IaqAlgorithm>(&self, algorithm: &mut A, sample: &AdcSample) -> Result<IaqResults, SensorStatus> {
        algorithm
            .calc(&self.info, sample.as_bytes())
            .map_err(|e| match e {
                IaqError::Stabilizing => SensorStatus::Stabilizing,
                IaqError::InvalidAdc => SensorStatus::AlgorithmError,
            })
    }
}

/// Outcome of one gas cycle for every algorithm handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasReading {
    pub production: Result<IaqResults, SensorStatus>,
    /// `None` for slots without a test handle.
    pub test: [Option<Result<IaqResults, SensorStatus>>; MAX_TEST_CHANNELS],
}

/// The gas sensor plus its production algorithm handle and up to
/// [`MAX_TEST_CHANNELS`] test handles sharing the same samples.
pub struct GasChannel<H, A> {
    sensor: Zmod4xxx<H>,
    production: A,
    test: Vec<A, MAX_TEST_CHANNELS>,
}

impl<H: RegisterHal, A: IaqAlgorithm> GasChannel<H, A> {
    pub fn new(sensor: Zmod4xxx<H>, production: A) -> Self {
        Self {
            sensor,
            production,
            test: Vec::new(),
        }
    }

    /// Adds a test handle. Hands it back when all slots are taken.
    pub fn add_test_channel(&mut self, algorithm: A) -> Result<(), A> {
        self.test.push(algorithm)
    }

    /// Restarts one test baseline. The production handle is never reset here.
    pub fn reset_test_channel(&mut self, index: usize) -> bool {
        match self.test.get_mut(index) {
            Some(algorithm) => {
                algorithm.reset();
                info!("zmod4xxx: test channel {} reset", index);
                true
            }
            None => false,
        }
    }

    pub fn sensor(&self) -> &Zmod4xxx<H> {
        &self.sensor
    }

    pub fn release(self) -> (Zmod4xxx<H>, A, Vec<A, MAX_TEST_CHANNELS>) {
        (self.sensor, self.production, self.test)
    }
}

impl<H: RegisterHal, A: IaqAlgorithm> Sensor for GasChannel<H, A> {
    type Reading = GasReading;

    fn start(&mut self) -> Result<(), InitError> {
        let info = self.sensor.read_sensor_info()?;
        info!("zmod4xxx: product {:x}", info.product_id);
        self.sensor.prepare_sensor()?;
        Ok(())
    }

    fn read(&mut self) -> Result<GasReading, SensorStatus> {
        let sample = self.sensor.acquire()?;
        let production = self.sensor.evaluate(&mut self.production, &sample);
        let mut test = [None; MAX_TEST_CHANNELS];
        for (slot, algorithm) in test.iter_mut().zip(self.test.iter_mut()) {
            *slot = Some(self.sensor.evaluate(algorithm, &sample));
        }
        Ok(GasReading { production, test })
    }
}
