//! Latest readings and the line records built from them.
//!
//! A record holds one line per sensor family whose last poll produced a valid
//! reading: `<name> key=value,key=value\n`. Sensors whose last poll failed
//! are left out of the record entirely.

use core::fmt::Write;
use core::future::Future;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Sender, TrySendError};
use heapless::{Deque, String};

use crate::sensors::ccs811::AlgorithmResult;
use crate::sensors::scd30::Measurement;
use crate::sensors::zmod4xxx::iaq::IaqResults;
use crate::sensors::zmod4xxx::MAX_TEST_CHANNELS;
use crate::sensors::SensorStatus;

pub const RECORD_CAPACITY: usize = 512;
pub type Record = String<RECORD_CAPACITY>;

pub const AUTHORIZATION_CAPACITY: usize = 160;

pub const CO2_MEASUREMENT: &str = "scd30";
pub const GAS_MEASUREMENT: &str = "zmod4410";
pub const GAS_TEST_MEASUREMENT: &str = "zmod4410_test";
pub const VOC_MEASUREMENT: &str = "ccs811";

/// Most recent reading of one sensor plus whether the last poll produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot<T> {
    reading: Option<T>,
    valid: bool,
    status: Option<SensorStatus>,
}

impl<T: Copy> Slot<T> {
    pub const fn empty() -> Self {
        Self { reading: None, valid: false, status: None }
    }

    /// Stores the outcome of a poll. A failed poll keeps the previous reading
    /// but marks the slot invalid.
    pub fn record(&mut self, outcome: Result<T, SensorStatus>) {
        match outcome {
            Ok(reading) => {
                self.reading = Some(reading);
                self.valid = true;
                self.status = None;
            }
            Err(status) => {
                self.valid = false;
                self.status = Some(status);
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The reading, if the last poll succeeded.
    pub fn current(&self) -> Option<&T> {
        if self.valid {
            self.reading.as_ref()
        } else {
            None
        }
    }

    /// Why the last poll failed.
    pub fn last_status(&self) -> Option<SensorStatus> {
        self.status
    }
}

impl<T: Copy> Default for Slot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Readings {
    pub co2: Slot<Measurement>,
    pub gas: Slot<IaqResults>,
    pub gas_test: [Slot<IaqResults>; MAX_TEST_CHANNELS],
    pub voc: Slot<AlgorithmResult>,
}

impl Readings {
    pub fn valid_count(&self) -> usize {
        usize::from(self.co2.is_valid())
            + usize::from(self.gas.is_valid())
            + self.gas_test.iter().filter(|slot| slot.is_valid()).count()
            + usize::from(self.voc.is_valid())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryError {
    /// The record does not fit in [`RECORD_CAPACITY`] bytes.
    Overflow,
}

impl From<core::fmt::Error> for TelemetryError {
    fn from(_: core::fmt::Error) -> Self {
        TelemetryError::Overflow
    }
}

/// Builds the record for every valid slot. `Ok(None)` when nothing is valid.
pub fn serialize(readings: &Readings) -> Result<Option<Record>, TelemetryError> {
    let mut record = Record::new();

    if let Some(m) = readings.co2.current() {
        writeln!(
            record,
            "{} co2={:.2},temperature={:.2},humidity={:.2}",
            CO2_MEASUREMENT, m.co2_ppm, m.temperature_c, m.humidity_pct
        )?;
    }
    if let Some(results) = readings.gas.current() {
        write!(record, "{}", GAS_MEASUREMENT)?;
        write_iaq(&mut record, results)?;
    }
    for (index, slot) in readings.gas_test.iter().enumerate() {
        if let Some(results) = slot.current() {
            write!(record, "{}{}", GAS_TEST_MEASUREMENT, index)?;
            write_iaq(&mut record, results)?;
        }
    }
    if let Some(r) = readings.voc.current() {
        writeln!(
            record,
            "{} eco2={},tvoc={},current={},adc={}",
            VOC_MEASUREMENT,
            r.eco2_ppm,
            r.tvoc_ppb,
            r.raw.current_ua(),
            r.raw.adc()
        )?;
    }

    Ok(if record.is_empty() { None } else { Some(record) })
}

fn write_iaq(record: &mut Record, r: &IaqResults) -> core::fmt::Result {
    writeln!(
        record,
        " iaq={:.2},tvoc={:.3},etoh={:.3},eco2={:.0},rmox={:.0},gas_index={}",
        r.iaq, r.tvoc_mg_m3, r.etoh_ppm, r.eco2_ppm, r.rmox_ohm, r.gas_index
    )
}

/// Bearer `Authorization` header value for the endpoint token.
pub fn authorization(token: &str) -> Result<String<AUTHORIZATION_CAPACITY>, TelemetryError> {
    let mut header = String::new();
    write!(header, "Bearer {}", token)?;
    Ok(header)
}

/// Where finished records go. Hands the record back when there is no room.
pub trait RecordSink {
    fn submit(&mut self, record: Record) -> Result<(), Record>;
}

impl<M: RawMutex, const N: usize> RecordSink for Sender<'_, M, Record, N> {
    fn submit(&mut self, record: Record) -> Result<(), Record> {
        self.try_send(record).map_err(|e| match e {
            TrySendError::Full(record) => record,
        })
    }
}

impl<const N: usize> RecordSink for Deque<Record, N> {
    fn submit(&mut self, record: Record) -> Result<(), Record> {
        self.push_back(record)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UplinkError {
    /// DNS lookup or TCP connect failed.
    Connect,
    /// The request could not be sent or its response was not understood.
    Request,
}

/// Sends a record body to the time-series endpoint.
pub trait Uplink {
    /// Returns the HTTP status code.
    fn post(&mut self, body: &[u8]) -> impl Future<Output = Result<u16, UplinkError>>;
}

/// Posts one record and logs anything other than a 2xx answer.
pub async fn deliver<U: Uplink>(uplink: &mut U, record: &Record) -> Result<u16, UplinkError> {
    match uplink.post(record.as_bytes()).await {
        Ok(status) if (200..300).contains(&status) => {
            debug!("uplink: {} bytes accepted ({})", record.len(), status);
            Ok(status)
        }
        Ok(status) => {
            warn!("uplink: endpoint answered {}", status);
            Ok(status)
        }
        Err(e) => {
            warn!("uplink: post failed {:?}", e);
            Err(e)
        }
    }
}
