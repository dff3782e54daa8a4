pub mod ccs811;
pub mod scd30;
pub mod zmod4xxx;

use crate::sensors::ccs811::Ccs811Error;
use crate::sensors::scd30::Scd30Error;
use crate::sensors::zmod4xxx::ZmodError;

/// Why a poll produced no valid reading this cycle.
///
/// None of these stop the scheduler: the slot is marked invalid and the
/// sensor is tried again on its next period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorStatus {
    /// Bus failure or a response that failed its integrity check.
    ReadError,
    /// Bus healthy but the device has no new sample yet.
    NotReady,
    /// The gas sensor's ADC result block could not be read.
    AdcError,
    /// The IAQ algorithm rejected the sample.
    AlgorithmError,
    /// The IAQ algorithm is still warming up.
    Stabilizing,
    /// The gas sensor refused the start command.
    StartMeasurementError,
    /// The gas sensor's sequencer never reached its final step.
    Timeout,
    /// The device flagged an internal error or is in the wrong firmware mode.
    DeviceError,
}

/// Startup failure. The firmware never enters the scheduler after one of
/// these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    Co2(Scd30Error),
    Gas(ZmodError),
    Voc(Ccs811Error),
}

impl From<Scd30Error> for InitError {
    fn from(e: Scd30Error) -> Self {
        InitError::Co2(e)
    }
}

impl From<ZmodError> for InitError {
    fn from(e: ZmodError) -> Self {
        InitError::Gas(e)
    }
}

impl From<Ccs811Error> for InitError {
    fn from(e: Ccs811Error) -> Self {
        InitError::Voc(e)
    }
}

/// A device the scheduler can poll.
pub trait Sensor {
    type Reading: Copy;

    /// One-time bring-up. Called before the first poll.
    fn start(&mut self) -> Result<(), InitError>;

    /// One poll: a complete reading or the reason there is none.
    fn read(&mut self) -> Result<Self::Reading, SensorStatus>;

    /// Ambient conditions from another sensor, for parts that compensate.
    fn compensate(&mut self, _temperature_c: f32, _humidity_pct: f32) {}
}
