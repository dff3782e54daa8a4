//! Indoor-air-quality evaluation of raw ZMOD ADC samples.
//!
//! ADC words are converted to MOX resistance with the per-device calibration,
//! and the log-resistance is tracked against its own slowly adapting
//! baseline by the Sensirion gas-index algorithm. The index is then mapped to
//! the usual 1..5 IAQ scale and the TVOC/EtOH/eCO2 estimates derived from it.

use gas_index_algorithm::{AlgorithmType, GasIndexAlgorithm};
use libm::{expf, logf, powf};

use super::SensorInfo;

/// Resistance reported when the ADC word sits at or below the low reference.
pub const RMOX_MIN_OHM: f32 = 1e-3;
/// Resistance reported when the ADC word sits at or above the high reference.
pub const RMOX_MAX_OHM: f32 = 10e9;

/// Scales ln(Ω) into the integer range the gas-index tracker works in.
const RAW_SIGNAL_PER_LN_OHM: f32 = 2500.0;
const GAS_INDEX_PER_IAQ_STEP: f32 = 125.0;
/// mg/m³ of ethanol per ppm at 25 °C.
const ETOH_MG_M3_PER_PPM: f32 = 1.88;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IaqResults {
    pub rmox_ohm: f32,
    pub gas_index: i32,
    /// 1.0 (very good) to 5.0 (unhealthy).
    pub iaq: f32,
    pub tvoc_mg_m3: f32,
    pub etoh_ppm: f32,
    pub eco2_ppm: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IaqError {
    /// Still learning the baseline. Expected for the first cycles after
    /// power-on or a reset.
    Stabilizing,
    /// Sample is empty or not a whole number of words.
    InvalidAdc,
}

/// Running IAQ state fed with one ADC sample per measurement cycle.
///
/// Every handle keeps its own baseline. Several handles may be fed the same
/// samples.
pub trait IaqAlgorithm {
    fn calc(&mut self, info: &SensorInfo, adc: &[u8]) -> Result<IaqResults, IaqError>;

    /// Drops the learned baseline.
    fn reset(&mut self);
}

/// MOX resistance for one ADC word.
pub fn rmox_from_adc(info: &SensorInfo, adc: u16) -> f32 {
    let adc = f32::from(adc);
    let low = f32::from(info.mox_lr);
    let high = f32::from(info.mox_er);

    if adc - low <= 0.0 {
        RMOX_MIN_OHM
    } else if high - adc <= 0.0 {
        RMOX_MAX_OHM
    } else {
        f32::from(info.config[0]) * 1e3 * (adc - low) / (high - adc)
    }
}

fn raw_signal(rmox_ohm: f32) -> i32 {
    (logf(rmox_ohm) * RAW_SIGNAL_PER_LN_OHM).clamp(0.0, f32::from(u16::MAX)) as i32
}

/// Maps a gas index onto the IAQ scale and the estimates derived from it.
pub fn results_from_index(rmox_ohm: f32, gas_index: i32) -> IaqResults {
    let iaq = (1.0 + gas_index as f32 / GAS_INDEX_PER_IAQ_STEP).clamp(1.0, 5.0);
    let tvoc_mg_m3 = 0.3 * powf(3.0, iaq - 1.0);
    IaqResults {
        rmox_ohm,
        gas_index,
        iaq,
        tvoc_mg_m3,
        etoh_ppm: tvoc_mg_m3 / ETOH_MG_M3_PER_PPM,
        eco2_ppm: 400.0 + 400.0 * (iaq - 1.0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Generation {
    /// Tracks the last conversion of the sequence.
    First,
    /// Tracks the geometric mean of every conversion and waits longer
    /// before trusting the baseline.
    Second,
}

impl Generation {
    pub const fn stabilization_samples(self) -> u32 {
        match self {
            Generation::First => 10,
            Generation::Second => 60,
        }
    }
}

pub struct GasIndexIaq {
    generation: Generation,
    sample_period_s: f32,
    tracker: GasIndexAlgorithm,
    samples: u32,
}

impl GasIndexIaq {
    pub fn new(generation: Generation, sample_period_s: f32) -> Self {
        Self {
            generation,
            sample_period_s,
            tracker: GasIndexAlgorithm::new(AlgorithmType::Voc, sample_period_s),
            samples: 0,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    fn rmox(&self, info: &SensorInfo, adc: &[u8]) -> f32 {
        let mut words = adc.chunks_exact(2).map(|w| u16::from_be_bytes([w[0], w[1]]));
        match self.generation {
            Generation::First => words.next_back().map_or(RMOX_MIN_OHM, |w| rmox_from_adc(info, w)),
            Generation::Second => {
                let (sum, count) = words.fold((0.0f32, 0u32), |(sum, count), w| {
                    (sum + logf(rmox_from_adc(info, w)), count + 1)
                });
                expf(sum / count.max(1) as f32)
            }
        }
    }
}

impl IaqAlgorithm for GasIndexIaq {
    fn calc(&mut self, info: &SensorInfo, adc: &[u8]) -> Result<IaqResults, IaqError> {
        if adc.is_empty() || adc.len() % 2 != 0 {
            return Err(IaqError::InvalidAdc);
        }

        let rmox_ohm = self.rmox(info, adc);
        let gas_index = self.tracker.process(raw_signal(rmox_ohm));
        self.samples = self.samples.saturating_add(1);

        if self.samples <= self.generation.stabilization_samples() || gas_index <= 0 {
            return Err(IaqError::Stabilizing);
        }
        Ok(results_from_index(rmox_ohm, gas_index))
    }

    fn reset(&mut self) {
        *self = Self::new(self.generation, self.sample_period_s);
    }
}
