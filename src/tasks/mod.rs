//! Firmware tasks and the concrete types they run on.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use esp_hal::delay::Delay;
use esp_hal::gpio::{Flex, Output};
use esp_hal::rmt::Channel as RmtChannel;
use esp_hal::Blocking;

use crate::config::RECORD_QUEUE_DEPTH;
use crate::hal::{RegisterBus, SharedI2c, SoftI2c, WakeRegisterBus};
use crate::led::Led;
use crate::scheduler::Station;
use crate::sensors::ccs811::Ccs811;
use crate::sensors::scd30::Scd30;
use crate::sensors::zmod4xxx::iaq::GasIndexIaq;
use crate::sensors::zmod4xxx::GasChannel;
use crate::telemetry::Record;

pub mod measurement;
pub mod network;
pub mod uplink;

pub type Bus = SoftI2c<Flex<'static>, Output<'static>, Delay>;
pub type BusMutex = Mutex<NoopRawMutex, RefCell<Bus>>;
pub type BusHandle = SharedI2c<'static, NoopRawMutex, Bus>;

pub type Co2Sensor = Scd30<BusHandle, Delay>;
pub type GasSensor = GasChannel<RegisterBus<BusHandle, Delay>, GasIndexIaq>;
pub type VocSensor = Ccs811<WakeRegisterBus<BusHandle, Delay, Output<'static>>>;
pub type StatusLed = Led<RmtChannel<Blocking, 0>>;

pub type AirStation = Station<Co2Sensor, GasSensor, VocSensor, StatusLed>;

/// Records handed from the measurement task to the uplink task.
pub static RECORD_CHANNEL: Channel<CriticalSectionRawMutex, Record, RECORD_QUEUE_DEPTH> =
    Channel::new();
