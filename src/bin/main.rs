#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use core::cell::RefCell;

use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_net::{DhcpConfig, StackResources};
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{DriveMode, Flex, Level, Output, OutputConfig, Pull};
use esp_hal::rmt::Rmt;
use esp_hal::rng::Rng;
use esp_hal::time::Rate;
use esp_hal::timer::systimer::SystemTimer;
use esp_hal::timer::timg::TimerGroup;
use esp_wifi::EspWifiController;
use panic_rtt_target as _;
use static_cell::StaticCell;

use esp_air_logger::config;
use esp_air_logger::hal::{RegisterBus, SharedI2c, SoftI2c, WakeRegisterBus};
use esp_air_logger::led::{Led, StatusIndicator};
use esp_air_logger::scheduler::Station;
use esp_air_logger::sensors::ccs811::Ccs811;
use esp_air_logger::sensors::scd30::Scd30;
use esp_air_logger::sensors::zmod4xxx::iaq::{GasIndexIaq, Generation};
use esp_air_logger::sensors::zmod4xxx::{GasChannel, Zmod4xxx};
use esp_air_logger::tasks::{measurement, network, uplink, BusMutex, RECORD_CHANNEL};

extern crate alloc;

static I2C_BUS_CELL: StaticCell<BusMutex> = StaticCell::new();
static WIFI_INIT_CELL: StaticCell<EspWifiController<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Never enter the measurement cycles with hardware that did not come up.
async fn halt() -> ! {
    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    rtt_target::rtt_init_defmt!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 72 * 1024);

    let timer0 = SystemTimer::new(peripherals.SYSTIMER);
    esp_hal_embassy::init(timer0.alarm0);

    info!("Embassy initialized!");

    let rmt = match Rmt::new(peripherals.RMT, Rate::from_mhz(80)) {
        Ok(rmt) => rmt,
        Err(_) => {
            error!("RMT initialization failed");
            halt().await
        }
    };
    let mut led = Led::new_ws2812(rmt.channel0, peripherals.GPIO8);

    // Bit-banged bus on GPIO4 (SDA) and GPIO5 (SCL), both open-drain with pull-ups
    let open_drain = OutputConfig::default()
        .with_drive_mode(DriveMode::OpenDrain)
        .with_pull(Pull::Up);
    let mut sda = Flex::new(peripherals.GPIO4);
    sda.apply_output_config(&open_drain);
    sda.set_input_enable(true);
    sda.set_output_enable(true);
    let scl = Output::new(peripherals.GPIO5, Level::High, open_drain);

    let delay = Delay::new();
    let mut soft_i2c =
        SoftI2c::new(sda, scl, delay).with_half_period_us(config::I2C_HALF_PERIOD_US);
    if let Err(e) = soft_i2c.init() {
        error!("I2C bus stuck: {:?}", e);
        error!("Check connections: SDA=GPIO4, SCL=GPIO5, VCC=3.3V, GND=GND");
        led.fault();
        halt().await;
    }
    let bus: &'static BusMutex = I2C_BUS_CELL.init(Mutex::new(RefCell::new(soft_i2c)));

    let co2 = Scd30::new(SharedI2c::new(bus), delay)
        .with_measurement_interval(config::SCD30_MEASUREMENT_INTERVAL_S)
        .with_ambient_pressure(config::SCD30_AMBIENT_PRESSURE_MBAR);

    let zmod = Zmod4xxx::new(RegisterBus::new(SharedI2c::new(bus), delay), config::GAS_PROFILE)
        .with_max_polls(config::GAS_MAX_POLLS);
    let sample_period_s = config::GAS_PROFILE.sample_period_s;
    let mut gas = GasChannel::new(zmod, GasIndexIaq::new(Generation::First, sample_period_s));
    for _ in 0..config::GAS_TEST_CHANNELS {
        if gas
            .add_test_channel(GasIndexIaq::new(Generation::Second, sample_period_s))
            .is_err()
        {
            warn!("No room for another IAQ test handle");
        }
    }

    // CCS811 nWAKE on GPIO13, released (high) between accesses
    let wake = Output::new(peripherals.GPIO13, Level::High, OutputConfig::default());
    let voc = Ccs811::new(
        WakeRegisterBus::new(SharedI2c::new(bus), delay, wake),
        config::CCS811_ADDR,
    );

    // The LED is left in its fault state on failure.
    let station = match Station::bring_up(co2, gas, voc, led) {
        Ok(station) => station,
        Err(e) => {
            error!("Sensor bring-up failed: {:?}, halting", e);
            halt().await
        }
    };
    info!("All sensors up");

    // Initialize WiFi
    let mut rng = Rng::new(peripherals.RNG);
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    let timer1 = TimerGroup::new(peripherals.TIMG0);
    let wifi_init = esp_wifi::init(timer1.timer0, rng, peripherals.RADIO_CLK)
        .expect("Failed to initialize WIFI controller");
    let wifi_init = WIFI_INIT_CELL.init(wifi_init);
    let (controller, interfaces) = esp_wifi::wifi::new(wifi_init, peripherals.WIFI)
        .expect("Failed to create WIFI interface");

    let mut dhcp = DhcpConfig::default();
    dhcp.hostname = heapless::String::try_from(config::HOSTNAME).ok();
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(dhcp),
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );

    spawner.spawn(network::connection_task(controller)).unwrap();
    spawner.spawn(network::net_task(runner)).unwrap();
    spawner.spawn(uplink::uplink_task(stack, RECORD_CHANNEL.receiver())).unwrap();
    spawner
        .spawn(measurement::measurement_task(station, stack, RECORD_CHANNEL.sender()))
        .unwrap();

    // Nothing else to do here; park the main task.
    halt().await
}
