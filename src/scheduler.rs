//! Measurement cycles.
//!
//! Every sensor is polled on its own period and a flush job periodically
//! turns the readings that are valid at that instant into a record. The
//! scheduler never sleeps: the caller hands it a [`Clock`] and waits for
//! [`Scheduler::next_deadline`] in between.

use embassy_time::{Duration, Instant};
use heapless::Vec;

use crate::config;
use crate::led::StatusIndicator;
use crate::sensors::ccs811::AlgorithmResult;
use crate::sensors::scd30::Measurement;
use crate::sensors::zmod4xxx::iaq::IaqResults;
use crate::sensors::zmod4xxx::GasReading;
use crate::sensors::{InitError, Sensor, SensorStatus};
use crate::telemetry::{self, Readings, RecordSink};

pub const JOB_COUNT: usize = 5;

pub trait Clock {
    fn now(&self) -> Instant;
}

/// The embassy time driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock stopped at this instant.
impl Clock for Instant {
    fn now(&self) -> Instant {
        *self
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Job {
    Co2,
    Gas,
    Voc,
    Flush,
    StatusLed,
}

impl Job {
    pub const ALL: [Job; JOB_COUNT] = [Job::Co2, Job::Gas, Job::Voc, Job::Flush, Job::StatusLed];

    const fn index(self) -> usize {
        self as usize
    }

    /// How the job is armed again once it has fired.
    pub const fn rearm(self) -> Rearm {
        match self {
            // The gas cycle blocks for a variable time and is rearmed once it
            // is done.
            Job::Gas => Rearm::OneShot,
            _ => Rearm::Periodic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rearm {
    /// Next deadline is one period after the previous one.
    Periodic,
    /// Disarmed when it fires; the job arms itself after completion.
    OneShot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub co2: Duration,
    pub gas: Duration,
    pub voc: Duration,
    pub flush: Duration,
    pub status_led: Duration,
}

impl Schedule {
    pub fn period(&self, job: Job) -> Duration {
        match job {
            Job::Co2 => self.co2,
            Job::Gas => self.gas,
            Job::Voc => self.voc,
            Job::Flush => self.flush,
            Job::StatusLed => self.status_led,
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            co2: Duration::from_millis(config::SCD30_READ_INTERVAL_MS),
            gas: Duration::from_millis(config::ZMOD_READ_INTERVAL_MS),
            voc: Duration::from_millis(config::CCS811_READ_INTERVAL_MS),
            flush: Duration::from_millis(config::SERVER_WRITE_INTERVAL_MS),
            status_led: Duration::from_millis(config::STATUS_LED_INTERVAL_MS),
        }
    }
}

/// The devices the scheduler polls, all started.
pub struct Station<C, G, V, L> {
    pub co2: C,
    pub gas: G,
    pub voc: V,
    pub led: L,
}

impl<C, G, V, L> Station<C, G, V, L>
where
    C: Sensor<Reading = Measurement>,
    G: Sensor<Reading = GasReading>,
    V: Sensor<Reading = AlgorithmResult>,
    L: StatusIndicator,
{
    /// Starts every sensor in turn. The first failure aborts the bring-up,
    /// leaves the remaining sensors untouched and puts `led` in its fault
    /// state.
    pub fn bring_up(mut co2: C, mut gas: G, mut voc: V, mut led: L) -> Result<Self, InitError> {
        if let Err(e) = Self::start_all(&mut co2, &mut gas, &mut voc) {
            led.fault();
            return Err(e);
        }
        Ok(Self { co2, gas, voc, led })
    }

    fn start_all(co2: &mut C, gas: &mut G, voc: &mut V) -> Result<(), InitError> {
        co2.start().inspect_err(|e| error!("scd30 start failed: {:?}", e))?;
        info!("scd30 started");
        gas.start().inspect_err(|e| error!("zmod4xxx start failed: {:?}", e))?;
        info!("zmod4xxx started");
        voc.start().inspect_err(|e| error!("ccs811 start failed: {:?}", e))?;
        info!("ccs811 started");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlushOutcome {
    Queued,
    /// Network down, nothing serialized.
    Offline,
    NothingValid,
    /// The sink had no room and the record was dropped.
    QueueFull,
    Overflow,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    period: Duration,
    due: Option<Instant>,
}

/// Per-job deadlines plus the latest reading of every sensor.
pub struct Scheduler {
    deadlines: [Deadline; JOB_COUNT],
    readings: Readings,
}

impl Scheduler {
    /// Arms every job one period after `now`.
    pub fn new(schedule: &Schedule, now: Instant) -> Self {
        let deadlines = Job::ALL.map(|job| {
            let period = schedule.period(job);
            Deadline { period, due: Some(now + period) }
        });
        Self { deadlines, readings: Readings::default() }
    }

    pub fn readings(&self) -> &Readings {
        &self.readings
    }

    pub fn due(&self, job: Job) -> Option<Instant> {
        self.deadlines[job.index()].due
    }

    /// Earliest armed deadline, `None` when every job is disarmed.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.iter().filter_map(|d| d.due).min()
    }

    pub fn arm(&mut self, job: Job, at: Instant) {
        self.deadlines[job.index()].due = Some(at);
    }

    pub fn disarm(&mut self, job: Job) {
        self.deadlines[job.index()].due = None;
    }

    /// Runs every job whose deadline is at or before the clock's current
    /// time, earliest deadline first, each at most once. Returns how many
    /// jobs ran.
    pub fn run_due<K, C, G, V, L, S>(
        &mut self,
        clock: K,
        station: &mut Station<C, G, V, L>,
        sink: &mut S,
        network_up: bool,
    ) -> usize
    where
        K: Clock,
        C: Sensor<Reading = Measurement>,
        G: Sensor<Reading = GasReading>,
        V: Sensor<Reading = AlgorithmResult>,
        L: StatusIndicator,
        S: RecordSink,
    {
        let now = clock.now();
        let mut due: Vec<(Instant, Job), JOB_COUNT> = Vec::new();
        for job in Job::ALL {
            if let Some(at) = self.due(job).filter(|&at| at <= now) {
                // One entry per job, cannot exceed the capacity.
                let _ = due.push((at, job));
            }
        }
        due.sort_unstable();

        for &(at, job) in due.iter() {
            self.rearm(job, at, now);
            self.fire(job, &clock, station, sink, network_up);
        }
        due.len()
    }

    fn rearm(&mut self, job: Job, at: Instant, now: Instant) {
        let deadline = &mut self.deadlines[job.index()];
        deadline.due = match job.rearm() {
            Rearm::OneShot => None,
            Rearm::Periodic => {
                let next = at + deadline.period;
                // Skip missed periods instead of firing a burst.
                Some(if next <= now { now + deadline.period } else { next })
            }
        };
    }

    fn fire<K, C, G, V, L, S>(
        &mut self,
        job: Job,
        clock: &K,
        station: &mut Station<C, G, V, L>,
        sink: &mut S,
        network_up: bool,
    ) where
        K: Clock,
        C: Sensor<Reading = Measurement>,
        G: Sensor<Reading = GasReading>,
        V: Sensor<Reading = AlgorithmResult>,
        L: StatusIndicator,
        S: RecordSink,
    {
        match job {
            Job::Co2 => {
                let outcome = station.co2.read();
                match &outcome {
                    Ok(m) => {
                        debug!(
                            "scd30: co2={} ppm t={} C rh={} %",
                            m.co2_ppm, m.temperature_c, m.humidity_pct
                        );
                        station.voc.compensate(m.temperature_c, m.humidity_pct);
                    }
                    Err(status) => info!("scd30: no reading ({:?})", status),
                }
                self.readings.co2.record(outcome);
            }
            Job::Gas => {
                self.poll_gas(&mut station.gas);
                // A cycle can outlast its period, so count from its end.
                let period = self.deadlines[Job::Gas.index()].period;
                self.arm(Job::Gas, clock.now() + period);
            }
            Job::Voc => {
                let outcome = station.voc.read();
                match &outcome {
                    Ok(r) => debug!("ccs811: eco2={} ppm tvoc={} ppb", r.eco2_ppm, r.tvoc_ppb),
                    Err(status) => info!("ccs811: no reading ({:?})", status),
                }
                self.readings.voc.record(outcome);
            }
            Job::Flush => {
                self.flush(sink, network_up);
            }
            Job::StatusLed => station.led.toggle(),
        }
    }

    fn poll_gas<G: Sensor<Reading = GasReading>>(&mut self, gas: &mut G) {
        match gas.read() {
            Ok(cycle) => {
                log_iaq("production", &cycle.production);
                self.readings.gas.record(cycle.production);
                for (slot, test) in self.readings.gas_test.iter_mut().zip(cycle.test) {
                    if let Some(outcome) = test {
                        log_iaq("test", &outcome);
                        slot.record(outcome);
                    }
                }
            }
            Err(status) => {
                info!("zmod4xxx: cycle failed ({:?})", status);
                self.readings.gas.record(Err(status));
                for slot in self.readings.gas_test.iter_mut() {
                    slot.record(Err(status));
                }
            }
        }
    }

    /// Serializes the readings valid right now and hands the record to
    /// `sink`. Skipped while the network is down; readings stay for the next
    /// flush.
    pub fn flush<S: RecordSink>(&mut self, sink: &mut S, network_up: bool) -> FlushOutcome {
        if !network_up {
            info!("flush: network down, skipping");
            return FlushOutcome::Offline;
        }

        let snapshot = self.readings;
        match telemetry::serialize(&snapshot) {
            Ok(Some(record)) => {
                let len = record.len();
                match sink.submit(record) {
                    Ok(()) => {
                        debug!("flush: {} sensors, {} bytes queued", snapshot.valid_count(), len);
                        FlushOutcome::Queued
                    }
                    Err(_) => {
                        warn!("flush: uplink queue full, record dropped");
                        FlushOutcome::QueueFull
                    }
                }
            }
            Ok(None) => {
                info!("flush: no valid readings");
                FlushOutcome::NothingValid
            }
            Err(e) => {
                error!("flush: {:?}", e);
                FlushOutcome::Overflow
            }
        }
    }
}

fn log_iaq(handle: &str, outcome: &Result<IaqResults, SensorStatus>) {
    match outcome {
        Ok(r) => debug!("zmod4xxx {}: iaq={} gas_index={}", handle, r.iaq, r.gas_index),
        Err(status) => info!("zmod4xxx {}: no reading ({:?})", handle, status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::ccs811::{Ccs811Error, ErrorId, RawData, Status};
    use crate::sensors::scd30::Scd30Error;
    use crate::sensors::zmod4xxx::{ZmodError, MAX_TEST_CHANNELS};
    use crate::telemetry::Record;
    use core::cell::Cell;
    use std::collections::VecDeque;

    struct Scripted<T> {
        outcomes: VecDeque<Result<T, SensorStatus>>,
        start: Result<(), InitError>,
        started: bool,
        polls: usize,
        compensations: std::vec::Vec<(f32, f32)>,
    }

    impl<T> Scripted<T> {
        fn new(outcomes: impl IntoIterator<Item = Result<T, SensorStatus>>) -> Self {
            Self {
                outcomes: outcomes.into_iter().collect(),
                start: Ok(()),
                started: false,
                polls: 0,
                compensations: vec![],
            }
        }

        fn failing(e: InitError) -> Self {
            Self { start: Err(e), ..Self::new([]) }
        }
    }

    impl<T: Copy> Sensor for Scripted<T> {
        type Reading = T;

        fn start(&mut self) -> Result<(), InitError> {
            self.started = true;
            self.start
        }

        fn read(&mut self) -> Result<T, SensorStatus> {
            self.polls += 1;
            self.outcomes.pop_front().unwrap_or(Err(SensorStatus::NotReady))
        }

        fn compensate(&mut self, temperature_c: f32, humidity_pct: f32) {
            self.compensations.push((temperature_c, humidity_pct));
        }
    }

    #[derive(Default)]
    struct CountingLed {
        toggles: u32,
        faults: u32,
    }

    impl StatusIndicator for CountingLed {
        fn toggle(&mut self) {
            self.toggles += 1;
        }

        fn fault(&mut self) {
            self.faults += 1;
        }
    }

    #[derive(Default)]
    struct Collected(std::vec::Vec<Record>);

    impl RecordSink for Collected {
        fn submit(&mut self, record: Record) -> Result<(), Record> {
            self.0.push(record);
            Ok(())
        }
    }

    type TestStation = Station<
        Scripted<Measurement>,
        Scripted<GasReading>,
        Scripted<AlgorithmResult>,
        CountingLed,
    >;

    fn measurement() -> Measurement {
        Measurement { co2_ppm: 800.0, temperature_c: 22.5, humidity_pct: 45.0 }
    }

    fn iaq(index: i32) -> IaqResults {
        IaqResults {
            rmox_ohm: 1e5,
            gas_index: index,
            iaq: 1.5,
            tvoc_mg_m3: 0.5,
            etoh_ppm: 0.3,
            eco2_ppm: 600.0,
        }
    }

    fn voc() -> AlgorithmResult {
        AlgorithmResult {
            eco2_ppm: 500,
            tvoc_ppb: 20,
            status: Status(0x98),
            error_id: ErrorId(0),
            raw: RawData(0),
        }
    }

    fn station(
        co2: impl IntoIterator<Item = Result<Measurement, SensorStatus>>,
        gas: impl IntoIterator<Item = Result<GasReading, SensorStatus>>,
        voc: impl IntoIterator<Item = Result<AlgorithmResult, SensorStatus>>,
    ) -> TestStation {
        Station::bring_up(Scripted::new(co2), Scripted::new(gas), Scripted::new(voc), CountingLed::default())
            .unwrap()
    }

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    /// Scheduler with every job disarmed.
    fn idle() -> Scheduler {
        let mut scheduler = Scheduler::new(&Schedule::default(), at(0));
        for job in Job::ALL {
            scheduler.disarm(job);
        }
        scheduler
    }

    #[test]
    fn bring_up_stops_at_first_failure() {
        let co2 = Scripted::<Measurement>::failing(InitError::Co2(Scd30Error::Crc));
        let result = Station::bring_up(co2, Scripted::new([]), Scripted::new([]), CountingLed::default());
        assert!(matches!(result, Err(InitError::Co2(Scd30Error::Crc))));

        let gas = Scripted::<GasReading>::failing(InitError::Gas(ZmodError::Timeout));
        let result = Station::bring_up(Scripted::new([]), gas, Scripted::new([]), CountingLed::default());
        assert!(matches!(result, Err(InitError::Gas(ZmodError::Timeout))));
    }

    #[test]
    fn failed_bring_up_shows_fault() {
        let mut led = CountingLed::default();
        let voc = Scripted::<AlgorithmResult>::failing(InitError::Voc(Ccs811Error::InvalidSensor(0x00)));
        assert!(Station::bring_up(Scripted::new([]), Scripted::new([]), voc, &mut led).is_err());
        assert_eq!((led.faults, led.toggles), (1, 0));

        let mut led = CountingLed::default();
        assert!(Station::bring_up(
            Scripted::<Measurement>::new([]),
            Scripted::<GasReading>::new([]),
            Scripted::<AlgorithmResult>::new([]),
            &mut led
        )
        .is_ok());
        assert_eq!(led.faults, 0);
    }

    #[test]
    fn bring_up_starts_everything() {
        let station = station([], [], []);
        assert!(station.co2.started && station.gas.started && station.voc.started);
    }

    #[test]
    fn new_arms_every_job_one_period_out() {
        let schedule = Schedule::default();
        let scheduler = Scheduler::new(&schedule, at(1000));
        assert_eq!(scheduler.due(Job::Co2), Some(at(1000 + config::SCD30_READ_INTERVAL_MS)));
        assert_eq!(scheduler.due(Job::Flush), Some(at(1000 + config::SERVER_WRITE_INTERVAL_MS)));
        assert_eq!(scheduler.next_deadline(), Some(at(1000 + config::ZMOD_READ_INTERVAL_MS)));
    }

    #[test]
    fn validity_is_all_or_nothing_per_poll() {
        let mut station = station([Ok(measurement()), Err(SensorStatus::ReadError)], [], []);
        let mut scheduler = idle();
        let mut sink = Collected::default();

        scheduler.arm(Job::Co2, at(100));
        assert_eq!(scheduler.run_due(at(100), &mut station, &mut sink, true), 1);
        assert_eq!(scheduler.readings().co2.current(), Some(&measurement()));

        scheduler.arm(Job::Co2, at(200));
        scheduler.run_due(at(200), &mut station, &mut sink, true);
        assert_eq!(scheduler.readings().co2.current(), None);
        assert_eq!(scheduler.readings().co2.last_status(), Some(SensorStatus::ReadError));
    }

    #[test]
    fn flush_sees_only_polls_completed_before_it() {
        let mut station = station([Ok(measurement())], [], [Ok(voc())]);
        let mut scheduler = idle();
        let mut sink = Collected::default();

        scheduler.arm(Job::Voc, at(50));
        scheduler.run_due(at(50), &mut station, &mut sink, true);

        // Flush is due first, the CO2 poll in the same tick runs after it.
        scheduler.disarm(Job::Voc);
        scheduler.arm(Job::Flush, at(90));
        scheduler.arm(Job::Co2, at(100));
        assert_eq!(scheduler.run_due(at(100), &mut station, &mut sink, true), 2);

        assert_eq!(sink.0.len(), 1);
        assert!(sink.0[0].starts_with("ccs811 "));
        assert!(!sink.0[0].contains("scd30"));
        assert!(scheduler.readings().co2.is_valid());

        scheduler.arm(Job::Flush, at(200));
        scheduler.run_due(at(200), &mut station, &mut sink, true);
        assert!(sink.0[1].starts_with("scd30 "));
        assert!(sink.0[1].contains("\nccs811 "));
    }

    #[test]
    fn flush_skipped_while_offline() {
        let mut station = station([Ok(measurement())], [], []);
        let mut scheduler = idle();
        let mut sink = Collected::default();

        scheduler.arm(Job::Co2, at(10));
        scheduler.run_due(at(10), &mut station, &mut sink, false);
        assert_eq!(scheduler.flush(&mut sink, false), FlushOutcome::Offline);
        assert!(sink.0.is_empty());

        assert_eq!(scheduler.flush(&mut sink, true), FlushOutcome::Queued);
        assert!(sink.0[0].starts_with("scd30 co2=800.00"));
    }

    #[test]
    fn nothing_valid_means_nothing_sent() {
        let mut scheduler = idle();
        let mut sink = Collected::default();
        assert_eq!(scheduler.flush(&mut sink, true), FlushOutcome::NothingValid);
        assert!(sink.0.is_empty());
    }

    #[test]
    fn full_queue_drops_record() {
        let mut station = station([Ok(measurement())], [], []);
        let mut scheduler = idle();
        let mut queue: heapless::Deque<Record, 1> = heapless::Deque::new();

        scheduler.arm(Job::Co2, at(10));
        scheduler.run_due(at(10), &mut station, &mut queue, true);
        assert_eq!(scheduler.flush(&mut queue, true), FlushOutcome::Queued);
        assert_eq!(scheduler.flush(&mut queue, true), FlushOutcome::QueueFull);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn gas_cycle_rearms_after_completion() {
        let reading = GasReading {
            production: Ok(iaq(40)),
            test: [Some(Err(SensorStatus::Stabilizing)), None],
        };
        let mut station = station([], [Ok(reading), Err(SensorStatus::Timeout)], []);
        let mut scheduler = idle();
        let mut sink = Collected::default();
        let period = Duration::from_millis(config::ZMOD_READ_INTERVAL_MS);

        scheduler.arm(Job::Gas, at(1000));
        scheduler.run_due(at(1500), &mut station, &mut sink, true);
        assert_eq!(scheduler.due(Job::Gas), Some(at(1500) + period));
        assert_eq!(scheduler.readings().gas.current(), Some(&iaq(40)));
        assert_eq!(
            scheduler.readings().gas_test[0].last_status(),
            Some(SensorStatus::Stabilizing)
        );

        scheduler.run_due(at(1500) + period, &mut station, &mut sink, true);
        assert!(!scheduler.readings().gas.is_valid());
        assert!(scheduler.readings().gas_test.iter().all(|slot| !slot.is_valid()));
        assert_eq!(station.gas.polls, 2);
        assert_eq!(scheduler.readings().gas_test.len(), MAX_TEST_CHANNELS);
    }

    /// Test clock moved by hand, or by a sensor that takes time.
    struct ManualClock(Cell<Instant>);

    impl ManualClock {
        fn advance(&self, by: Duration) {
            self.0.set(self.0.get() + by);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.0.get()
        }
    }

    /// Gas channel whose cycle blocks for `cycle`.
    struct SlowGas<'a> {
        clock: &'a ManualClock,
        cycle: Duration,
        polls: usize,
    }

    impl Sensor for SlowGas<'_> {
        type Reading = GasReading;

        fn start(&mut self) -> Result<(), InitError> {
            Ok(())
        }

        fn read(&mut self) -> Result<GasReading, SensorStatus> {
            self.polls += 1;
            self.clock.advance(self.cycle);
            Ok(GasReading { production: Ok(iaq(40)), test: [None; MAX_TEST_CHANNELS] })
        }
    }

    #[test]
    fn slow_gas_cycle_rearms_from_its_end() {
        let clock = ManualClock(Cell::new(at(1000)));
        let period = Duration::from_millis(config::ZMOD_READ_INTERVAL_MS);
        let cycle = period + Duration::from_millis(1000);
        let mut station = Station {
            co2: Scripted::<Measurement>::new([]),
            gas: SlowGas { clock: &clock, cycle, polls: 0 },
            voc: Scripted::<AlgorithmResult>::new([]),
            led: CountingLed::default(),
        };
        let mut scheduler = idle();
        let mut sink = Collected::default();

        scheduler.arm(Job::Gas, at(1000));
        assert_eq!(scheduler.run_due(&clock, &mut station, &mut sink, true), 1);
        let finished = at(1000) + cycle;
        assert_eq!(clock.now(), finished);
        assert_eq!(scheduler.due(Job::Gas), Some(finished + period));

        // Nothing is due right after the cycle returns.
        assert_eq!(scheduler.run_due(&clock, &mut station, &mut sink, true), 0);
        assert_eq!(station.gas.polls, 1);

        clock.advance(period);
        assert_eq!(scheduler.run_due(&clock, &mut station, &mut sink, true), 1);
        assert_eq!(station.gas.polls, 2);
    }

    #[test]
    fn system_clock_follows_the_time_driver() {
        let before = SystemClock.now();
        embassy_futures::block_on(embassy_time::Timer::after_millis(5));
        assert!(SystemClock.now() >= before + Duration::from_millis(5));
    }

    #[test]
    fn periodic_jobs_skip_missed_periods() {
        let mut station = station([], [], []);
        let mut scheduler = idle();
        let mut sink = Collected::default();
        let period = Duration::from_millis(config::SCD30_READ_INTERVAL_MS);

        scheduler.arm(Job::Co2, at(100));
        scheduler.run_due(at(150), &mut station, &mut sink, true);
        assert_eq!(scheduler.due(Job::Co2), Some(at(100) + period));

        scheduler.run_due(at(100) + period * 3, &mut station, &mut sink, true);
        assert_eq!(scheduler.due(Job::Co2), Some(at(100) + period * 4));
        assert_eq!(station.co2.polls, 2);
    }

    #[test]
    fn valid_co2_compensates_voc() {
        let mut station = station([Err(SensorStatus::NotReady), Ok(measurement())], [], []);
        let mut scheduler = idle();
        let mut sink = Collected::default();

        scheduler.arm(Job::Co2, at(1));
        scheduler.run_due(at(1), &mut station, &mut sink, true);
        assert!(station.voc.compensations.is_empty());

        scheduler.arm(Job::Co2, at(2));
        scheduler.run_due(at(2), &mut station, &mut sink, true);
        assert_eq!(station.voc.compensations, [(22.5, 45.0)]);
    }

    #[test]
    fn status_led_toggles_each_period() {
        let mut station = station([], [], []);
        let mut scheduler = idle();
        let mut sink = Collected::default();
        let period = Duration::from_millis(config::STATUS_LED_INTERVAL_MS);

        scheduler.arm(Job::StatusLed, at(0) + period);
        for tick in 1..=3 {
            scheduler.run_due(at(0) + period * tick, &mut station, &mut sink, false);
        }
        assert_eq!(station.led.toggles, 3);
        assert_eq!(station.led.faults, 0);
    }

    #[test]
    fn nothing_runs_before_its_deadline() {
        let mut station = station([Ok(measurement())], [], []);
        let mut scheduler = idle();
        let mut sink = Collected::default();

        scheduler.arm(Job::Co2, at(500));
        assert_eq!(scheduler.run_due(at(499), &mut station, &mut sink, true), 0);
        assert_eq!(station.co2.polls, 0);
        assert_eq!(scheduler.next_deadline(), Some(at(500)));
    }
}
