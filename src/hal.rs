//! Bus plumbing shared by the sensor drivers.
//!
//! The sensors sit on a bit-banged two-wire bus driven from plain GPIOs.
//! [`SoftI2c`] implements the `embedded-hal` 1.0 [`I2c`] trait on top of
//! those pins, so every driver is written against the standard trait and can
//! be exercised against `embedded-hal-mock` on the host.

use core::cell::RefCell;
use core::convert::Infallible;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

/// Half of one SCL period. 5 us gives roughly 100 kHz.
pub const DEFAULT_HALF_PERIOD_US: u32 = 5;

/// Clock pulses used to free a slave that is holding SDA low.
const RECOVERY_CLOCKS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Write = 0,
    Read = 1,
}

impl Direction {
    /// 7-bit address shifted left with the direction in bit 0.
    pub const fn address_byte(self, address: u8) -> u8 {
        (address << 1) | self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SoftI2cError {
    /// Nobody acknowledged the address byte.
    AddressNack,
    /// A data byte (register pointer included) was not acknowledged.
    DataNack,
    /// A GPIO operation failed.
    Pin,
    /// SDA stayed low after the recovery clocks.
    BusStuck,
}

impl i2c::Error for SoftI2cError {
    fn kind(&self) -> ErrorKind {
        match self {
            SoftI2cError::AddressNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            SoftI2cError::DataNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            SoftI2cError::BusStuck => ErrorKind::Bus,
            SoftI2cError::Pin => ErrorKind::Other,
        }
    }
}

/// Bit-banged I2C master.
///
/// `sda` must be configured open-drain with a pull-up so that driving it
/// high releases the line and `is_high` reads the wire. `scl` is driven by
/// the master only (no clock stretching).
pub struct SoftI2c<SDA, SCL, D> {
    sda: SDA,
    scl: SCL,
    delay: D,
    half_period_us: u32,
    started: bool,
}

impl<SDA, SCL, D> SoftI2c<SDA, SCL, D>
where
    SDA: InputPin + OutputPin,
    SCL: OutputPin,
    D: DelayNs,
{
    pub fn new(sda: SDA, scl: SCL, delay: D) -> Self {
        Self {
            sda,
            scl,
            delay,
            half_period_us: DEFAULT_HALF_PERIOD_US,
            started: false,
        }
    }

    pub fn with_half_period_us(mut self, half_period_us: u32) -> Self {
        self.half_period_us = half_period_us;
        self
    }

    /// Releases both lines and clears a stuck bus, if any.
    pub fn init(&mut self) -> Result<(), SoftI2cError> {
        self.release()?;
        self.recover()
    }

    /// START (or repeated START when a transfer is already open), then the
    /// address byte.
    pub fn begin(&mut self, address: u8, direction: Direction) -> Result<(), SoftI2cError> {
        self.sda_high()?;
        self.wait();
        self.scl_high()?;
        self.wait();
        self.sda_low()?;
        self.wait();
        self.scl_low()?;
        self.wait();
        self.started = true;

        if self.shift_out(direction.address_byte(address))? {
            Ok(())
        } else {
            Err(SoftI2cError::AddressNack)
        }
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<(), SoftI2cError> {
        if self.shift_out(byte)? {
            Ok(())
        } else {
            Err(SoftI2cError::DataNack)
        }
    }

    /// Clocks in `buf.len()` bytes, acknowledging each one except the last
    /// when `nack_last` is set.
    pub fn read_bytes(&mut self, buf: &mut [u8], nack_last: bool) -> Result<(), SoftI2cError> {
        let last = buf.len().saturating_sub(1);
        for (index, byte) in buf.iter_mut().enumerate() {
            *byte = self.shift_in()?;
            self.send_ack(!(nack_last && index == last))?;
        }
        Ok(())
    }

    /// STOP: SDA rises while SCL is high. No-op when no transfer is open.
    pub fn stop(&mut self) -> Result<(), SoftI2cError> {
        if !self.started {
            return Ok(());
        }
        self.started = false;
        self.scl_low()?;
        self.sda_low()?;
        self.wait();
        self.scl_high()?;
        self.wait();
        self.sda_high()?;
        self.wait();
        Ok(())
    }

    /// Clocks SCL until the slave lets go of SDA, then closes with a STOP.
    pub fn recover(&mut self) -> Result<(), SoftI2cError> {
        self.sda_high()?;
        for _ in 0..RECOVERY_CLOCKS {
            if self.sda_is_high()? {
                break;
            }
            self.scl_low()?;
            self.wait();
            self.scl_high()?;
            self.wait();
        }
        if !self.sda_is_high()? {
            warn!("i2c: SDA held low after recovery clocks");
            return Err(SoftI2cError::BusStuck);
        }
        self.started = true;
        self.stop()
    }

    /// Lets both lines float high.
    pub fn release(&mut self) -> Result<(), SoftI2cError> {
        self.started = false;
        self.sda_high()?;
        self.scl_high()
    }

    pub fn free(self) -> (SDA, SCL, D) {
        (self.sda, self.scl, self.delay)
    }

    /// Returns `true` when the byte was acknowledged.
    fn shift_out(&mut self, byte: u8) -> Result<bool, SoftI2cError> {
        for bit in (0..8).rev() {
            if byte & (1 << bit) != 0 {
                self.sda_high()?;
            } else {
                self.sda_low()?;
            }
            self.wait();
            self.scl_high()?;
            self.wait();
            self.scl_low()?;
        }
        self.read_ack()
    }

    fn read_ack(&mut self) -> Result<bool, SoftI2cError> {
        self.sda_high()?;
        self.wait();
        self.scl_high()?;
        self.wait();
        let acked = !self.sda_is_high()?;
        self.scl_low()?;
        Ok(acked)
    }

    fn shift_in(&mut self) -> Result<u8, SoftI2cError> {
        self.sda_high()?;
        let mut byte = 0u8;
        for _ in 0..8 {
            self.wait();
            self.scl_high()?;
            self.wait();
            byte = (byte << 1) | u8::from(self.sda_is_high()?);
            self.scl_low()?;
        }
        Ok(byte)
    }

    fn send_ack(&mut self, ack: bool) -> Result<(), SoftI2cError> {
        if ack {
            self.sda_low()?;
        } else {
            self.sda_high()?;
        }
        self.wait();
        self.scl_high()?;
        self.wait();
        self.scl_low()?;
        self.sda_high()
    }

    fn run_operations(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), SoftI2cError> {
        let mut previous: Option<Direction> = None;
        for index in 0..operations.len() {
            // Consecutive reads are one burst: only the final byte is NACKed.
            let read_follows = matches!(operations.get(index + 1), Some(Operation::Read(_)));
            match &mut operations[index] {
                Operation::Write(bytes) => {
                    if previous != Some(Direction::Write) {
                        self.begin(address, Direction::Write)?;
                    }
                    for &byte in bytes.iter() {
                        self.write_byte(byte)?;
                    }
                    previous = Some(Direction::Write);
                }
                Operation::Read(buf) => {
                    if previous != Some(Direction::Read) {
                        self.begin(address, Direction::Read)?;
                    }
                    self.read_bytes(buf, !read_follows)?;
                    previous = Some(Direction::Read);
                }
            }
        }
        Ok(())
    }

    fn wait(&mut self) {
        self.delay.delay_us(self.half_period_us);
    }

    fn sda_high(&mut self) -> Result<(), SoftI2cError> {
        self.sda.set_high().map_err(|_| SoftI2cError::Pin)
    }

    fn sda_low(&mut self) -> Result<(), SoftI2cError> {
        self.sda.set_low().map_err(|_| SoftI2cError::Pin)
    }

    fn sda_is_high(&mut self) -> Result<bool, SoftI2cError> {
        self.sda.is_high().map_err(|_| SoftI2cError::Pin)
    }

    fn scl_high(&mut self) -> Result<(), SoftI2cError> {
        self.scl.set_high().map_err(|_| SoftI2cError::Pin)
    }

    fn scl_low(&mut self) -> Result<(), SoftI2cError> {
        self.scl.set_low().map_err(|_| SoftI2cError::Pin)
    }
}

impl<SDA, SCL, D> ErrorType for SoftI2c<SDA, SCL, D> {
    type Error = SoftI2cError;
}

impl<SDA, SCL, D> I2c for SoftI2c<SDA, SCL, D>
where
    SDA: InputPin + OutputPin,
    SCL: OutputPin,
    D: DelayNs,
{
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        let result = self.run_operations(address, operations);
        // A STOP goes out whatever happened after the START.
        let stopped = self.stop();
        if let Err(e) = &result {
            trace!("i2c: transaction with {:x} failed: {:?}", address, e);
        }
        result.and(stopped)
    }
}

/// One handle onto a bus shared between several drivers.
///
/// Each transaction holds the lock for its whole duration, so transfers from
/// different drivers never interleave on the wire.
pub struct SharedI2c<'a, M: RawMutex, BUS> {
    bus: &'a Mutex<M, RefCell<BUS>>,
}

impl<'a, M: RawMutex, BUS> SharedI2c<'a, M, BUS> {
    pub fn new(bus: &'a Mutex<M, RefCell<BUS>>) -> Self {
        Self { bus }
    }
}

impl<M: RawMutex, BUS> Clone for SharedI2c<'_, M, BUS> {
    fn clone(&self) -> Self {
        Self { bus: self.bus }
    }
}

impl<M: RawMutex, BUS: ErrorType> ErrorType for SharedI2c<'_, M, BUS> {
    type Error = BUS::Error;
}

impl<M: RawMutex, BUS: I2c> I2c for SharedI2c<'_, M, BUS> {
    fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        self.bus.lock(|bus| bus.borrow_mut().read(address, read))
    }

    fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        self.bus.lock(|bus| bus.borrow_mut().write(address, write))
    }

    fn write_read(&mut self, address: u8, write: &[u8], read: &mut [u8]) -> Result<(), Self::Error> {
        self.bus
            .lock(|bus| bus.borrow_mut().write_read(address, write, read))
    }

    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        self.bus
            .lock(|bus| bus.borrow_mut().transaction(address, operations))
    }
}

/// Transport-level failure reported by a register HAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Address or data byte not acknowledged.
    Nack,
    /// Any other bus or pin fault.
    Bus,
    /// Payload larger than the HAL can frame.
    TooLong,
}

pub fn bus_error<E: i2c::Error>(error: E) -> BusError {
    match error.kind() {
        ErrorKind::NoAcknowledge(_) => BusError::Nack,
        _ => BusError::Bus,
    }
}

/// Largest register payload accepted by [`RegisterHal::write`].
pub const MAX_REGISTER_WRITE: usize = 32;

/// Register-oriented access used by the Renesas/ScioSense drivers, which talk
/// in "write pointer, then read or write N bytes" terms.
pub trait RegisterHal {
    fn read(&mut self, address: u8, register: u8, data: &mut [u8]) -> Result<(), BusError>;
    fn write(&mut self, address: u8, register: u8, data: &[u8]) -> Result<(), BusError>;
    fn delay_ms(&mut self, ms: u32);
}

/// Plain register HAL: pointer write and data read are separate transfers,
/// each closed by a STOP.
pub struct RegisterBus<I, D> {
    i2c: I,
    delay: D,
}

impl<I: I2c, D: DelayNs> RegisterBus<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self { i2c, delay }
    }

    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }
}

fn write_register<I: I2c>(i2c: &mut I, address: u8, register: u8, data: &[u8]) -> Result<(), BusError> {
    if data.len() > MAX_REGISTER_WRITE {
        return Err(BusError::TooLong);
    }
    let mut frame = [0u8; MAX_REGISTER_WRITE + 1];
    frame[0] = register;
    frame[1..=data.len()].copy_from_slice(data);
    i2c.write(address, &frame[..=data.len()]).map_err(bus_error)
}

impl<I: I2c, D: DelayNs> RegisterHal for RegisterBus<I, D> {
    fn read(&mut self, address: u8, register: u8, data: &mut [u8]) -> Result<(), BusError> {
        self.i2c.write(address, &[register]).map_err(bus_error)?;
        self.i2c.read(address, data).map_err(bus_error)
    }

    fn write(&mut self, address: u8, register: u8, data: &[u8]) -> Result<(), BusError> {
        write_register(&mut self.i2c, address, register, data)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

/// nWAKE setup time before the first bus edge.
pub const WAKE_SETUP_US: u32 = 50;
/// nWAKE hold time after the last bus edge.
pub const WAKE_HOLD_US: u32 = 125;
/// Reads are split into transfers of at most this many bytes.
pub const WAKE_READ_CHUNK: usize = 2;

/// Register HAL for parts gated by an active-low wake line (CCS811 nWAKE).
///
/// The wake line is asserted around every access and released again on
/// every exit path, including bus errors.
pub struct WakeRegisterBus<I, D, W> {
    i2c: I,
    delay: D,
    wake: W,
}

impl<I: I2c, D: DelayNs, W: OutputPin> WakeRegisterBus<I, D, W> {
    pub fn new(i2c: I, delay: D, wake: W) -> Self {
        Self { i2c, delay, wake }
    }

    pub fn release(self) -> (I, D, W) {
        (self.i2c, self.delay, self.wake)
    }

    fn awake<R>(&mut self, f: impl FnOnce(&mut I) -> Result<R, BusError>) -> Result<R, BusError> {
        self.wake.set_low().map_err(|_| BusError::Bus)?;
        self.delay.delay_us(WAKE_SETUP_US);
        let result = f(&mut self.i2c);
        self.delay.delay_us(WAKE_HOLD_US);
        let released = self.wake.set_high().map_err(|_| BusError::Bus);
        result.and_then(|value| released.map(|()| value))
    }
}

impl<I: I2c, D: DelayNs, W: OutputPin> RegisterHal for WakeRegisterBus<I, D, W> {
    fn read(&mut self, address: u8, register: u8, data: &mut [u8]) -> Result<(), BusError> {
        self.awake(|i2c| {
            i2c.write(address, &[register]).map_err(bus_error)?;
            for chunk in data.chunks_mut(WAKE_READ_CHUNK) {
                i2c.read(address, chunk).map_err(bus_error)?;
            }
            Ok(())
        })
    }

    fn write(&mut self, address: u8, register: u8, data: &[u8]) -> Result<(), BusError> {
        self.awake(|i2c| write_register(i2c, address, register, data))
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

/// Stand-in for boards that tie nWAKE to ground.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWakePin;

impl digital::ErrorType for NoWakePin {
    type Error = Infallible;
}

impl OutputPin for NoWakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTransaction};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Start,
        Stop,
        /// SCL rising edge with the level the master was driving on SDA.
        Bit(bool),
    }

    /// Wire-level model of an open-drain bus. The slave's answers (ACK bits
    /// and data bits) are scripted in `slave`; an empty script reads high.
    struct Wire {
        sda: bool,
        scl: bool,
        slave: VecDeque<bool>,
        events: Vec<Event>,
    }

    impl Wire {
        fn new(slave: impl IntoIterator<Item = bool>) -> Rc<RefCell<Self>> {
            Rc::new(RefCell::new(Self {
                sda: true,
                scl: true,
                slave: slave.into_iter().collect(),
                events: Vec::new(),
            }))
        }
    }

    struct Sda(Rc<RefCell<Wire>>);
    struct Scl(Rc<RefCell<Wire>>);

    impl digital::ErrorType for Sda {
        type Error = Infallible;
    }

    impl digital::ErrorType for Scl {
        type Error = Infallible;
    }

    impl Sda {
        fn drive(&mut self, level: bool) {
            let mut wire = self.0.borrow_mut();
            if wire.scl && wire.sda != level {
                let event = if level { Event::Stop } else { Event::Start };
                wire.events.push(event);
            }
            wire.sda = level;
        }
    }

    impl OutputPin for Sda {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.drive(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.drive(true);
            Ok(())
        }
    }

    impl InputPin for Sda {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            let mut wire = self.0.borrow_mut();
            let slave = wire.slave.pop_front().unwrap_or(true);
            Ok(wire.sda && slave)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            self.is_high().map(|high| !high)
        }
    }

    impl OutputPin for Scl {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().scl = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            let mut wire = self.0.borrow_mut();
            if !wire.scl {
                let sda = wire.sda;
                wire.events.push(Event::Bit(sda));
            }
            wire.scl = true;
            Ok(())
        }
    }

    fn bus(wire: &Rc<RefCell<Wire>>) -> SoftI2c<Sda, Scl, NoopDelay> {
        SoftI2c::new(Sda(wire.clone()), Scl(wire.clone()), NoopDelay::new())
    }

    fn bits(byte: u8) -> Vec<Event> {
        (0..8).rev().map(|bit| Event::Bit(byte & (1 << bit) != 0)).collect()
    }

    fn count_bits(events: &[Event]) -> usize {
        events.iter().filter(|e| matches!(e, Event::Bit(_))).count()
    }

    #[test]
    fn address_nack_still_ends_with_stop() {
        let wire = Wire::new([true]);
        let mut i2c = bus(&wire);

        assert_eq!(i2c.write(0x61, &[0x01, 0x02]), Err(SoftI2cError::AddressNack));

        let events = &wire.borrow().events;
        assert_eq!(events.first(), Some(&Event::Start));
        assert_eq!(&events[1..9], bits(0x61 << 1).as_slice());
        // address byte, its ACK slot, and the clock edge of the STOP
        assert_eq!(count_bits(events), 10);
        assert_eq!(events.last(), Some(&Event::Stop));
    }

    #[test]
    fn register_nack_still_ends_with_stop() {
        let wire = Wire::new([false, true]);
        let mut i2c = bus(&wire);

        assert_eq!(i2c.write(0x32, &[0x94]), Err(SoftI2cError::DataNack));

        let events = &wire.borrow().events;
        assert_eq!(count_bits(events), 19);
        assert_eq!(events.last(), Some(&Event::Stop));
    }

    #[test]
    fn data_nack_still_ends_with_stop() {
        let wire = Wire::new([false, false, true]);
        let mut i2c = bus(&wire);

        assert_eq!(i2c.write(0x5A, &[0x01, 0x10, 0x20]), Err(SoftI2cError::DataNack));

        let events = &wire.borrow().events;
        assert_eq!(count_bits(events), 28);
        assert_eq!(events.iter().filter(|e| **e == Event::Stop).count(), 1);
        assert_eq!(events.last(), Some(&Event::Stop));
    }

    #[test]
    fn write_read_uses_repeated_start_and_nacks_last_byte() {
        let mut slave = vec![false, false, false];
        for byte in [0xA5u8, 0x3C] {
            slave.extend((0..8).rev().map(|bit| byte & (1 << bit) != 0));
        }
        let wire = Wire::new(slave);
        let mut i2c = bus(&wire);

        let mut buf = [0u8; 2];
        i2c.write_read(0x32, &[0x94], &mut buf).unwrap();
        assert_eq!(buf, [0xA5, 0x3C]);

        let events = &wire.borrow().events;
        let starts: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| **e == Event::Start)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(starts.len(), 2);
        assert_eq!(events.iter().filter(|e| **e == Event::Stop).count(), 1);

        let read_phase = &events[starts[1] + 1..];
        assert_eq!(&read_phase[..8], bits((0x32 << 1) | 1).as_slice());
        // address ack slot, 8 data clocks, then the master's ACK
        assert_eq!(read_phase[17], Event::Bit(false));
        assert_eq!(read_phase[26], Event::Bit(true));
        assert_eq!(events.last(), Some(&Event::Stop));
    }

    #[test]
    fn recover_clocks_until_sda_released() {
        let wire = Wire::new([false, false, true]);
        let mut i2c = bus(&wire);
        i2c.recover().unwrap();

        let events = &wire.borrow().events;
        assert_eq!(count_bits(events), 3);
        assert_eq!(events.last(), Some(&Event::Stop));
    }

    #[test]
    fn recover_reports_stuck_bus() {
        let wire = Wire::new(std::iter::repeat(false).take(16));
        let mut i2c = bus(&wire);
        assert_eq!(i2c.recover(), Err(SoftI2cError::BusStuck));
    }

    #[test]
    fn shared_handles_reach_the_same_bus() {
        let expectations = [
            I2cTransaction::write(0x61, vec![0x03, 0x00]),
            I2cTransaction::write(0x5A, vec![0xF4]),
        ];
        let bus: Mutex<NoopRawMutex, _> = Mutex::new(RefCell::new(I2cMock::new(&expectations)));
        let mut first = SharedI2c::new(&bus);
        let mut second = first.clone();

        first.write(0x61, &[0x03, 0x00]).unwrap();
        second.write(0x5A, &[0xF4]).unwrap();

        bus.lock(|b| b.borrow_mut().done());
    }

    #[test]
    fn register_write_frames_pointer_and_payload() {
        let expectations = [
            I2cTransaction::write(0x32, vec![0x40, 0x00, 0x50]),
            I2cTransaction::write(0x32, vec![0x94]),
            I2cTransaction::read(0x32, vec![0x80]),
        ];
        let mut hal = RegisterBus::new(I2cMock::new(&expectations), NoopDelay::new());

        hal.write(0x32, 0x40, &[0x00, 0x50]).unwrap();
        let mut status = [0u8; 1];
        hal.read(0x32, 0x94, &mut status).unwrap();
        assert_eq!(status, [0x80]);

        assert_eq!(hal.write(0x32, 0x40, &[0u8; 33]), Err(BusError::TooLong));

        let (mut i2c, _) = hal.release();
        i2c.done();
    }

    #[test]
    fn wake_bus_reads_in_chunks_and_releases_wake() {
        let i2c_expectations = [
            I2cTransaction::write(0x5A, vec![0x02]),
            I2cTransaction::read(0x5A, vec![0x01, 0x90]),
            I2cTransaction::read(0x5A, vec![0x00, 0x20]),
            I2cTransaction::read(0x5A, vec![0x98]),
        ];
        let pin_expectations = [
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
        ];
        let mut hal = WakeRegisterBus::new(
            I2cMock::new(&i2c_expectations),
            NoopDelay::new(),
            PinMock::new(&pin_expectations),
        );

        let mut data = [0u8; 5];
        hal.read(0x5A, 0x02, &mut data).unwrap();
        assert_eq!(data, [0x01, 0x90, 0x00, 0x20, 0x98]);

        let (mut i2c, _, mut wake) = hal.release();
        i2c.done();
        wake.done();
    }

    #[test]
    fn wake_released_after_bus_error() {
        let i2c_expectations = [I2cTransaction::write(0x5A, vec![0x20]).with_error(ErrorKind::Other)];
        let pin_expectations = [
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
        ];
        let mut hal = WakeRegisterBus::new(
            I2cMock::new(&i2c_expectations),
            NoopDelay::new(),
            PinMock::new(&pin_expectations),
        );

        let mut id = [0u8; 1];
        assert_eq!(hal.read(0x5A, 0x20, &mut id), Err(BusError::Bus));

        let (mut i2c, _, mut wake) = hal.release();
        i2c.done();
        wake.done();
    }
}
