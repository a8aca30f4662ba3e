//! # TLC59108 Driver
//!
//! This is a driver for the Texas Instruments TLC59108 / TLC59108F 8-channel
//! I²C PWM LED driver.
//!
//! Specifically, this driver is for setting the registers in the TLC59108
//! over I²C - the PWM waveforms themselves are generated in the chip's
//! hardware.
//!
//! The TLC59108 has the following features:
//!
//! * 8 constant-current LED outputs
//! * 256-step individual PWM brightness per channel
//! * A global group-dimming / group-blinking register
//! * Per-channel output mode (off, full-on, individual PWM, group PWM)
//! * Register auto-increment for multi-register writes
//!
//! The [`Tlc59108`] object only holds the resolved bus address; all device
//! state lives in the chip's registers. The I²C bus is borrowed for the
//! duration of each call, so it can be shared with other devices in between.
//!
//! # Example
//!
//! You might set up the driver like this:
//!
//! ```rust
//! # use embedded_hal::blocking::i2c::Write;
//! # struct I2c;
//! # impl embedded_hal::blocking::i2c::Write for I2c {
//! #     type Error = ();
//! #     fn write(&mut self, address: embedded_hal::blocking::i2c::SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
//! #         Ok(())
//! #     }
//! # }
//! # struct Delay;
//! # impl embedded_hal::blocking::delay::DelayMs<u16> for Delay {
//! #     fn delay_ms(&mut self, _ms: u16) {}
//! # }
//! # fn main() -> Result<(), tlc59108::Error<()>> {
//! # let mut i2c = I2c;
//! # let mut delay = Delay;
//! // ADR0..ADR2 pins tied low, so the selectable offset is 0
//! let driver = tlc59108::Tlc59108::new(0);
//! driver.init(&mut i2c, &mut delay)?;
//! // Channel 3 to half brightness
//! driver.set_brightness(&mut i2c, 3, 128)?;
//! // Everything else dim
//! driver.set_all_brightness(&mut i2c, 16)?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(missing_docs)]

//
// Public Types
//

/// The ways in which talking to a TLC59108 can fail.
///
/// Invalid arguments are caught before anything is put on the bus, so a
/// failed call never leaves the device partially updated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The I²C bus reported a failed transaction. Retrying is the caller's
    /// decision; this driver never retries on its own.
    Bus(E),
    /// A channel index outside 0..=7 was given. No bus traffic occurred.
    InvalidChannel,
    /// A register run would overflow the register file, or a brightness run
    /// would overflow the 8 PWM channels. No bus traffic occurred.
    InvalidRange,
}

/// How the LED output stages drive their channels.
///
/// One [`Register::LedOut0`]/[`Register::LedOut1`] register covers four
/// channels at two bits each, so output mode is set uniformly across all
/// eight channels.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// All channels off
    Off = 0b00,
    /// All channels fully on (no PWM)
    FullOn = 0b01,
    /// Each channel follows its own PWMx register
    Pwm = 0b10,
    /// Each channel follows its own PWMx register, scaled by GRPPWM
    PwmGroup = 0b11,
}

/// Register auto-increment modes.
///
/// A multi-byte write starts with a register address byte; these tags go in
/// its top bits and tell the device to advance its internal register pointer
/// after every data byte. See the datasheet, p 13.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AutoIncrement {
    /// Increment through every register
    All = 0x80,
    /// Increment through the individual brightness registers only
    Brightness = 0xA0,
    /// Increment through the global control registers only
    Global = 0xC0,
    /// Increment through the individual brightness and global registers
    BrightnessGlobal = 0xE0,
}

/// The set of registers in the TLC59108.
///
/// See the datasheet, p 16. Bit-field constants for the mode registers are
/// in the crate root ([`MODE1_ALLCALL`] and friends).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Register {
    /// Mode register 1 (oscillator, sub-address and all-call enables)
    Mode1 = 0x00,
    /// Mode register 2 (error flag clear, group blink, output change mode)
    Mode2 = 0x01,
    /// Channel 0 individual brightness
    Pwm0 = 0x02,
    /// Channel 1 individual brightness
    Pwm1 = 0x03,
    /// Channel 2 individual brightness
    Pwm2 = 0x04,
    /// Channel 3 individual brightness
    Pwm3 = 0x05,
    /// Channel 4 individual brightness
    Pwm4 = 0x06,
    /// Channel 5 individual brightness
    Pwm5 = 0x07,
    /// Channel 6 individual brightness
    Pwm6 = 0x08,
    /// Channel 7 individual brightness
    Pwm7 = 0x09,
    /// Group duty cycle (dimming) or blink duty cycle
    GrpPwm = 0x0A,
    /// Group blink frequency
    GrpFreq = 0x0B,
    /// Output mode for channels 0-3, two bits per channel
    LedOut0 = 0x0C,
    /// Output mode for channels 4-7, two bits per channel
    LedOut1 = 0x0D,
    /// I²C sub-address 1
    SubAdr1 = 0x0E,
    /// I²C sub-address 2
    SubAdr2 = 0x0F,
    /// I²C sub-address 3
    SubAdr3 = 0x10,
    /// I²C all-call address
    AllCallAdr = 0x11,
    /// Output gain control
    Iref = 0x12,
    /// Open/short error flags, one bit per channel
    Eflag = 0x13,
}

/// Represents one TLC59108 on the bus.
pub struct Tlc59108 {
    address: u8,
}

//
// Public Data
//

/// The 7-bit base bus address; the three ADRx pins add an offset of 0..=7.
pub const BASE_ADDRESS: u8 = 0x40;

/// The 7-bit broadcast address for the software reset sequence.
pub const SWRESET_ADDRESS: u8 = 0x4B;

/// The default 7-bit all-call address.
pub const ALLCALL_ADDRESS: u8 = 0x48;

/// The default 7-bit sub-address 1.
pub const SUB1_ADDRESS: u8 = 0x49;

/// The default 7-bit sub-address 2.
pub const SUB2_ADDRESS: u8 = 0x4A;

/// The default 7-bit sub-address 3.
pub const SUB3_ADDRESS: u8 = 0x4C;

/// MODE1: oscillator off (low-power mode) when set
pub const MODE1_OSC_OFF: u8 = 0x10;

/// MODE1: respond to sub-address 1 when set
pub const MODE1_SUB1: u8 = 0x08;

/// MODE1: respond to sub-address 2 when set
pub const MODE1_SUB2: u8 = 0x04;

/// MODE1: respond to sub-address 3 when set
pub const MODE1_SUB3: u8 = 0x02;

/// MODE1: respond to the all-call address when set
pub const MODE1_ALLCALL: u8 = 0x01;

/// MODE2: clear the error flags when set
pub const MODE2_EFCLR: u8 = 0x80;

/// MODE2: group blinking instead of group dimming when set
pub const MODE2_DMBLNK: u8 = 0x20;

/// MODE2: outputs change on ACK instead of STOP when set
pub const MODE2_OCH: u8 = 0x08;

/// IREF: current multiplier
pub const IREF_CM: u8 = 0x80;

/// IREF: sub-current
pub const IREF_HC: u8 = 0x40;

//
// Private Data
//

/// Number of PWM output channels.
const NUM_CHANNELS: u8 = 8;

/// Size of the register file; an auto-increment run must fit inside it.
const NUM_REGISTERS: usize = 0x14;

/// Magic bytes the device requires at [`SWRESET_ADDRESS`] before it resets.
const SWRESET_KEY: [u8; 2] = [0xA5, 0x5A];

/// Power-on settle time after a reset, per the datasheet.
const POWER_ON_SETTLE_MS: u16 = 200;

//
// impls on Public Types
//

impl Tlc59108 {
    /// Create a new TLC59108 proxy object.
    ///
    /// `selectable_address` is the 3-bit offset set by the ADR0..ADR2 pins;
    /// it is masked to 0..=7 and OR'd into [`BASE_ADDRESS`]. Nothing is sent
    /// on the bus until you call one of the other methods.
    pub fn new(selectable_address: u8) -> Tlc59108 {
        Tlc59108 {
            address: BASE_ADDRESS | (selectable_address & 0x07),
        }
    }

    /// The resolved 7-bit bus address this driver talks to.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Bring the device up into a known state.
    ///
    /// Resets the device, waits out the power-on settle time, enables the
    /// oscillator and the all-call address, switches every channel to
    /// individual PWM mode and zeroes all brightness registers. Returns
    /// `Ok(())` only if every step succeeded.
    pub fn init<B, D>(&self, bus: &mut B, delay: &mut D) -> Result<(), Error<B::Error>>
    where
        B: embedded_hal::blocking::i2c::Write,
        D: embedded_hal::blocking::delay::DelayMs<u16>,
    {
        self.reset(bus)?;
        delay.delay_ms(POWER_ON_SETTLE_MS);
        // Writing ALLCALL alone also clears OSC_OFF, starting the oscillator
        self.write_register(bus, Register::Mode1 as u8, MODE1_ALLCALL)?;
        self.set_output_mode(bus, OutputMode::Pwm)?;
        self.set_all_brightness(bus, 0)
    }

    /// Reset the TLC59108, putting all registers back to their defaults.
    ///
    /// Turns the outputs off and stops the oscillator, then issues the
    /// software reset: the magic bytes `0xA5 0x5A` written to the broadcast
    /// [`SWRESET_ADDRESS`] rather than this device's own address. Every
    /// TLC59108 on the bus resets.
    pub fn reset<B>(&self, bus: &mut B) -> Result<(), Error<B::Error>>
    where
        B: embedded_hal::blocking::i2c::Write,
    {
        self.set_output_mode(bus, OutputMode::Off)?;
        self.write_register(bus, Register::Mode1 as u8, MODE1_OSC_OFF)?;
        bus.write(SWRESET_ADDRESS, &SWRESET_KEY).map_err(Error::Bus)
    }

    /// Set the output mode of all eight channels.
    ///
    /// The device's granularity is one mode register per four channels, so
    /// the mode is replicated into all four 2-bit fields of both LEDOUT
    /// registers.
    pub fn set_output_mode<B>(&self, bus: &mut B, mode: OutputMode) -> Result<(), Error<B::Error>>
    where
        B: embedded_hal::blocking::i2c::Write,
    {
        let mode = mode as u8;
        let value = (mode << 6) | (mode << 4) | (mode << 2) | mode;
        self.write_register(bus, Register::LedOut0 as u8, value)?;
        self.write_register(bus, Register::LedOut1 as u8, value)
    }

    /// Set the brightness of a single channel.
    ///
    /// `duty_cycle` is linear: 0 is off, 255 is full brightness. The channel
    /// must be in 0..=7 or the call fails with [`Error::InvalidChannel`]
    /// without touching the bus.
    pub fn set_brightness<B>(
        &self,
        bus: &mut B,
        channel: u8,
        duty_cycle: u8,
    ) -> Result<(), Error<B::Error>>
    where
        B: embedded_hal::blocking::i2c::Write,
    {
        if channel >= NUM_CHANNELS {
            return Err(Error::InvalidChannel);
        }
        self.write_register(bus, Register::Pwm0 as u8 + channel, duty_cycle)
    }

    /// Set every channel to the same brightness.
    ///
    /// This is one auto-increment transaction of eight identical bytes, not
    /// eight separate writes.
    pub fn set_all_brightness<B>(&self, bus: &mut B, duty_cycle: u8) -> Result<(), Error<B::Error>>
    where
        B: embedded_hal::blocking::i2c::Write,
    {
        self.write_registers(
            bus,
            Register::Pwm0 as u8,
            &[duty_cycle; NUM_CHANNELS as usize],
        )
    }

    /// Set a contiguous run of channels to per-channel brightness values.
    ///
    /// Writes `duty_cycles[0]` to `start_channel`, `duty_cycles[1]` to the
    /// next channel, and so on, as a single auto-increment transaction. The
    /// run must fit inside the eight channels or the call fails with
    /// [`Error::InvalidRange`] without touching the bus - there are no
    /// partial writes.
    pub fn set_brightness_many<B>(
        &self,
        bus: &mut B,
        start_channel: u8,
        duty_cycles: &[u8],
    ) -> Result<(), Error<B::Error>>
    where
        B: embedded_hal::blocking::i2c::Write,
    {
        if start_channel as usize + duty_cycles.len() > NUM_CHANNELS as usize {
            return Err(Error::InvalidRange);
        }
        self.write_registers(bus, Register::Pwm0 as u8 + start_channel, duty_cycles)
    }

    /// Set the group duty cycle.
    ///
    /// Scales every channel that is in [`OutputMode::PwmGroup`] mode
    /// uniformly, independently of the per-channel brightness registers.
    /// With [`MODE2_DMBLNK`] set this register holds the blink duty cycle
    /// instead.
    pub fn set_group_brightness<B>(
        &self,
        bus: &mut B,
        duty_cycle: u8,
    ) -> Result<(), Error<B::Error>>
    where
        B: embedded_hal::blocking::i2c::Write,
    {
        self.write_register(bus, Register::GrpPwm as u8, duty_cycle)
    }

    /// Write one register directly.
    pub fn set_register<B>(
        &self,
        bus: &mut B,
        register: Register,
        value: u8,
    ) -> Result<(), Error<B::Error>>
    where
        B: embedded_hal::blocking::i2c::Write,
    {
        self.write_register(bus, register as u8, value)
    }

    /// Write a run of registers directly, starting at `register`.
    ///
    /// Uses [`AutoIncrement::All`], so the run may span any part of the
    /// register file but must not overflow it.
    pub fn set_registers<B>(
        &self,
        bus: &mut B,
        register: Register,
        values: &[u8],
    ) -> Result<(), Error<B::Error>>
    where
        B: embedded_hal::blocking::i2c::Write,
    {
        self.write_registers(bus, register as u8, values)
    }

    /// Single-register write: `[reg, value]` addressed to this device.
    fn write_register<B>(&self, bus: &mut B, reg: u8, value: u8) -> Result<(), Error<B::Error>>
    where
        B: embedded_hal::blocking::i2c::Write,
    {
        #[cfg(feature = "defmt")]
        defmt::debug!("Setting TLC59108 0x{:02x} to 0x{:02x}", reg, value);
        bus.write(self.address, &[reg, value]).map_err(Error::Bus)
    }

    /// Batched write: `[reg | auto-increment tag, values...]` as one
    /// transaction. The device's register pointer advances itself after each
    /// byte, so an 8-channel update costs one transaction, not eight.
    fn write_registers<B>(
        &self,
        bus: &mut B,
        start_reg: u8,
        values: &[u8],
    ) -> Result<(), Error<B::Error>>
    where
        B: embedded_hal::blocking::i2c::Write,
    {
        if start_reg as usize + values.len() > NUM_REGISTERS {
            return Err(Error::InvalidRange);
        }
        let mut frame = [0u8; NUM_REGISTERS + 1];
        frame[0] = start_reg | AutoIncrement::All as u8;
        frame[1..=values.len()].copy_from_slice(values);
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "Setting TLC59108 0x{:02x} and {} following",
            start_reg,
            values.len()
        );
        bus.write(self.address, &frame[..=values.len()])
            .map_err(Error::Bus)
    }
}

//
// Tests
//

#[cfg(test)]
mod tests {
    use super::*;

    use embedded_hal_mock::delay::MockNoop;
    use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use embedded_hal_mock::MockError;

    #[test]
    fn resolves_address_from_offset() {
        assert_eq!(Tlc59108::new(0).address(), 0x40);
        assert_eq!(Tlc59108::new(3).address(), 0x43);
        // Only the three ADRx bits count
        assert_eq!(Tlc59108::new(0xFF).address(), 0x47);
    }

    #[test]
    fn single_channel_brightness_is_one_write() {
        let expectations = [I2cTransaction::write(0x40, vec![0x06, 128])];
        let mut i2c = I2cMock::new(&expectations);
        let driver = Tlc59108::new(0);
        driver.set_brightness(&mut i2c, 4, 128).unwrap();
        i2c.done();
    }

    #[test]
    fn channel_out_of_range_touches_no_bus() {
        let mut i2c = I2cMock::new(&[]);
        let driver = Tlc59108::new(0);
        let result = driver.set_brightness(&mut i2c, 8, 1);
        assert!(matches!(result, Err(Error::InvalidChannel)));
        i2c.done();
    }

    #[test]
    fn output_mode_replicates_into_both_ledout_registers() {
        let expectations = [
            I2cTransaction::write(0x40, vec![0x0C, 0xAA]),
            I2cTransaction::write(0x40, vec![0x0D, 0xAA]),
            I2cTransaction::write(0x40, vec![0x0C, 0x55]),
            I2cTransaction::write(0x40, vec![0x0D, 0x55]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let driver = Tlc59108::new(0);
        driver.set_output_mode(&mut i2c, OutputMode::Pwm).unwrap();
        driver.set_output_mode(&mut i2c, OutputMode::FullOn).unwrap();
        i2c.done();
    }

    #[test]
    fn full_brightness_run_is_one_batched_write() {
        let expectations = [I2cTransaction::write(
            0x40,
            vec![0x82, 10, 20, 30, 40, 50, 60, 70, 80],
        )];
        let mut i2c = I2cMock::new(&expectations);
        let driver = Tlc59108::new(0);
        driver
            .set_brightness_many(&mut i2c, 0, &[10, 20, 30, 40, 50, 60, 70, 80])
            .unwrap();
        i2c.done();
    }

    #[test]
    fn partial_brightness_run_starts_at_the_right_channel() {
        let expectations = [I2cTransaction::write(0x40, vec![0x87, 1, 2, 3])];
        let mut i2c = I2cMock::new(&expectations);
        let driver = Tlc59108::new(0);
        driver.set_brightness_many(&mut i2c, 5, &[1, 2, 3]).unwrap();
        i2c.done();
    }

    #[test]
    fn overlong_brightness_run_touches_no_bus() {
        let mut i2c = I2cMock::new(&[]);
        let driver = Tlc59108::new(0);
        let result = driver.set_brightness_many(&mut i2c, 4, &[1, 2, 3, 4, 5]);
        assert!(matches!(result, Err(Error::InvalidRange)));
        i2c.done();
    }

    #[test]
    fn uniform_brightness_fills_all_eight_channels() {
        let expectations = [I2cTransaction::write(
            0x40,
            vec![0x82, 7, 7, 7, 7, 7, 7, 7, 7],
        )];
        let mut i2c = I2cMock::new(&expectations);
        let driver = Tlc59108::new(0);
        driver.set_all_brightness(&mut i2c, 7).unwrap();
        i2c.done();
    }

    #[test]
    fn group_brightness_is_one_write() {
        let expectations = [I2cTransaction::write(0x40, vec![0x0A, 0x42])];
        let mut i2c = I2cMock::new(&expectations);
        let driver = Tlc59108::new(0);
        driver.set_group_brightness(&mut i2c, 0x42).unwrap();
        i2c.done();
    }

    #[test]
    fn reset_ends_with_the_broadcast_unlock_sequence() {
        let expectations = [
            I2cTransaction::write(0x40, vec![0x0C, 0x00]),
            I2cTransaction::write(0x40, vec![0x0D, 0x00]),
            I2cTransaction::write(0x40, vec![0x00, 0x10]),
            I2cTransaction::write(0x4B, vec![0xA5, 0x5A]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let driver = Tlc59108::new(0);
        driver.reset(&mut i2c).unwrap();
        i2c.done();
    }

    #[test]
    fn init_brings_the_device_up_on_its_own_address() {
        let expectations = [
            // reset, via the instance address then the broadcast address
            I2cTransaction::write(0x43, vec![0x0C, 0x00]),
            I2cTransaction::write(0x43, vec![0x0D, 0x00]),
            I2cTransaction::write(0x43, vec![0x00, 0x10]),
            I2cTransaction::write(0x4B, vec![0xA5, 0x5A]),
            // oscillator on, all-call enabled
            I2cTransaction::write(0x43, vec![0x00, 0x01]),
            // individual PWM on all channels
            I2cTransaction::write(0x43, vec![0x0C, 0xAA]),
            I2cTransaction::write(0x43, vec![0x0D, 0xAA]),
            // all brightness zeroed in one batch
            I2cTransaction::write(0x43, vec![0x82, 0, 0, 0, 0, 0, 0, 0, 0]),
            // one more single-channel write on the same address
            I2cTransaction::write(0x43, vec![0x06, 128]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut delay = MockNoop::new();
        let driver = Tlc59108::new(3);
        driver.init(&mut i2c, &mut delay).unwrap();
        driver.set_brightness(&mut i2c, 4, 128).unwrap();
        assert_eq!(driver.address(), 0x43);
        i2c.done();
    }

    #[test]
    fn repeated_writes_are_not_coalesced() {
        let expectations = [
            I2cTransaction::write(0x40, vec![0x02, 99]),
            I2cTransaction::write(0x40, vec![0x02, 99]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let driver = Tlc59108::new(0);
        driver.set_brightness(&mut i2c, 0, 99).unwrap();
        driver.set_brightness(&mut i2c, 0, 99).unwrap();
        i2c.done();
    }

    #[test]
    fn bus_failures_surface_as_errors() {
        let expectations = [I2cTransaction::write(0x40, vec![0x02, 9])
            .with_error(MockError::Io(std::io::ErrorKind::Other))];
        let mut i2c = I2cMock::new(&expectations);
        let driver = Tlc59108::new(0);
        let result = driver.set_brightness(&mut i2c, 0, 9);
        assert!(matches!(result, Err(Error::Bus(_))));
        i2c.done();
    }

    #[test]
    fn raw_register_run_may_end_at_the_register_file_boundary() {
        let expectations = [I2cTransaction::write(0x40, vec![0x92, 0x00, 0x00])];
        let mut i2c = I2cMock::new(&expectations);
        let driver = Tlc59108::new(0);
        driver
            .set_registers(&mut i2c, Register::Iref, &[0x00, 0x00])
            .unwrap();
        i2c.done();
    }

    #[test]
    fn raw_register_run_must_not_overflow_the_register_file() {
        let mut i2c = I2cMock::new(&[]);
        let driver = Tlc59108::new(0);
        let result = driver.set_registers(&mut i2c, Register::Eflag, &[0x00, 0x00]);
        assert!(matches!(result, Err(Error::InvalidRange)));
        i2c.done();
    }
}

//
// End of file
//
