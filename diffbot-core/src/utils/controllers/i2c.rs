//! Motor driver access over I2C.
//!
//! The motor driver is a byte-register PWM chip at 0x70 with one PWM register per H-bridge
//! input. Each wheel owns two of them, one per direction, and a write is the two bytes
//! `[channel, duty]`. Both wheels share the bus through `embedded-hal-bus` `RefCellDevice`
//! handles.

use core::cell::RefCell;

use embedded_hal::i2c::I2c;

/// Default I2C address of the motor driver.
pub const MOTOR_DRIVER_ADDRESS: u8 = 0x70;

/// MODE1: wake the oscillator.
const INIT_MODE1: [u8; 2] = [0x00, 0x01];
/// LEDOUT: put every output under individual PWM control.
const INIT_LEDOUT: [u8; 2] = [0xE8, 0xAA];

/// Errors raised while driving a wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelError<E: core::fmt::Debug> {
    /// A motor bus write was not acknowledged.
    BusError(E),
}

/// Byte-oriented channel to the motor driver.
pub trait MotorBus {
    type Error: core::fmt::Debug;

    /// Set the duty (0–255) of one driver channel.
    fn write(
        &mut self,
        channel: u8,
        duty: u8,
    ) -> Result<(), Self::Error>;
}

/// [`MotorBus`] over an `embedded-hal` I2C device.
pub struct I2cMotorBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> I2cMotorBus<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, MOTOR_DRIVER_ADDRESS)
    }

    pub fn with_address(
        i2c: I2C,
        address: u8,
    ) -> Self {
        Self { i2c, address }
    }

    /// Wake the driver and enable PWM on all outputs.
    ///
    /// Needed once per power-up, before the first duty write.
    pub fn init(&mut self) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &INIT_MODE1)?;
        self.i2c.write(self.address, &INIT_LEDOUT)?;
        tracing::info!(address = self.address, "motor driver initialised");
        Ok(())
    }
}

impl<I2C: I2c> MotorBus for I2cMotorBus<I2C> {
    type Error = I2C::Error;

    fn write(
        &mut self,
        channel: u8,
        duty: u8,
    ) -> Result<(), Self::Error> {
        tracing::trace!(channel, duty, "motor write");
        self.i2c.write(self.address, &[channel, duty])
    }
}

/// Scan the I2C bus and log every address that acknowledges.
///
/// Used as a diagnostic when the motor driver does not answer during start-up.
pub fn scan_bus<I2C: I2c>(bus: &RefCell<I2C>) {
    let mut bus = bus.borrow_mut();
    for addr in 0x03..0x78 {
        if bus.write(addr, &[]).is_ok() {
            tracing::warn!("I2C device found at 0x{:02X}", addr);
        }
    }
}
