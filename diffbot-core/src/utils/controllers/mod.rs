//! Drive controllers.
//!
//! - `i2c`: motor driver bus access and the wheel error type.
//! - `wheel`: single wheel actuator (H-bridge sequencing, bounded moves).
//! - `wheel_pair`: differential drive over two wheels.
//! - `regulator`: proportional speed correction.
//!
//! `DriveController` ties them to a shared I2C bus and a command queue.

pub mod i2c;
pub mod regulator;
pub mod wheel;
pub mod wheel_pair;

use core::cell::RefCell;

use embassy_sync::{
    blocking_mutex::raw::NoopRawMutex,
    channel::{Channel, Receiver, Sender},
};
use embassy_time::{Duration, Ticker};
use embedded_hal::{digital::InputPin, i2c::I2c};
use embedded_hal_bus::i2c::RefCellDevice;
use serde::{Deserialize, Serialize};

pub use i2c::{I2cMotorBus, MotorBus, WheelError};
pub use wheel::{WheelActuator, WheelSide};
pub use wheel_pair::WheelPair;

use crate::utils::{config::DriveConfig, time::Clock};

/// Depth of the drive command queue.
pub const COMMAND_QUEUE_DEPTH: usize = 8;

/// Queue carrying [`DriveCommand`]s from the navigation layer to the controller.
pub type DriveChannel = Channel<NoopRawMutex, DriveCommand, COMMAND_QUEUE_DEPTH>;
pub type DriveReceiver<'a> = Receiver<'a, NoopRawMutex, DriveCommand, COMMAND_QUEUE_DEPTH>;
pub type DriveSender<'a> = Sender<'a, NoopRawMutex, DriveCommand, COMMAND_QUEUE_DEPTH>;

/// Wheel pair whose motor buses are `RefCellDevice` handles on one I2C bus.
pub type I2cWheelPair<'a, I2C, L, R, C> = WheelPair<I2cMotorBus<RefCellDevice<'a, I2C>>, L, R, C>;

/// Drive commands accepted by the controller.
///
/// Serialized as JSON with tag `"dc"`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "dc", rename_all = "snake_case")]
pub enum DriveCommand {
    /// Move with linear (m/s) and angular (rad/s) speed until stopped.
    M { l: f32, a: f32 },
    /// Quarter turn in place, sign of `s` picks the direction.
    T { s: f32 },
    /// Pivot by `r` radians at `s` rad/s.
    R { r: f32, s: f32 },
    /// Timed move, `t` in milliseconds.
    D { l: f32, a: f32, t: u32 },
    /// Stop both wheels.
    S,
}

pub struct DriveController<'a, I2C: 'static, L, R, C> {
    i2c: &'a RefCell<I2C>,
    pub wheels: I2cWheelPair<'a, I2C, L, R, C>,
    commands: DriveReceiver<'a>,
    needs_stop: bool,
}

impl<'a, I2C, E, L, R, C> DriveController<'a, I2C, L, R, C>
where
    I2C: I2c<Error = E> + 'static,
    E: core::fmt::Debug,
    L: InputPin,
    R: InputPin,
    C: Clock + Clone,
{
    pub fn new(
        i2c_bus: &'a RefCell<I2C>,
        left_encoder: L,
        right_encoder: R,
        clock: C,
        config: &DriveConfig,
        commands: DriveReceiver<'a>,
    ) -> Self {
        let left = WheelActuator::new(
            WheelSide::Left,
            I2cMotorBus::new(RefCellDevice::new(i2c_bus)),
            left_encoder,
            clock.clone(),
            config.left,
            config.encoder,
        );
        let right = WheelActuator::new(
            WheelSide::Right,
            I2cMotorBus::new(RefCellDevice::new(i2c_bus)),
            right_encoder,
            clock.clone(),
            config.right,
            config.encoder,
        );

        DriveController {
            i2c: i2c_bus,
            wheels: WheelPair::new(left, right, clock, config),
            commands,
            needs_stop: false,
        }
    }

    /// Wake the motor driver and bring both wheels to a known stopped state.
    ///
    /// If the driver does not answer, the bus is scanned and logged before the error is
    /// returned.
    pub fn init(&mut self) -> Result<(), WheelError<E>> {
        let mut bus = I2cMotorBus::new(RefCellDevice::new(self.i2c));
        if let Err(e) = bus.init() {
            tracing::warn!("motor driver init failed, scanning instead: {:?}", e);
            i2c::scan_bus(self.i2c);
            return Err(WheelError::BusError(e));
        }
        self.wheels.init()
    }

    /// Execute one drive command.
    pub fn execute_command(
        &mut self,
        command: DriveCommand,
    ) -> Result<(), WheelError<E>> {
        match command {
            DriveCommand::M { l, a } => self.wheels.move_at(l, a).map(|_| ()),
            DriveCommand::T { s } => self.wheels.turn(s).map(|_| ()),
            DriveCommand::R { r, s } => self.wheels.rotate(r, s).map(|_| ()),
            DriveCommand::D { l, a, t } => self
                .wheels
                .move_for_time(l, a, t.saturating_mul(1_000))
                .map(|_| ()),
            DriveCommand::S => self.wheels.stop(),
        }
    }

    /// One pass of the control loop: pending commands first, then the wheel update.
    ///
    /// After a bus failure the next pass starts by retrying the stop.
    pub fn poll(&mut self) -> Result<(), WheelError<E>> {
        if self.needs_stop {
            self.wheels.force_stop()?;
            self.needs_stop = false;
            tracing::info!("wheels stopped after bus failure");
        }

        while let Ok(command) = self.commands.try_receive() {
            tracing::info!("Received drive command: {:?}", command);
            if let Err(e) = self.execute_command(command) {
                self.needs_stop = true;
                return Err(e);
            }
        }

        if let Err(e) = self.wheels.update() {
            self.needs_stop = true;
            return Err(e);
        }
        Ok(())
    }

    /// Run [`Self::poll`] forever, once per `period`.
    pub async fn drive_loop(
        &mut self,
        period: Duration,
    ) -> ! {
        let mut ticker = Ticker::every(period);
        loop {
            if let Err(e) = self.poll() {
                tracing::error!("drive cycle failed: {:?}", e);
            }
            ticker.next().await;
        }
    }
}
