use clap::Parser;
use core::cell::RefCell;
use core::f32::consts::PI;
use diffbot_core::utils::{
    DriveChannel, DriveCommand, DriveConfig, DriveController, EmbassyClock,
    controllers::{DriveSender, i2c::MOTOR_DRIVER_ADDRESS},
    math::calibration::CalibrationParams,
};
use embassy_executor::{Executor, Spawner};
use embassy_time::{Duration, Instant, Timer};
use embedded_hal::{
    digital::{ErrorType as PinErrorType, InputPin},
    i2c::{ErrorKind, ErrorType as I2cErrorType, I2c, NoAcknowledgeSource, Operation},
};
use static_cell::StaticCell;
use std::convert::Infallible;
use tracing::{error, info};

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts {
    /// JSON drive configuration (defaults are used when omitted)
    #[clap(long)]
    config: Option<std::path::PathBuf>,
    /// forward speed of the first phase (m/s)
    #[clap(long, default_value_t = 0.2)]
    linear: f32,
    /// yaw rate of the first phase (rad/s)
    #[clap(long, default_value_t = 0.0)]
    angular: f32,
    /// length of the first phase (s)
    #[clap(long, default_value_t = 5)]
    seconds: u64,
    /// control loop period (µs)
    #[clap(long, default_value_t = 1_000)]
    poll_us: u64,
    /// how much weaker the simulated motors are than their calibration says
    #[clap(long, default_value_t = 1.15)]
    motor_slack: f32,
}

/// One simulated wheel: true motor response and accumulated rotation.
struct SimWheel {
    forward: u8,
    reverse: u8,
    response: CalibrationParams,
    rotation: f32,
    last: Option<Instant>,
}

/// Motor driver registers plus wheel physics.
struct Plant {
    registers: [u8; 16],
    wheels: [SimWheel; 2],
    rad_per_tick: f32,
}

impl Plant {
    fn new(
        config: &DriveConfig,
        slack: f32,
    ) -> Self {
        let weaken = |c: CalibrationParams| CalibrationParams {
            multiplier: c.multiplier * slack,
            ..c
        };
        Plant {
            registers: [0; 16],
            wheels: [
                SimWheel {
                    forward: 5,
                    reverse: 4,
                    response: weaken(config.left),
                    rotation: 0.0,
                    last: None,
                },
                SimWheel {
                    forward: 3,
                    reverse: 2,
                    response: weaken(config.right),
                    rotation: 0.0,
                    last: None,
                },
            ],
            rad_per_tick: 2.0 * PI / config.encoder.ticks_per_revolution.max(1) as f32,
        }
    }

    fn register_write(
        &mut self,
        bytes: &[u8],
    ) {
        if let [reg, value] = bytes {
            if let Some(r) = self.registers.get_mut(*reg as usize) {
                *r = *value;
            }
        }
    }

    /// True wheel speed magnitude (rad/s) for the current duty.
    fn wheel_speed(
        &self,
        index: usize,
    ) -> f32 {
        let wheel = &self.wheels[index];
        let duty = self.registers[wheel.forward as usize].max(self.registers[wheel.reverse as usize]);
        if duty < wheel.response.pwm_min || wheel.response.multiplier == 0.0 {
            return 0.0;
        }
        ((duty as f32 - wheel.response.shift) / wheel.response.multiplier).max(0.0)
    }

    /// Encoder level after integrating the wheel rotation up to `now`.
    fn encoder_level(
        &mut self,
        index: usize,
        now: Instant,
    ) -> bool {
        let speed = self.wheel_speed(index);
        let wheel = &mut self.wheels[index];
        if let Some(last) = wheel.last {
            wheel.rotation += speed * (now - last).as_micros() as f32 / 1_000_000.0;
        }
        wheel.last = Some(now);
        (wheel.rotation / self.rad_per_tick) as u64 % 2 == 1
    }
}

/// I2C bus with only the motor driver attached.
struct SimI2c {
    plant: &'static RefCell<Plant>,
}

impl I2cErrorType for SimI2c {
    type Error = ErrorKind;
}

impl I2c for SimI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != MOTOR_DRIVER_ADDRESS {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations.iter() {
            if let Operation::Write(bytes) = op {
                self.plant.borrow_mut().register_write(bytes);
            }
        }
        Ok(())
    }
}

/// Encoder input backed by the simulated wheel.
struct SimEncoder {
    plant: &'static RefCell<Plant>,
    index: usize,
}

impl PinErrorType for SimEncoder {
    type Error = Infallible;
}

impl InputPin for SimEncoder {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.plant.borrow_mut().encoder_level(self.index, Instant::now()))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|level| !level)
    }
}

type Controller = DriveController<'static, SimI2c, SimEncoder, SimEncoder, EmbassyClock>;

#[embassy_executor::task]
async fn drive_task(
    mut ctrl: Controller,
    poll_us: u64,
) -> ! {
    ctrl.drive_loop(Duration::from_micros(poll_us)).await
}

/// Scripted run: straight phase, quarter turn, timed reverse hop, stop.
#[embassy_executor::task]
async fn script_task(
    commands: DriveSender<'static>,
    plant: &'static RefCell<Plant>,
    linear: f32,
    angular: f32,
    seconds: u64,
) {
    info!(linear, angular, seconds, "phase: move");
    commands.send(DriveCommand::M { l: linear, a: angular }).await;
    for _ in 0..seconds * 2 {
        Timer::after(Duration::from_millis(500)).await;
        let (left, right) = {
            let plant = plant.borrow();
            (plant.wheel_speed(0), plant.wheel_speed(1))
        };
        info!(left, right, "true wheel speed (rad/s)");
    }

    info!("phase: quarter turn");
    commands.send(DriveCommand::T { s: 2.0 }).await;
    Timer::after(Duration::from_secs(2)).await;

    info!("phase: timed reverse");
    commands
        .send(DriveCommand::D {
            l: -linear,
            a: 0.0,
            t: 1_000,
        })
        .await;
    Timer::after(Duration::from_millis(1_500)).await;

    commands.send(DriveCommand::S).await;
    Timer::after(Duration::from_millis(100)).await;
    info!("Finished");
    std::process::exit(0);
}

#[embassy_executor::task]
async fn main_task(
    spawner: Spawner,
    opts: Opts,
    config: DriveConfig,
) {
    static PLANT: StaticCell<RefCell<Plant>> = StaticCell::new();
    let plant = &*PLANT.init(RefCell::new(Plant::new(&config, opts.motor_slack)));

    static I2C_BUS: StaticCell<RefCell<SimI2c>> = StaticCell::new();
    let i2c_bus = &*I2C_BUS.init(RefCell::new(SimI2c { plant }));

    static CHANNEL: StaticCell<DriveChannel> = StaticCell::new();
    let channel = &*CHANNEL.init(DriveChannel::new());

    let mut ctrl = DriveController::new(
        i2c_bus,
        SimEncoder { plant, index: 0 },
        SimEncoder { plant, index: 1 },
        EmbassyClock,
        &config,
        channel.receiver(),
    );
    if let Err(e) = ctrl.init() {
        error!("drive init failed: {:?}", e);
        std::process::exit(1);
    }

    spawner.spawn(drive_task(ctrl, opts.poll_us)).unwrap();
    spawner
        .spawn(script_task(
            channel.sender(),
            plant,
            opts.linear,
            opts.angular,
            opts.seconds,
        ))
        .unwrap();
}

fn load_config(opts: &Opts) -> Result<DriveConfig, String> {
    match &opts.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
            serde_json::from_str(&text).map_err(|e| format!("{}: {e}", path.display()))
        }
        None => Ok(DriveConfig::default()),
    }
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts: Opts = Opts::parse();
    let config = match load_config(&opts) {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    info!(?config, "starting simulated drive");

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(main_task(spawner, opts, config)).unwrap();
    });
}
