// shared/mod.rs
use rand::Rng;
use std::time::{Duration, Instant};

pub mod avoidance;
pub mod burst;
pub mod history;
pub mod sensor;

// Obstacle classification threshold. Readings at or below this are
// obstacles, readings strictly above it wipe burst memory. The two
// limits are deliberately equal; the hysteresis band has zero width.
pub const DIST_LIMIT_CM: u16 = 30;
pub const CLEAR_LIMIT_CM: u16 = 30;

pub const BACK_MS_BASE: u64 = 250;
pub const TURN_MS_BASE: u64 = 420;
pub const LOOP_BACK_BONUS_MS: u64 = 200;
pub const LOOP_TURN_BONUS_MS: u64 = 250;

pub const BURST_WINDOW_US: u64 = 1_500_000;
pub const BURST_LOOP_THRESHOLD: u32 = 4;

pub const TURN_HISTORY_LEN: usize = 8;
// Looping triggers when the last 8 turns are skewed at least 75% one way
pub const LOOP_RIGHTS_HIGH: usize = 6;
pub const LOOP_RIGHTS_LOW: usize = 2;

// Pauses between maneuver steps. Stop-before-reverse avoids a direction
// change while the motors are still driving; stop-after-turn avoids
// re-triggering the sensor mid-spin.
pub const PAUSE_BEFORE_REVERSE_MS: u64 = 120;
pub const PAUSE_AFTER_STEP_MS: u64 = 80;

// Idle pause at the end of every control cycle, bounding the sensor
// polling rate and letting the chassis settle
pub const CYCLE_IDLE_MS: u64 = 40;

pub const LOG_DISTANCE: bool = false;
pub const LOG_MANEUVER: bool = false;

/// One discrete drive command for the motor driver. Stop, Forward and
/// Backward switch pin state and return; the spins block for the given
/// duration in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriveCommand {
    Stop,
    Forward,
    Backward,
    SpinLeft(u64),
    SpinRight(u64),
}

/// Actuation seam. Commands are fire-and-forget; the motor driver has
/// no fault reporting.
pub trait Actuator {
    fn stop(&mut self);
    fn forward(&mut self);
    fn backward(&mut self);
    fn spin_left(&mut self, duration_ms: u64);
    fn spin_right(&mut self, duration_ms: u64);
}

/// Time seam. `sleep_ms` is the only suspension mechanism in the whole
/// control flow; the simulator and the tests substitute virtual time.
pub trait Clock {
    fn now_us(&self) -> u64;
    fn sleep_ms(&mut self, ms: u64);
}

/// Wall clock for running on a real host.
pub struct StdClock {
    epoch: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Clock for StdClock {
    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    fn sleep_ms(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

/// Uniform random turn direction, injectable so tests can script the
/// unbiased escape picks.
pub trait TurnRng {
    fn random_right(&mut self) -> bool;
}

pub struct RandTurnRng<R: Rng>(pub R);

impl<R: Rng> TurnRng for RandTurnRng<R> {
    fn random_right(&mut self) -> bool {
        self.0.gen_bool(0.5)
    }
}
