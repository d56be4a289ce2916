// sources.rs
use crate::events::LogEvent;
use crate::physics::{Motion, Rect, Rover, World};
use murkkusw::shared::sensor::{pulse_to_cm, DistanceSensor, ECHO_TIMEOUT_US};
use murkkusw::shared::{Actuator, Clock, DriveCommand};
use rand::distributions::Uniform;
use rand::prelude::*;
use rand::rngs::StdRng;
use std::cell::RefCell;
use std::rc::Rc;

// Round-trip microseconds per millimeter of range, for the synthetic
// echo pulse
const US_PER_MM: f32 = 5.8;

// Physics integration sub-step
const PHYSICS_STEP_US: u64 = 5_000;

/// Everything the simulated vehicle shares: arena, pose, virtual time,
/// noise source and the pending event log.
pub struct SimRig {
    pub world: World,
    pub rover: Rover,
    now_us: u64,
    rng: StdRng,
    events: Vec<LogEvent>,
}

impl SimRig {
    pub fn new(arena_width: f32, arena_height: f32, no_object: bool, seed: u64) -> Self {
        Self {
            world: World {
                arena: Rect {
                    min_x: -arena_width / 2.0,
                    min_y: -arena_height / 2.0,
                    max_x: arena_width / 2.0,
                    max_y: arena_height / 2.0,
                },
                objects: if !no_object {
                    vec![Rect {
                        min_x: 200.0,
                        min_y: -150.0,
                        max_x: 400.0,
                        max_y: 150.0,
                    }]
                } else {
                    vec![]
                },
            },
            rover: Rover {
                pos_x: -arena_width / 2.0 + 200.0,
                pos_y: 0.0,
                heading: 0.0,
                motion: Motion::Stopped,
            },
            now_us: 0,
            rng: StdRng::seed_from_u64(seed),
            events: Vec::new(),
        }
    }

    pub fn now_us(&self) -> u64 {
        self.now_us
    }

    pub fn drain_events(&mut self) -> Vec<LogEvent> {
        std::mem::take(&mut self.events)
    }

    fn advance(&mut self, duration_us: u64) {
        let mut remaining = duration_us;
        while remaining > 0 {
            let step = remaining.min(PHYSICS_STEP_US);
            self.rover
                .update(step as f32 / 1_000_000.0, &self.world);
            self.now_us += step;
            remaining -= step;
        }
    }

    /// Synthetic ultrasonic ping: raycast along the heading, add the
    /// occasional measurement glitch, block for the echo round trip.
    fn ping(&mut self) -> u16 {
        let dir_x = libm::cosf(self.rover.heading);
        let dir_y = libm::sinf(self.rover.heading);
        let mut dist_mm = self
            .world
            .raycast(self.rover.pos_x, self.rover.pos_y, dir_x, dir_y);

        if self.rng.sample(Uniform::from(0.0..1.0)) > 0.9 {
            dist_mm += self.rng.sample(Uniform::from(-40.0..40.0));
        }
        dist_mm = dist_mm.max(0.0);

        let pulse_us = (dist_mm * US_PER_MM) as u64;
        let pulse = if pulse_us >= ECHO_TIMEOUT_US {
            None
        } else {
            Some(pulse_us)
        };

        // The control flow is halted while waiting for the echo, bounded
        // by the timeout
        self.advance(pulse.unwrap_or(ECHO_TIMEOUT_US));

        let cm = pulse_to_cm(pulse);
        self.events.push(LogEvent::Distance(self.now_us, cm));
        cm
    }

    fn drive(&mut self, cmd: DriveCommand) {
        self.events.push(LogEvent::Drive(self.now_us, cmd));
        match cmd {
            DriveCommand::Stop => self.rover.motion = Motion::Stopped,
            DriveCommand::Forward => self.rover.motion = Motion::Forward,
            DriveCommand::Backward => self.rover.motion = Motion::Backward,
            DriveCommand::SpinLeft(ms) => {
                self.rover.motion = Motion::SpinLeft;
                self.advance(ms * 1000);
            }
            DriveCommand::SpinRight(ms) => {
                self.rover.motion = Motion::SpinRight;
                self.advance(ms * 1000);
            }
        }
    }
}

pub type SharedRig = Rc<RefCell<SimRig>>;

pub struct SimSensor(pub SharedRig);

impl DistanceSensor for SimSensor {
    fn measure(&mut self) -> u16 {
        self.0.borrow_mut().ping()
    }
}

pub struct SimActuator(pub SharedRig);

impl Actuator for SimActuator {
    fn stop(&mut self) {
        self.0.borrow_mut().drive(DriveCommand::Stop);
    }
    fn forward(&mut self) {
        self.0.borrow_mut().drive(DriveCommand::Forward);
    }
    fn backward(&mut self) {
        self.0.borrow_mut().drive(DriveCommand::Backward);
    }
    fn spin_left(&mut self, duration_ms: u64) {
        self.0.borrow_mut().drive(DriveCommand::SpinLeft(duration_ms));
    }
    fn spin_right(&mut self, duration_ms: u64) {
        self.0.borrow_mut().drive(DriveCommand::SpinRight(duration_ms));
    }
}

pub struct SimClock(pub SharedRig);

impl Clock for SimClock {
    fn now_us(&self) -> u64 {
        self.0.borrow().now_us()
    }
    fn sleep_ms(&mut self, ms: u64) {
        self.0.borrow_mut().advance(ms * 1000);
    }
}
