use libm::{cosf, sinf};
use std::f32::consts::PI;

// Rover footprint radius (mm) used for wall containment
pub const HALF_SIZE: f32 = 80.0;

// Fixed output level: these never vary, only direction does
pub const DRIVE_SPEED_MM_S: f32 = 350.0;
pub const SPIN_RATE_RAD_S: f32 = 2.8;

#[derive(Clone, Copy)]
pub struct Rect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

pub struct World {
    pub arena: Rect,
    pub objects: Vec<Rect>,
}

// Distance along the ray to an axis-aligned face at `face` on the
// perpendicular axis, if the hit lands between `lo` and `hi` on the
// parallel axis. Only hits in front of the ray count.
fn face_hit(pos: f32, dir: f32, face: f32, cross_pos: f32, cross_dir: f32, lo: f32, hi: f32) -> Option<f32> {
    if dir == 0.0 {
        return None;
    }
    let t = (face - pos) / dir;
    if t <= 0.0 {
        return None;
    }
    let hit = cross_pos + t * cross_dir;
    if hit >= lo && hit <= hi {
        Some(t)
    } else {
        None
    }
}

impl World {
    pub fn raycast_to_rect(
        &self,
        pos_x: f32,
        pos_y: f32,
        dir_x: f32,
        dir_y: f32,
        rect: &Rect,
    ) -> Option<f32> {
        let faces = [
            face_hit(pos_x, dir_x, rect.min_x, pos_y, dir_y, rect.min_y, rect.max_y),
            face_hit(pos_x, dir_x, rect.max_x, pos_y, dir_y, rect.min_y, rect.max_y),
            face_hit(pos_y, dir_y, rect.min_y, pos_x, dir_x, rect.min_x, rect.max_x),
            face_hit(pos_y, dir_y, rect.max_y, pos_x, dir_x, rect.min_x, rect.max_x),
        ];
        faces
            .iter()
            .flatten()
            .fold(None, |best: Option<f32>, &t| match best {
                Some(b) => Some(b.min(t)),
                None => Some(t),
            })
    }

    /// Distance (mm) from a point along a direction to the nearest arena
    /// wall or object face.
    pub fn raycast(&self, pos_x: f32, pos_y: f32, dir_x: f32, dir_y: f32) -> f32 {
        let mut min_t = f32::INFINITY;

        if let Some(t) = self.raycast_to_rect(pos_x, pos_y, dir_x, dir_y, &self.arena) {
            min_t = min_t.min(t);
        }

        for obj in &self.objects {
            if let Some(t) = self.raycast_to_rect(pos_x, pos_y, dir_x, dir_y, obj) {
                min_t = min_t.min(t);
            }
        }

        if min_t.is_infinite() {
            10_000.0
        } else {
            min_t
        }
    }
}

/// What the motor driver pins are currently doing.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Stopped,
    Forward,
    Backward,
    SpinLeft,
    SpinRight,
}

pub struct Rover {
    pub pos_x: f32,
    pub pos_y: f32,
    pub heading: f32,
    pub motion: Motion,
}

impl Rover {
    pub fn update(&mut self, dt: f32, world: &World) {
        match self.motion {
            Motion::Stopped => {}
            Motion::Forward => self.translate(DRIVE_SPEED_MM_S * dt, world),
            Motion::Backward => self.translate(-DRIVE_SPEED_MM_S * dt, world),
            Motion::SpinLeft => {
                self.heading = wrap_angle(self.heading + SPIN_RATE_RAD_S * dt);
            }
            Motion::SpinRight => {
                self.heading = wrap_angle(self.heading - SPIN_RATE_RAD_S * dt);
            }
        }
    }

    fn translate(&mut self, distance: f32, world: &World) {
        self.pos_x += distance * cosf(self.heading);
        self.pos_y += distance * sinf(self.heading);

        // The rover has bumpers, not physics: clamp to the arena so a
        // late maneuver parks it against the wall instead of through it
        let a = &world.arena;
        self.pos_x = self.pos_x.max(a.min_x + HALF_SIZE).min(a.max_x - HALF_SIZE);
        self.pos_y = self.pos_y.max(a.min_y + HALF_SIZE).min(a.max_y - HALF_SIZE);

        for obj in &world.objects {
            if self.pos_x > obj.min_x - HALF_SIZE
                && self.pos_x < obj.max_x + HALF_SIZE
                && self.pos_y > obj.min_y - HALF_SIZE
                && self.pos_y < obj.max_y + HALF_SIZE
            {
                // Push out along the shallowest axis
                let pen_left = self.pos_x - (obj.min_x - HALF_SIZE);
                let pen_right = (obj.max_x + HALF_SIZE) - self.pos_x;
                let pen_bottom = self.pos_y - (obj.min_y - HALF_SIZE);
                let pen_top = (obj.max_y + HALF_SIZE) - self.pos_y;

                let min_pen = pen_left.min(pen_right).min(pen_bottom).min(pen_top);
                if min_pen == pen_left {
                    self.pos_x -= pen_left;
                } else if min_pen == pen_right {
                    self.pos_x += pen_right;
                } else if min_pen == pen_bottom {
                    self.pos_y -= pen_bottom;
                } else {
                    self.pos_y += pen_top;
                }
            }
        }
    }
}

pub fn wrap_angle(theta: f32) -> f32 {
    let wrapped = theta % (2.0 * PI);
    if wrapped < 0.0 {
        wrapped + 2.0 * PI
    } else {
        wrapped
    }
}
