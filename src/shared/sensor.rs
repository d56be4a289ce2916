// shared/sensor.rs

/// Value reported when no echo comes back within the timeout. Must stay
/// well above DIST_LIMIT_CM so a dead sensor reads as a clear path
/// rather than a wall.
pub const DIST_SENTINEL_CM: u16 = 250;

/// Upper bound on the echo wait so the control loop cannot stall on a
/// missing pulse
pub const ECHO_TIMEOUT_US: u64 = 25_000;

// Round-trip microseconds of sound per centimeter of range
const US_PER_CM_ROUND_TRIP: u64 = 58;

/// Forward-facing distance sensor seam. One call, one pulse; a timeout
/// is folded into the sentinel and never surfaces as an error.
pub trait DistanceSensor {
    fn measure(&mut self) -> u16;
}

/// Converts a measured echo pulse width to centimeters. `None` means the
/// echo never arrived within ECHO_TIMEOUT_US.
pub fn pulse_to_cm(pulse_us: Option<u64>) -> u16 {
    match pulse_us {
        Some(us) => (us / US_PER_CM_ROUND_TRIP) as u16,
        None => DIST_SENTINEL_CM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_sentinel() {
        assert_eq!(pulse_to_cm(None), DIST_SENTINEL_CM);
    }

    #[test]
    fn pulse_converts_at_speed_of_sound() {
        assert_eq!(pulse_to_cm(Some(580)), 10);
        assert_eq!(pulse_to_cm(Some(1740)), 30);
        assert_eq!(pulse_to_cm(Some(0)), 0);
    }

    #[test]
    fn longest_pulse_within_timeout_stays_in_range() {
        // 25 ms of waiting corresponds to a bit over 4 m of range
        assert_eq!(pulse_to_cm(Some(ECHO_TIMEOUT_US)), 431);
    }
}
