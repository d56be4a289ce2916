// shared/burst.rs
use crate::shared::BURST_WINDOW_US;

/// Time-windowed counter of close-range detections. A run of obstacle
/// events each within BURST_WINDOW_US of the previous one signals
/// spatial entrapment rather than an isolated object.
pub struct ObstacleBurstTracker {
    last_obstacle_ts: u64,
    count: u32,
}

impl ObstacleBurstTracker {
    pub fn new() -> Self {
        Self {
            last_obstacle_ts: 0,
            count: 0,
        }
    }

    /// Registers an obstacle event at `now_us` and returns the updated
    /// burst count, always >= 1.
    pub fn on_obstacle(&mut self, now_us: u64) -> u32 {
        let elapsed = now_us.saturating_sub(self.last_obstacle_ts);
        if elapsed < BURST_WINDOW_US {
            self.count += 1;
        } else {
            self.count = 1;
        }
        self.last_obstacle_ts = now_us;
        self.count
    }

    /// Hysteresis release: one clear reading wipes burst memory, even if
    /// the very next reading starts a new obstacle.
    pub fn clear(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_obstacle_after_long_gap_counts_one() {
        let mut burst = ObstacleBurstTracker::new();
        assert_eq!(burst.on_obstacle(10_000_000), 1);
    }

    #[test]
    fn events_within_window_increment_monotonically() {
        let mut burst = ObstacleBurstTracker::new();
        assert_eq!(burst.on_obstacle(2_000_000), 1);
        assert_eq!(burst.on_obstacle(2_600_000), 2);
        assert_eq!(burst.on_obstacle(3_200_000), 3);
        assert_eq!(burst.on_obstacle(3_800_000), 4);
    }

    #[test]
    fn gap_at_window_resets_to_one() {
        let mut burst = ObstacleBurstTracker::new();
        burst.on_obstacle(2_000_000);
        burst.on_obstacle(2_500_000);
        // Exactly the window width is not "within" it
        assert_eq!(burst.on_obstacle(2_500_000 + BURST_WINDOW_US), 1);
    }

    #[test]
    fn clear_discards_stale_count() {
        let mut burst = ObstacleBurstTracker::new();
        burst.on_obstacle(2_000_000);
        burst.on_obstacle(2_400_000);
        burst.clear();
        assert_eq!(burst.count(), 0);
        // Next event is close in time to the previous one, but the clear
        // reading in between means it starts a fresh burst
        assert_eq!(burst.on_obstacle(2_800_000), 1);
    }
}
