// shared/avoidance.rs
use crate::shared::burst::ObstacleBurstTracker;
use crate::shared::history::TurnHistory;
use crate::shared::sensor::DistanceSensor;
use crate::shared::{
    Actuator, Clock, TurnRng, BACK_MS_BASE, BURST_LOOP_THRESHOLD, CLEAR_LIMIT_CM, CYCLE_IDLE_MS,
    DIST_LIMIT_CM, LOG_DISTANCE, LOG_MANEUVER, LOOP_BACK_BONUS_MS, LOOP_TURN_BONUS_MS,
    PAUSE_AFTER_STEP_MS, PAUSE_BEFORE_REVERSE_MS, TURN_HISTORY_LEN, TURN_MS_BASE,
};

/// One executed stop-reverse-turn maneuver, as decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Maneuver {
    pub burst_count: u32,
    pub looping: bool,
    pub turn_right: bool,
    pub back_ms: u64,
    pub turn_ms: u64,
}

/// What one control cycle saw and did.
#[derive(Clone, Copy, Debug)]
pub struct TickOutcome {
    pub distance_cm: u16,
    pub maneuver: Option<Maneuver>,
}

/// The decision core. Owns all mutable state exclusively; one value per
/// vehicle, one tick per control cycle, no concurrency anywhere.
pub struct AvoidanceController<S, A, C, R> {
    sensor: S,
    actuator: A,
    clock: C,
    turn_rng: R,
    turns: TurnHistory,
    burst: ObstacleBurstTracker,
}

impl<S, A, C, R> AvoidanceController<S, A, C, R>
where
    S: DistanceSensor,
    A: Actuator,
    C: Clock,
    R: TurnRng,
{
    pub fn new(sensor: S, actuator: A, clock: C, turn_rng: R) -> Self {
        Self {
            sensor,
            actuator,
            clock,
            turn_rng,
            turns: TurnHistory::new(),
            burst: ObstacleBurstTracker::new(),
        }
    }

    pub fn burst_count(&self) -> u32 {
        self.burst.count()
    }

    pub fn turns(&self) -> &TurnHistory {
        &self.turns
    }

    /// One control cycle: poll, classify, maneuver or drive on, idle.
    ///
    /// The clear check runs every cycle before classification. With the
    /// limits equal, a reading exactly on the boundary is "not clear"
    /// and therefore an obstacle.
    pub fn tick(&mut self) -> TickOutcome {
        let distance_cm = self.sensor.measure();
        if LOG_DISTANCE {
            println!("distance: {} cm", distance_cm);
        }

        if distance_cm > CLEAR_LIMIT_CM {
            self.burst.clear();
        }

        let maneuver = if distance_cm <= DIST_LIMIT_CM {
            Some(self.handle_obstacle())
        } else {
            self.actuator.forward();
            None
        };

        self.clock.sleep_ms(CYCLE_IDLE_MS);

        TickOutcome {
            distance_cm,
            maneuver,
        }
    }

    /// Stop-reverse-turn, with dwell times escalated when the vehicle
    /// judges itself to be cycling. Escalation never changes strategy,
    /// only how long the maneuver lasts.
    fn handle_obstacle(&mut self) -> Maneuver {
        let now = self.clock.now_us();
        let burst_count = self.burst.on_obstacle(now);

        // Two independent entrapment signals fused into one flag:
        // directional bias over the last 8 turns, obstacle density in time
        let looping = self.turns.is_looping() || burst_count >= BURST_LOOP_THRESHOLD;

        let back_ms = BACK_MS_BASE + if looping { LOOP_BACK_BONUS_MS } else { 0 };
        let turn_ms = TURN_MS_BASE + if looping { LOOP_TURN_BONUS_MS } else { 0 };

        // Unbiased pick normally; when looping, turn away from the
        // dominant recent direction (ties go right)
        let turn_right = if looping {
            self.turns.count_rights() <= TURN_HISTORY_LEN / 2
        } else {
            self.turn_rng.random_right()
        };

        // Recorded before executing so the decision is reflected in
        // later loop checks even if the maneuver is cut short
        self.turns.record(turn_right);

        if LOG_MANEUVER {
            println!(
                "maneuver: burst={} looping={} right={} back={}ms turn={}ms",
                burst_count, looping, turn_right, back_ms, turn_ms
            );
        }

        self.actuator.stop();
        self.clock.sleep_ms(PAUSE_BEFORE_REVERSE_MS);
        self.actuator.backward();
        self.clock.sleep_ms(back_ms);
        self.actuator.stop();
        self.clock.sleep_ms(PAUSE_AFTER_STEP_MS);
        if turn_right {
            self.actuator.spin_right(turn_ms);
        } else {
            self.actuator.spin_left(turn_ms);
        }
        self.actuator.stop();
        self.clock.sleep_ms(PAUSE_AFTER_STEP_MS);

        Maneuver {
            burst_count,
            looping,
            turn_right,
            back_ms,
            turn_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::sensor::DIST_SENTINEL_CM;
    use crate::shared::DriveCommand;
    use std::collections::VecDeque;

    struct ScriptSensor {
        readings: VecDeque<u16>,
    }

    impl ScriptSensor {
        fn new(readings: &[u16]) -> Self {
            Self {
                readings: readings.iter().copied().collect(),
            }
        }
    }

    impl DistanceSensor for ScriptSensor {
        fn measure(&mut self) -> u16 {
            self.readings.pop_front().unwrap_or(DIST_SENTINEL_CM)
        }
    }

    #[derive(Default)]
    struct RecordingActuator {
        commands: Vec<DriveCommand>,
    }

    impl Actuator for RecordingActuator {
        fn stop(&mut self) {
            self.commands.push(DriveCommand::Stop);
        }
        fn forward(&mut self) {
            self.commands.push(DriveCommand::Forward);
        }
        fn backward(&mut self) {
            self.commands.push(DriveCommand::Backward);
        }
        fn spin_left(&mut self, duration_ms: u64) {
            self.commands.push(DriveCommand::SpinLeft(duration_ms));
        }
        fn spin_right(&mut self, duration_ms: u64) {
            self.commands.push(DriveCommand::SpinRight(duration_ms));
        }
    }

    struct TestClock {
        now_us: u64,
        sleeps_ms: Vec<u64>,
    }

    impl TestClock {
        fn at(now_us: u64) -> Self {
            Self {
                now_us,
                sleeps_ms: Vec::new(),
            }
        }
    }

    impl Clock for TestClock {
        fn now_us(&self) -> u64 {
            self.now_us
        }
        fn sleep_ms(&mut self, ms: u64) {
            self.now_us += ms * 1000;
            self.sleeps_ms.push(ms);
        }
    }

    struct ScriptRng {
        picks: VecDeque<bool>,
    }

    impl ScriptRng {
        fn new(picks: &[bool]) -> Self {
            Self {
                picks: picks.iter().copied().collect(),
            }
        }
    }

    impl TurnRng for ScriptRng {
        fn random_right(&mut self) -> bool {
            self.picks.pop_front().expect("ran out of scripted picks")
        }
    }

    type TestController = AvoidanceController<ScriptSensor, RecordingActuator, TestClock, ScriptRng>;

    fn controller(readings: &[u16], start_us: u64, picks: &[bool]) -> TestController {
        AvoidanceController::new(
            ScriptSensor::new(readings),
            RecordingActuator::default(),
            TestClock::at(start_us),
            ScriptRng::new(picks),
        )
    }

    #[test]
    fn clear_path_only_drives_forward() {
        let mut ctl = controller(&[40, 100, 250, 31], 0, &[]);
        for _ in 0..4 {
            let outcome = ctl.tick();
            assert!(outcome.maneuver.is_none());
        }
        assert_eq!(
            ctl.actuator.commands,
            vec![DriveCommand::Forward; 4],
        );
        assert_eq!(ctl.burst_count(), 0);
    }

    #[test]
    fn sentinel_reading_is_always_a_free_path() {
        let mut ctl = controller(&[DIST_SENTINEL_CM], 0, &[]);
        let outcome = ctl.tick();
        assert!(outcome.maneuver.is_none());
        assert_eq!(ctl.actuator.commands, vec![DriveCommand::Forward]);
    }

    #[test]
    fn boundary_reading_is_an_obstacle() {
        // 30 cm is not "clear" (strict >) and is an obstacle (<=)
        let mut ctl = controller(&[DIST_LIMIT_CM], 5_000_000, &[true]);
        let outcome = ctl.tick();
        assert!(outcome.maneuver.is_some());
    }

    #[test]
    fn obstacle_after_long_clear_starts_burst_at_one() {
        let mut ctl = controller(&[10], 10_000_000, &[false]);
        let outcome = ctl.tick();
        let maneuver = outcome.maneuver.unwrap();
        assert_eq!(maneuver.burst_count, 1);
        assert!(!maneuver.looping);
    }

    #[test]
    fn maneuver_sequence_and_pauses_are_exact() {
        let mut ctl = controller(&[12], 3_000_000, &[true]);
        ctl.tick();
        assert_eq!(
            ctl.actuator.commands,
            vec![
                DriveCommand::Stop,
                DriveCommand::Backward,
                DriveCommand::Stop,
                DriveCommand::SpinRight(TURN_MS_BASE),
                DriveCommand::Stop,
            ],
        );
        assert_eq!(
            ctl.clock.sleeps_ms,
            vec![
                PAUSE_BEFORE_REVERSE_MS,
                BACK_MS_BASE,
                PAUSE_AFTER_STEP_MS,
                PAUSE_AFTER_STEP_MS,
                CYCLE_IDLE_MS,
            ],
        );
    }

    #[test]
    fn burst_of_four_forces_looping_and_escalates_durations() {
        // Four obstacle cycles back to back; the maneuver plus the idle
        // pause keeps consecutive obstacle events inside the 1.5 s window
        let mut ctl = controller(&[10, 10, 10, 10], 2_000_000, &[true, false, true]);
        let mut maneuvers = Vec::new();
        for _ in 0..4 {
            maneuvers.push(ctl.tick().maneuver.unwrap());
        }
        assert_eq!(
            maneuvers.iter().map(|m| m.burst_count).collect::<Vec<_>>(),
            vec![1, 2, 3, 4],
        );
        assert_eq!(
            maneuvers.iter().map(|m| m.looping).collect::<Vec<_>>(),
            vec![false, false, false, true],
        );
        for m in &maneuvers[..3] {
            assert_eq!(m.back_ms, BACK_MS_BASE);
            assert_eq!(m.turn_ms, TURN_MS_BASE);
        }
        let escalated = &maneuvers[3];
        assert_eq!(escalated.back_ms, BACK_MS_BASE + LOOP_BACK_BONUS_MS);
        assert_eq!(escalated.turn_ms, TURN_MS_BASE + LOOP_TURN_BONUS_MS);
    }

    #[test]
    fn history_bias_turns_away_from_dominant_side() {
        let mut ctl = controller(&[15], 20_000_000, &[]);
        // Seven rights and one left on record: looping by history alone,
        // even though this is the first obstacle of its burst
        ctl.turns.record(false);
        for _ in 0..7 {
            ctl.turns.record(true);
        }
        let maneuver = ctl.tick().maneuver.unwrap();
        assert_eq!(maneuver.burst_count, 1);
        assert!(maneuver.looping);
        // 7 rights > 4, so the bias rule picks left
        assert!(!maneuver.turn_right);
        assert!(ctl
            .actuator
            .commands
            .contains(&DriveCommand::SpinLeft(TURN_MS_BASE + LOOP_TURN_BONUS_MS)));
    }

    #[test]
    fn left_heavy_history_biases_right_on_tie_rule() {
        let mut ctl = controller(&[15], 20_000_000, &[]);
        for _ in 0..8 {
            ctl.turns.record(false);
        }
        let maneuver = ctl.tick().maneuver.unwrap();
        assert!(maneuver.looping);
        // 0 rights <= 4: go right
        assert!(maneuver.turn_right);
    }

    #[test]
    fn short_identical_history_does_not_loop() {
        let mut ctl = controller(&[15], 20_000_000, &[true]);
        for _ in 0..7 {
            ctl.turns.record(true);
        }
        let maneuver = ctl.tick().maneuver.unwrap();
        // Burst is 1 and history is one short of a full window
        assert!(!maneuver.looping);
        assert_eq!(maneuver.back_ms, BACK_MS_BASE);
    }

    #[test]
    fn end_to_end_burst_reset_scenario() {
        // Readings per tick: obstacles, one clear gap, then a burst that
        // escalates on its fourth event
        let readings = [10, 10, 10, 40, 10, 10, 10, 10];
        let picks = [true, false, true, false, true, false];
        let mut ctl = controller(&readings, 2_000_000, &picks);

        let mut bursts = Vec::new();
        let mut loopings = Vec::new();
        for (i, _) in readings.iter().enumerate() {
            let outcome = ctl.tick();
            match outcome.maneuver {
                Some(m) => {
                    bursts.push(m.burst_count);
                    loopings.push(m.looping);
                }
                None => {
                    assert_eq!(i, 3);
                    assert_eq!(ctl.burst_count(), 0);
                }
            }
        }

        assert_eq!(bursts, vec![1, 2, 3, 1, 2, 3, 4]);
        assert_eq!(
            loopings,
            vec![false, false, false, false, false, false, true],
        );
        // Seven maneuvers leave seven recorded turns. The forced turn at
        // the end saw 6 entries with 3 rights, 3 <= 4, so it went right
        assert_eq!(ctl.turns().len(), 7);
        assert_eq!(ctl.turns().count_rights(), 4);
    }
}
