// events.rs
use murkkusw::shared::avoidance::Maneuver;
use murkkusw::shared::burst::ObstacleBurstTracker;
use murkkusw::shared::history::TurnHistory;
use murkkusw::shared::{
    DriveCommand, BACK_MS_BASE, BURST_LOOP_THRESHOLD, CLEAR_LIMIT_CM, DIST_LIMIT_CM,
    LOOP_BACK_BONUS_MS, LOOP_TURN_BONUS_MS, TURN_HISTORY_LEN, TURN_MS_BASE,
};
use serde_json::{json, Value};
use std::error::Error;

/// One line of the simulation log. Timestamps are virtual microseconds.
#[derive(Clone, Copy, Debug)]
pub enum LogEvent {
    Distance(u64, u16),
    Drive(u64, DriveCommand),
    Maneuver(u64, Maneuver),
    Pose(u64, f32, f32, f32),
}

pub fn get_ts(event: &LogEvent) -> u64 {
    match event {
        LogEvent::Distance(ts, ..) => *ts,
        LogEvent::Drive(ts, ..) => *ts,
        LogEvent::Maneuver(ts, ..) => *ts,
        LogEvent::Pose(ts, ..) => *ts,
    }
}

pub fn serialize_event(event: &LogEvent) -> String {
    let v = match event {
        LogEvent::Distance(ts, cm) => json!(["Distance", ts, cm]),
        LogEvent::Drive(ts, cmd) => {
            let (name, dur) = match cmd {
                DriveCommand::Stop => ("Stop", 0),
                DriveCommand::Forward => ("Forward", 0),
                DriveCommand::Backward => ("Backward", 0),
                DriveCommand::SpinLeft(ms) => ("SpinLeft", *ms),
                DriveCommand::SpinRight(ms) => ("SpinRight", *ms),
            };
            json!(["Drive", ts, name, dur])
        }
        LogEvent::Maneuver(ts, m) => json!([
            "Maneuver",
            ts,
            m.burst_count,
            m.looping,
            if m.turn_right { "R" } else { "L" },
            m.back_ms,
            m.turn_ms
        ]),
        LogEvent::Pose(ts, x, y, heading) => json!(["Pose", ts, x, y, heading]),
    };
    v.to_string()
}

pub fn parse_event(line: &str) -> Result<LogEvent, Box<dyn Error>> {
    let v: Vec<Value> = serde_json::from_str(line)?;

    if v.is_empty() {
        return Err("Empty event".into());
    }

    let typ = v[0].as_str().ok_or("No type")?;
    let ts = v.get(1).and_then(Value::as_u64).ok_or("No timestamp")?;

    match typ {
        "Distance" => {
            if v.len() != 3 {
                return Err("Invalid Distance event length".into());
            }
            let cm = v[2].as_u64().ok_or("Invalid distance")? as u16;
            Ok(LogEvent::Distance(ts, cm))
        }
        "Drive" => {
            if v.len() != 4 {
                return Err("Invalid Drive event length".into());
            }
            let name = v[2].as_str().ok_or("Invalid command")?;
            let dur = v[3].as_u64().ok_or("Invalid duration")?;
            let cmd = match name {
                "Stop" => DriveCommand::Stop,
                "Forward" => DriveCommand::Forward,
                "Backward" => DriveCommand::Backward,
                "SpinLeft" => DriveCommand::SpinLeft(dur),
                "SpinRight" => DriveCommand::SpinRight(dur),
                _ => return Err("Unknown drive command".into()),
            };
            Ok(LogEvent::Drive(ts, cmd))
        }
        "Maneuver" => {
            if v.len() != 7 {
                return Err("Invalid Maneuver event length".into());
            }
            let burst_count = v[2].as_u64().ok_or("Invalid burst count")? as u32;
            let looping = v[3].as_bool().ok_or("Invalid looping flag")?;
            let turn_right = match v[4].as_str().ok_or("Invalid direction")? {
                "R" => true,
                "L" => false,
                _ => return Err("Unknown direction".into()),
            };
            let back_ms = v[5].as_u64().ok_or("Invalid back duration")?;
            let turn_ms = v[6].as_u64().ok_or("Invalid turn duration")?;
            Ok(LogEvent::Maneuver(
                ts,
                Maneuver {
                    burst_count,
                    looping,
                    turn_right,
                    back_ms,
                    turn_ms,
                },
            ))
        }
        "Pose" => {
            if v.len() != 5 {
                return Err("Invalid Pose event length".into());
            }
            let x = v[2].as_f64().ok_or("Invalid x")? as f32;
            let y = v[3].as_f64().ok_or("Invalid y")? as f32;
            let heading = v[4].as_f64().ok_or("Invalid heading")? as f32;
            Ok(LogEvent::Pose(ts, x, y, heading))
        }
        _ => Err("Unknown event type".into()),
    }
}

/// Expected maneuver parameters derived from the Distance stream alone.
/// The turn direction is only predictable when looping forces the bias
/// rule; otherwise the logged pick was random.
pub struct ExpectedManeuver {
    pub burst_count: u32,
    pub looping: bool,
    pub back_ms: u64,
    pub turn_ms: u64,
    pub forced_right: Option<bool>,
}

/// Re-runs the decision state over a recorded log. Burst counts and
/// looping flags are recomputed from Distance events; logged turn
/// directions are adopted into the mirrored history so later bias
/// checks line up with what the vehicle actually did.
pub struct ReplayMirror {
    turns: TurnHistory,
    burst: ObstacleBurstTracker,
    pending: Option<ExpectedManeuver>,
}

impl ReplayMirror {
    pub fn new() -> Self {
        Self {
            turns: TurnHistory::new(),
            burst: ObstacleBurstTracker::new(),
            pending: None,
        }
    }

    pub fn on_distance(&mut self, ts: u64, cm: u16) {
        if cm > CLEAR_LIMIT_CM {
            self.burst.clear();
        }
        if cm <= DIST_LIMIT_CM {
            let burst_count = self.burst.on_obstacle(ts);
            let looping = self.turns.is_looping() || burst_count >= BURST_LOOP_THRESHOLD;
            self.pending = Some(ExpectedManeuver {
                burst_count,
                looping,
                back_ms: BACK_MS_BASE + if looping { LOOP_BACK_BONUS_MS } else { 0 },
                turn_ms: TURN_MS_BASE + if looping { LOOP_TURN_BONUS_MS } else { 0 },
                forced_right: if looping {
                    Some(self.turns.count_rights() <= TURN_HISTORY_LEN / 2)
                } else {
                    None
                },
            });
        }
    }

    /// Checks a logged maneuver against the expectation from the most
    /// recent obstacle reading. Returns a description of the first
    /// discrepancy, if any.
    pub fn check_maneuver(&mut self, logged: &Maneuver) -> Option<String> {
        let expected = match self.pending.take() {
            Some(e) => e,
            None => return Some("maneuver without a preceding obstacle reading".into()),
        };

        let mut mismatch = None;
        if logged.burst_count != expected.burst_count {
            mismatch = Some(format!(
                "burst count {} (expected {})",
                logged.burst_count, expected.burst_count
            ));
        } else if logged.looping != expected.looping {
            mismatch = Some(format!(
                "looping {} (expected {})",
                logged.looping, expected.looping
            ));
        } else if logged.back_ms != expected.back_ms || logged.turn_ms != expected.turn_ms {
            mismatch = Some(format!(
                "durations {}/{} ms (expected {}/{} ms)",
                logged.back_ms, logged.turn_ms, expected.back_ms, expected.turn_ms
            ));
        } else if let Some(forced) = expected.forced_right {
            if logged.turn_right != forced {
                mismatch = Some(format!(
                    "turn direction {} (bias rule expected {})",
                    if logged.turn_right { "R" } else { "L" },
                    if forced { "R" } else { "L" }
                ));
            }
        }

        // Adopt the logged decision regardless, so the mirrored history
        // keeps tracking the vehicle
        self.turns.record(logged.turn_right);
        mismatch
    }
}
