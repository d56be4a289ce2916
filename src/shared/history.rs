// shared/history.rs
use ringbuffer::{ConstGenericRingBuffer, RingBuffer};

use crate::shared::{LOOP_RIGHTS_HIGH, LOOP_RIGHTS_LOW, TURN_HISTORY_LEN};

/// Sliding window of the most recent turn directions, Right=true.
/// Oldest entries fall out once the window is full; there is no way to
/// clear it.
pub struct TurnHistory {
    turns: ConstGenericRingBuffer<bool, TURN_HISTORY_LEN>,
}

impl TurnHistory {
    pub fn new() -> Self {
        Self {
            turns: ConstGenericRingBuffer::new(),
        }
    }

    /// Records a turn decision. Called right after the decision is made,
    /// before the maneuver executes, so history stays consistent with
    /// intent even if the maneuver never finishes.
    pub fn record(&mut self, right: bool) {
        self.turns.push(right);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn count_rights(&self) -> usize {
        self.turns.iter().filter(|&&right| right).count()
    }

    /// Majority-bias detector. Needs a full window of evidence; below
    /// that it always says no, so startup cannot false-positive. An
    /// exactly alternating L-R-L-R pattern is balanced and will not
    /// trip this; that is a known limitation of the heuristic.
    pub fn is_looping(&self) -> bool {
        if self.turns.len() < TURN_HISTORY_LEN {
            return false;
        }
        let rights = self.count_rights();
        rights >= LOOP_RIGHTS_HIGH || rights <= LOOP_RIGHTS_LOW
    }
}
