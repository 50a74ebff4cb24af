//! Finite-state confidence model shared by every LZP cell.
//!
//! A state summarizes the recent match/mismatch streaks of one predictor context. The table is
//! generated once by exploring all reachable `(mismatches, matches, history)` triples, starting
//! from the empty one.
use std::sync::LazyLock;

use super::lg2::n_log2;

const LIMIT_X: i32 = 20;
const LIMIT_Y: i32 = 20;
const HISTORY_CLASSES: i32 = 3;
const SLOTS: usize = ((LIMIT_X + 1) * (LIMIT_Y + 1) * HISTORY_CLASSES * HISTORY_CLASSES) as usize;

/// Number of states, the state has to fit into the high byte of an LZP cell.
pub(crate) const STATES: usize = 256;

static STATE_TABLE: LazyLock<[[u8; 2]; STATES]> = LazyLock::new(|| Generator::new().run());

/// Returns the state following `state` after the prediction did (or did not) match.
#[inline(always)]
pub(crate) fn next_state(state: u8, matched: bool) -> u8 {
    STATE_TABLE[state as usize][matched as usize]
}

struct Generator {
    table: [[u8; 2]; STATES],
    slots: Vec<Option<u8>>,
    assigned: usize,
}

impl Generator {
    fn new() -> Self {
        Self {
            table: [[0; 2]; STATES],
            slots: vec![None; SLOTS],
            assigned: 0,
        }
    }

    fn run(mut self) -> [[u8; 2]; STATES] {
        self.visit(0, 0, 2, 2);
        debug_assert!(self.assigned < STATES);
        self.table
    }

    fn visit(&mut self, x: i32, y: i32, h1: i32, h0: i32) -> u8 {
        let x = x.min(LIMIT_X);
        let y = y.min(LIMIT_Y);
        let index = (((y * (LIMIT_X + 1) + x) * HISTORY_CLASSES + h1) * HISTORY_CLASSES + h0) as usize;

        if let Some(state) = self.slots[index] {
            return state;
        }

        let state = self.assigned as u8;
        self.slots[index] = Some(state);
        self.assigned += 1;

        self.table[state as usize][0] = self.visit(repeated(x, y), opposite(y), h0, 0);
        self.table[state as usize][1] = self.visit(opposite(x), repeated(y, x), h0, 1);

        state
    }
}

fn divisor(b: i32) -> i32 {
    (n_log2(b as u32) >> 3) + (n_log2(1950) >> 3) - (12 << 11)
}

/// Counter of the outcome that just repeated, scaled down once the other side is large.
fn repeated(a: i32, b: i32) -> i32 {
    if b > 0 && divisor(b) > 1200 {
        (a + 1) * 1950 / divisor(b)
    } else {
        a + 1
    }
}

/// Counter of the opposite outcome, scaled by the same rule.
fn opposite(b: i32) -> i32 {
    if b > 0 && divisor(b) > 1200 {
        b * 1950 / divisor(b)
    } else {
        b
    }
}
