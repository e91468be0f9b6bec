// Progression Engine: XP and levels
//
// XP only ever grows. Level is derived from XP through a strictly
// increasing table of cumulative thresholds and can never go down.

use crate::engine::{Engine, StateKey};
use crate::events::EconomyEvent;
use crate::types::LevelProgress;
use crate::utils::clamp;

/// Cumulative XP thresholds; `thresholds[i]` is the XP needed for level `i + 1`
#[derive(Debug, Clone, PartialEq)]
pub struct LevelTable {
    thresholds: Vec<u64>,
}

impl LevelTable {
    /// Expects a validated table: non-empty, starting at 0, strictly increasing
    pub fn new(thresholds: Vec<u64>) -> LevelTable {
        LevelTable { thresholds }
    }

    /// Highest reachable level
    pub fn max_level(&self) -> u32 {
        self.thresholds.len().max(1) as u32
    }

    /// Largest level whose threshold `xp` has reached
    pub fn level_for_xp(&self, xp: u64) -> u32 {
        let reached = self.thresholds.partition_point(|&t| t <= xp);
        reached.clamp(1, self.max_level() as usize) as u32
    }

    /// XP needed to be at `level` (1-based)
    pub fn threshold(&self, level: u32) -> u64 {
        let index = (level.max(1) - 1) as usize;
        self.thresholds
            .get(index)
            .or(self.thresholds.last())
            .copied()
            .unwrap_or(0)
    }

    /// XP needed for the level after `level`, if there is one
    pub fn next_threshold(&self, level: u32) -> Option<u64> {
        self.thresholds.get(level as usize).copied()
    }

    /// Progress bar state; saturates at 100% on the top level
    pub fn progress(&self, xp: u64, level: u32) -> LevelProgress {
        let current = self.threshold(level);
        let next = self.next_threshold(level).unwrap_or(current);

        let progress = xp.saturating_sub(current);
        let needed = next.saturating_sub(current);
        let percent = if needed == 0 {
            100.0
        } else {
            clamp(progress as f64 / needed as f64 * 100.0, 0.0, 100.0)
        };

        LevelProgress {
            progress,
            needed,
            percent,
        }
    }
}

impl Engine {
    pub fn xp(&self) -> u64 {
        self.xp
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn level_progress(&self) -> LevelProgress {
        self.levels.progress(self.xp, self.level)
    }

    /// Grant XP; normally driven by `place_bet`
    pub fn add_xp(&mut self, amount: f64) {
        self.grant_xp(amount);
        self.flush();
    }

    /// Add floored XP, then step through every level boundary it crosses
    ///
    /// One `level:up` fires per level gained; milestone levels unlock their
    /// achievements along the way.
    pub(crate) fn grant_xp(&mut self, amount: f64) {
        if !(amount > 0.0) || !amount.is_finite() {
            return;
        }

        self.xp = self.xp.saturating_add(amount.floor() as u64);
        self.mark(StateKey::Xp);

        while self.level < self.levels.max_level() {
            match self.levels.next_threshold(self.level) {
                Some(next) if self.xp >= next => {}
                _ => break,
            }

            self.level += 1;
            self.mark(StateKey::Level);
            log::debug!("Level up: {}", self.level);
            self.publish(EconomyEvent::LevelUp { level: self.level });

            if let Some(id) = self.config.level_milestones.get(&self.level).cloned() {
                self.unlock(&id);
            }
        }

        self.publish(EconomyEvent::XpChanged {
            xp: self.xp,
            level: self.level,
        });
    }
}
