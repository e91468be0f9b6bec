// Economy configuration for GamblingDen Core
//
// Every tunable number the engine uses lives here. The defaults are the
// values the live site ships with; hosts may load a JSON override.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{EconomyError, Result};

/// Cumulative XP needed for each level (index 0 = level 1)
pub const DEFAULT_LEVEL_THRESHOLDS: [u64; 50] = [
    0, 100, 250, 500, 800, 1200, 1700, 2300, 3000, 4000, 5200, 6600, 8200,
    10000, 12500, 15500, 19000, 23000, 28000, 34000, 41000, 49000, 58000, 68000,
    80000, 95000, 112000, 132000, 155000, 182000, 215000, 255000, 302000,
    358000, 425000, 505000, 600000, 715000, 850000, 1010000, 1200000, 1430000,
    1700000, 2020000, 2400000, 2850000, 3400000, 4050000, 4820000, 5750000,
];

/// Daily wheel prizes in wheel order
pub const DEFAULT_WHEEL_PRIZES: [f64; 8] = [10.0, 25.0, 50.0, 15.0, 100.0, 20.0, 35.0, 75.0];

/// Longest allowed gap between time-achievement checks (one day)
pub const MAX_TIME_CHECK_INTERVAL_SECS: i64 = 86_400;

/// Longest allowed marathon session (one week)
pub const MAX_MARATHON_MINUTES: i64 = 10_080;

/// One slice of the daily bonus wheel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelSegment {
    pub prize: f64,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EconomyConfig {
    pub starting_balance: f64,
    pub xp_per_unit_wagered: f64,
    pub level_thresholds: Vec<u64>,
    /// Level reached -> achievement id
    pub level_milestones: BTreeMap<u32, String>,
    pub high_roller_bet: f64,
    pub lucky_streak_length: u32,
    pub whale_total_won: f64,
    /// Comeback: lowest balance must have dropped below this...
    pub comeback_floor: f64,
    /// ...and a win must lift the balance to at least this
    pub comeback_target: f64,
    /// Local hour window [start, end) for the night owl achievement
    pub night_owl_start_hour: u32,
    pub night_owl_end_hour: u32,
    pub marathon_minutes: i64,
    pub time_check_interval_secs: i64,
    pub daily_streak_target: u32,
    /// Games seeded into the play counters; playing all of them unlocks "diversified"
    pub games: Vec<String>,
    pub wheel_segments: Vec<WheelSegment>,
    pub storage_namespace: String,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        let level_milestones = [(10, "level_10"), (25, "level_25"), (50, "level_50")]
            .into_iter()
            .map(|(level, id)| (level, id.to_string()))
            .collect();

        EconomyConfig {
            starting_balance: 100.0,
            xp_per_unit_wagered: 10.0,
            level_thresholds: DEFAULT_LEVEL_THRESHOLDS.to_vec(),
            level_milestones,
            high_roller_bet: 10.0,
            lucky_streak_length: 5,
            whale_total_won: 1000.0,
            comeback_floor: 10.0,
            comeback_target: 100.0,
            night_owl_start_hour: 0,
            night_owl_end_hour: 4,
            marathon_minutes: 30,
            time_check_interval_secs: 60,
            daily_streak_target: 7,
            games: ["slots", "blackjack", "crash", "scratch"]
                .iter()
                .map(|g| g.to_string())
                .collect(),
            wheel_segments: DEFAULT_WHEEL_PRIZES
                .iter()
                .map(|&prize| WheelSegment { prize, weight: 1 })
                .collect(),
            storage_namespace: "gd_".to_string(),
        }
    }
}

impl EconomyConfig {
    /// Parse a (possibly partial) JSON config; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EconomyConfig = serde_json::from_str(json)
            .map_err(|e| EconomyError::Config(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.level_thresholds.first() {
            None => return Err(EconomyError::Config("levelThresholds is empty".to_string())),
            Some(&first) if first != 0 => {
                return Err(EconomyError::Config(format!(
                    "levelThresholds must start at 0, got {}",
                    first
                )))
            }
            Some(_) => {}
        }

        if let Some(pair) = self.level_thresholds.windows(2).find(|w| w[1] <= w[0]) {
            return Err(EconomyError::Config(format!(
                "levelThresholds must be strictly increasing ({} then {})",
                pair[0], pair[1]
            )));
        }

        if !(self.xp_per_unit_wagered.is_finite() && self.xp_per_unit_wagered > 0.0) {
            return Err(EconomyError::Config(
                "xpPerUnitWagered must be positive".to_string(),
            ));
        }

        if !(self.starting_balance.is_finite() && self.starting_balance >= 0.0) {
            return Err(EconomyError::Config(
                "startingBalance must be non-negative".to_string(),
            ));
        }

        let total_weight: u64 = self.wheel_segments.iter().map(|s| s.weight as u64).sum();
        if total_weight == 0 || total_weight > u32::MAX as u64 {
            return Err(EconomyError::Config(
                "wheelSegments need a total weight in 1..=u32::MAX".to_string(),
            ));
        }

        if self.night_owl_start_hour > 23 || self.night_owl_end_hour > 24 {
            return Err(EconomyError::Config("night owl hours out of range".to_string()));
        }

        if !(1..=MAX_TIME_CHECK_INTERVAL_SECS).contains(&self.time_check_interval_secs) {
            return Err(EconomyError::Config(format!(
                "timeCheckIntervalSecs must be within 1..={}",
                MAX_TIME_CHECK_INTERVAL_SECS
            )));
        }

        if !(1..=MAX_MARATHON_MINUTES).contains(&self.marathon_minutes) {
            return Err(EconomyError::Config(format!(
                "marathonMinutes must be within 1..={}",
                MAX_MARATHON_MINUTES
            )));
        }

        Ok(())
    }
}
