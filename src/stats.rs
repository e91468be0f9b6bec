// Statistics Aggregator
//
// Running totals only; nothing is ever recomputed from history.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::achievements::ids;
use crate::config::EconomyConfig;
use crate::engine::{Engine, StateKey};
use crate::events::EconomyEvent;
use crate::types::{EconomyError, Result, StatsDelta, Timestamp};
use crate::utils::round2;

/// Aggregate play statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Statistics {
    pub total_wagered: f64,
    pub total_won: f64,
    pub biggest_win: f64,
    /// Game name -> rounds played
    pub games_played: BTreeMap<String, u64>,
    pub session_start: Timestamp,
    pub lowest_balance: f64,
    pub consecutive_wins: u32,
    pub daily_streak: u32,
}

impl Statistics {
    /// Record for a brand new player
    pub fn fresh(config: &EconomyConfig, now: Timestamp) -> Statistics {
        Statistics {
            total_wagered: 0.0,
            total_won: 0.0,
            biggest_win: 0.0,
            games_played: config.games.iter().map(|g| (g.clone(), 0)).collect(),
            session_start: now,
            lowest_balance: config.starting_balance,
            consecutive_wins: 0,
            daily_streak: 0,
        }
    }

    /// Decode a stored record one field at a time
    ///
    /// Missing or mistyped fields keep the value a fresh player under
    /// `config` would have, and each game counter is read on its own. Fails
    /// only when the record is not a JSON object.
    pub(crate) fn from_stored(raw: &str, config: &EconomyConfig) -> Result<Statistics> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(record) = value else {
            return Err(EconomyError::Serialization(
                "stats record is not an object".to_string(),
            ));
        };

        let mut stats = Statistics::fresh(config, 0);
        read_field(&record, "totalWagered", &mut stats.total_wagered);
        read_field(&record, "totalWon", &mut stats.total_won);
        read_field(&record, "biggestWin", &mut stats.biggest_win);
        read_field(&record, "sessionStart", &mut stats.session_start);
        read_field(&record, "lowestBalance", &mut stats.lowest_balance);
        read_field(&record, "consecutiveWins", &mut stats.consecutive_wins);
        read_field(&record, "dailyStreak", &mut stats.daily_streak);

        match record.get("gamesPlayed") {
            None => {}
            Some(Value::Object(games)) => {
                for (game, count) in games {
                    match count.as_u64() {
                        Some(count) => {
                            stats.games_played.insert(game.clone(), count);
                        }
                        None => log::warn!("Ignoring stored play count for {}: {}", game, count),
                    }
                }
            }
            Some(other) => log::warn!("Ignoring stored gamesPlayed: {}", other),
        }

        stats.normalize(config);
        Ok(stats)
    }

    /// Repair a record loaded from storage
    pub(crate) fn normalize(&mut self, config: &EconomyConfig) {
        for value in [&mut self.total_wagered, &mut self.total_won, &mut self.biggest_win] {
            *value = if value.is_finite() { round2(value.max(0.0)) } else { 0.0 };
        }
        if !self.lowest_balance.is_finite() || self.lowest_balance < 0.0 {
            self.lowest_balance = config.starting_balance;
        }
        for game in &config.games {
            self.games_played.entry(game.clone()).or_insert(0);
        }
    }

    /// True once every listed game has been played at least once
    pub fn has_played_all(&self, games: &[String]) -> bool {
        !games.is_empty()
            && games
                .iter()
                .all(|g| self.games_played.get(g).copied().unwrap_or(0) > 0)
    }

    /// Apply a sparse delta; `current_balance` feeds the lowest-balance mark
    pub fn apply(&mut self, delta: &StatsDelta, current_balance: f64) {
        if let Some(wagered) = delta.total_wagered.filter(|v| v.is_finite() && *v > 0.0) {
            self.total_wagered = round2(self.total_wagered + wagered);
        }

        if let Some(won) = delta.total_won.filter(|v| v.is_finite() && *v > 0.0) {
            self.total_won = round2(self.total_won + won);
            if won > self.biggest_win {
                self.biggest_win = round2(won);
            }
            self.consecutive_wins += 1;
        }

        if delta.no_win {
            self.consecutive_wins = 0;
        }

        if let Some(game) = &delta.game {
            *self.games_played.entry(game.clone()).or_insert(0) += 1;
        }

        if current_balance < self.lowest_balance {
            self.lowest_balance = current_balance;
        }
    }
}

fn read_field<T: DeserializeOwned>(record: &Map<String, Value>, name: &str, slot: &mut T) {
    let Some(value) = record.get(name) else {
        return;
    };
    match T::deserialize(value) {
        Ok(parsed) => *slot = parsed,
        Err(e) => log::warn!("Ignoring stored stats field {}: {}", name, e),
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Statistics::fresh(&EconomyConfig::default(), 0)
    }
}

impl Engine {
    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Fold a delta into the statistics and fire any threshold achievements
    pub fn update_stats(&mut self, delta: &StatsDelta) {
        self.record_stats(delta);
        self.flush();
    }

    pub(crate) fn record_stats(&mut self, delta: &StatsDelta) {
        self.stats.apply(delta, self.balance);
        self.mark(StateKey::Stats);

        let won = delta.total_won.is_some_and(|v| v.is_finite() && v > 0.0);
        if won {
            if self.stats.consecutive_wins >= self.config.lucky_streak_length {
                self.unlock(ids::LUCKY_STREAK);
            }
            if self.stats.total_won >= self.config.whale_total_won {
                self.unlock(ids::WHALE);
            }
        }
        if delta.game.is_some() && self.stats.has_played_all(&self.config.games) {
            self.unlock(ids::DIVERSIFIED);
        }

        self.publish(EconomyEvent::StatsUpdated(self.stats.clone()));
    }
}
