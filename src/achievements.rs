// Achievement Engine
//
// A fixed table of one-time rewards. The engine does not know why an id was
// triggered; it only guarantees each id unlocks, and pays out, once.

use chrono::{Duration, Timelike};

use crate::engine::{Engine, StateKey};
use crate::events::{AchievementUnlock, EconomyEvent};
use crate::types::AchievementView;

/// Static achievement definition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AchievementDef {
    pub id: &'static str,
    pub name: &'static str,
    pub desc: &'static str,
    pub reward: f64,
}

/// Achievement ids referenced from engine code and by games
pub mod ids {
    pub const FIRST_SPIN: &str = "first_spin";
    pub const FIRST_WIN: &str = "first_win";
    pub const HIGH_ROLLER: &str = "high_roller";
    pub const JACKPOT: &str = "jackpot";
    pub const LUCKY_STREAK: &str = "lucky_streak";
    pub const NIGHT_OWL: &str = "night_owl";
    pub const MARATHON: &str = "marathon";
    pub const DIVERSIFIED: &str = "diversified";
    pub const COMEBACK: &str = "comeback";
    pub const WHALE: &str = "whale";
    pub const LEVEL_10: &str = "level_10";
    pub const LEVEL_25: &str = "level_25";
    pub const LEVEL_50: &str = "level_50";
    pub const DAILY_STREAK_7: &str = "daily_streak_7";
    pub const BLACKJACK_21: &str = "blackjack_21";
    pub const CRASH_10X: &str = "crash_10x";
    pub const SCRATCH_JACKPOT: &str = "scratch_jackpot";
}

const fn def(id: &'static str, name: &'static str, desc: &'static str, reward: f64) -> AchievementDef {
    AchievementDef { id, name, desc, reward }
}

/// Every achievement, in display order
pub const ACHIEVEMENTS: &[AchievementDef] = &[
    def(ids::FIRST_SPIN, "First Timer", "Place your first bet", 5.0),
    def(ids::FIRST_WIN, "Winner!", "Win for the first time", 10.0),
    def(ids::HIGH_ROLLER, "High Roller", "Place a bet of €10 or more", 25.0),
    def(ids::JACKPOT, "Jackpot!", "Hit a 20× or higher multiplier", 100.0),
    def(ids::LUCKY_STREAK, "Lucky Streak", "Win 5 times in a row", 50.0),
    def(ids::NIGHT_OWL, "Night Owl", "Play between midnight and 4am", 15.0),
    def(ids::MARATHON, "Marathon", "Play for 30 minutes in one session", 30.0),
    def(ids::DIVERSIFIED, "Diversified", "Play all available games", 40.0),
    def(ids::COMEBACK, "Comeback Kid", "Recover from under €10 to over €100", 75.0),
    def(ids::WHALE, "Whale", "Accumulate €1000 total winnings", 200.0),
    def(ids::LEVEL_10, "Rising Star", "Reach level 10", 50.0),
    def(ids::LEVEL_25, "Veteran", "Reach level 25", 150.0),
    def(ids::LEVEL_50, "Legend", "Reach level 50", 500.0),
    def(ids::DAILY_STREAK_7, "Dedicated", "Claim daily bonus 7 days in a row", 100.0),
    def(ids::BLACKJACK_21, "Blackjack!", "Get a natural blackjack", 25.0),
    def(ids::CRASH_10X, "Diamond Hands", "Cash out at 10× or higher in Crash", 50.0),
    def(ids::SCRATCH_JACKPOT, "Golden Ticket", "Win the top prize on scratch cards", 75.0),
];

/// Look up a definition by id
pub fn find(id: &str) -> Option<&'static AchievementDef> {
    ACHIEVEMENTS.iter().find(|a| a.id == id)
}

impl Engine {
    /// Unlock `id` and pay its reward, once
    ///
    /// Returns false for ids that are already unlocked or unknown.
    pub fn check_achievement(&mut self, id: &str) -> bool {
        let unlocked = self.unlock(id);
        self.flush();
        unlocked
    }

    pub fn is_achievement_unlocked(&self, id: &str) -> bool {
        self.unlocked.iter().any(|u| u == id)
    }

    /// Unlocked ids in unlock order
    pub fn unlocked_achievements(&self) -> &[String] {
        &self.unlocked
    }

    /// Every definition with its unlock state
    pub fn all_achievements(&self) -> Vec<AchievementView> {
        ACHIEVEMENTS
            .iter()
            .map(|a| AchievementView {
                id: a.id.to_string(),
                name: a.name.to_string(),
                desc: a.desc.to_string(),
                reward: a.reward,
                unlocked: self.is_achievement_unlocked(a.id),
            })
            .collect()
    }

    /// Wall-clock achievements: late-night play and long sessions
    pub fn check_time_achievements(&mut self) {
        self.run_time_checks();
        self.flush();
    }

    /// Run the time checks if the configured interval has elapsed
    ///
    /// Hosts call this from their timer or frame loop. Returns whether the
    /// checks ran.
    pub fn poll_time_achievements(&mut self) -> bool {
        let now = self.clock.now();
        let interval = Duration::seconds(self.config.time_check_interval_secs);
        if let Some(last) = self.last_time_check {
            if now - last < interval {
                return false;
            }
        }

        self.last_time_check = Some(now);
        self.check_time_achievements();
        true
    }

    fn run_time_checks(&mut self) {
        let now = self.clock.now();

        let hour = now.hour();
        let (start, end) = (self.config.night_owl_start_hour, self.config.night_owl_end_hour);
        let in_window = if start <= end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        };
        if in_window {
            self.unlock(ids::NIGHT_OWL);
        }

        let session_ms = now.timestamp_millis() - self.stats.session_start;
        if session_ms >= self.config.marathon_minutes.saturating_mul(60_000) {
            self.unlock(ids::MARATHON);
        }
    }

    /// Mark unlocked, then credit the reward and announce it
    pub(crate) fn unlock(&mut self, id: &str) -> bool {
        if self.is_achievement_unlocked(id) {
            return false;
        }
        let Some(achievement) = find(id) else {
            return false;
        };

        self.unlocked.push(achievement.id.to_string());
        self.mark(StateKey::Achievements);
        log::debug!("Achievement unlocked: {}", achievement.id);

        self.write_balance(self.balance + achievement.reward);
        self.publish(EconomyEvent::AchievementUnlocked(AchievementUnlock {
            id: achievement.id.to_string(),
            name: achievement.name.to_string(),
            desc: achievement.desc.to_string(),
            reward: achievement.reward,
        }));
        true
    }
}
