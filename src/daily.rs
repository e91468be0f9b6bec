// Daily Bonus Tracker
//
// One claim per local calendar day. Claims on consecutive days build a
// streak; a gap of one or more days starts it over at 1.

use chrono::{DateTime, Local};

use crate::achievements::ids;
use crate::engine::{Engine, StateKey};
use crate::events::EconomyEvent;
use crate::types::WheelOutcome;

impl Engine {
    pub fn last_daily_claim(&self) -> Option<DateTime<Local>> {
        self.daily_last
    }

    /// True when there is no claim yet today (local calendar)
    pub fn can_claim_daily_bonus(&self) -> bool {
        match self.daily_last {
            None => true,
            Some(last) => last.date_naive() != self.clock.now().date_naive(),
        }
    }

    /// Record today's claim and return the new streak
    ///
    /// Credits nothing; the prize is chosen and credited by the caller (or
    /// use `spin_daily_wheel`). Returns `None` if already claimed today.
    pub fn claim_daily_bonus(&mut self) -> Option<u32> {
        let streak = self.record_claim();
        self.flush();
        streak
    }

    /// Claim the daily bonus and credit a prize from the weighted wheel
    pub fn spin_daily_wheel(&mut self) -> Option<WheelOutcome> {
        if !self.can_claim_daily_bonus() {
            return None;
        }

        let weights: Vec<u32> = self.config.wheel_segments.iter().map(|s| s.weight).collect();
        let index = self.random.weighted_index(&weights)?;
        let prize = self.config.wheel_segments[index].prize;

        let streak = self.record_claim()?;
        self.write_balance(self.balance + prize);
        self.flush();

        Some(WheelOutcome {
            index,
            prize,
            streak,
        })
    }

    fn record_claim(&mut self) -> Option<u32> {
        if !self.can_claim_daily_bonus() {
            return None;
        }

        let now = self.clock.now();
        // Compare against the claim being replaced, not the one being written
        let previous = self.daily_last.replace(now);
        self.mark(StateKey::DailyLast);

        let yesterday = now.date_naive().pred_opt();
        let continued = previous.is_some_and(|p| Some(p.date_naive()) == yesterday);
        let streak = if continued {
            self.stats.daily_streak.saturating_add(1)
        } else {
            1
        };

        self.stats.daily_streak = streak;
        self.mark(StateKey::Stats);
        log::debug!("Daily bonus claimed, streak {}", streak);

        self.publish(EconomyEvent::DailyClaimed { streak });
        self.publish(EconomyEvent::StatsUpdated(self.stats.clone()));

        if streak >= self.config.daily_streak_target {
            self.unlock(ids::DAILY_STREAK_7);
        }
        Some(streak)
    }
}
