// Balance Ledger
//
// The balance never goes negative and is kept rounded to cents. Every
// mutation goes through `write_balance`.

use crate::achievements::ids;
use crate::engine::{Engine, StateKey};
use crate::events::EconomyEvent;
use crate::types::StatsDelta;
use crate::utils::round2;

/// Round a caller-supplied amount, rejecting anything that is not a positive number
fn positive_amount(amount: f64) -> Option<f64> {
    if !amount.is_finite() {
        return None;
    }
    let amount = round2(amount);
    (amount > 0.0).then_some(amount)
}

impl Engine {
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Overwrite the balance; returns the stored (clamped, rounded) value
    pub fn set_balance(&mut self, value: f64) -> f64 {
        self.write_balance(value);
        self.flush();
        self.balance
    }

    /// Credit or debit an arbitrary amount, e.g. a bonus wheel prize
    pub fn adjust_balance(&mut self, delta: f64) -> f64 {
        self.write_balance(self.balance + delta);
        self.flush();
        self.balance
    }

    /// Take a wager
    ///
    /// Returns false, changing nothing, when the amount is not positive or
    /// exceeds the balance. On success the debit, the XP grant, the wagered
    /// statistic and the wager achievements are applied together.
    pub fn place_bet(&mut self, amount: f64) -> bool {
        let Some(amount) = positive_amount(amount) else {
            return false;
        };
        if amount > self.balance {
            return false;
        }

        self.write_balance(self.balance - amount);
        self.grant_xp(amount * self.config.xp_per_unit_wagered);
        self.record_stats(&StatsDelta::wagered(amount));
        self.publish(EconomyEvent::BetPlaced { amount });

        self.unlock(ids::FIRST_SPIN);
        if amount >= self.config.high_roller_bet {
            self.unlock(ids::HIGH_ROLLER);
        }

        self.flush();
        true
    }

    /// Pay out a win; non-positive amounts are ignored
    pub fn credit_win(&mut self, amount: f64) {
        let Some(amount) = positive_amount(amount) else {
            return;
        };

        // The comeback check wants the low point from before this credit
        let lowest_before = self.stats.lowest_balance;

        self.write_balance(self.balance + amount);
        self.record_stats(&StatsDelta::won(amount));
        self.publish(EconomyEvent::Win { amount });

        // Judged on the credited balance alone, before any reward lands
        if lowest_before < self.config.comeback_floor && self.balance >= self.config.comeback_target {
            self.unlock(ids::COMEBACK);
        }
        self.unlock(ids::FIRST_WIN);

        self.flush();
    }

    /// Back to the configured starting balance
    pub fn reset_balance(&mut self) {
        self.write_balance(self.config.starting_balance);
        self.publish(EconomyEvent::BalanceReset {
            balance: self.balance,
        });
        log::info!("Balance reset to {:.2}", self.balance);
        self.flush();
    }

    pub(crate) fn write_balance(&mut self, value: f64) {
        if !value.is_finite() {
            log::warn!("Ignoring non-finite balance {}", value);
            return;
        }
        self.balance = round2(value.max(0.0));
        self.mark(StateKey::Balance);
        self.publish(EconomyEvent::BalanceChanged {
            balance: self.balance,
        });
    }
}
