// Engine: the single owner of all player economy state
//
// Balance, XP/level, unlocked achievements, statistics, the daily claim and
// the sound flag live here. The components (ledger, progression,
// achievements, stats, daily) are `impl Engine` blocks in their own modules.
// State is rehydrated from the store once at construction; each public
// operation writes the keys it touched as one batch when it finishes.

use chrono::{DateTime, Local};
use std::collections::BTreeSet;

use crate::achievements;
use crate::clock::{Clock, SystemClock};
use crate::config::EconomyConfig;
use crate::events::{EconomyEvent, EventBus, EventKind, Subscription};
use crate::progression::LevelTable;
use crate::random::RandomSource;
use crate::stats::Statistics;
use crate::store::{KeyValueStore, ScopedStore, WriteBatch};
use crate::types::Result;
use crate::utils::round2;

/// Persisted records, one store key each
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum StateKey {
    Balance,
    Xp,
    Level,
    Achievements,
    Stats,
    DailyLast,
    Settings,
}

impl StateKey {
    /// Key under the application namespace
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            StateKey::Balance => "balance",
            StateKey::Xp => "xp",
            StateKey::Level => "level",
            StateKey::Achievements => "achievements",
            StateKey::Stats => "stats",
            StateKey::DailyLast => "daily_last",
            StateKey::Settings => "settings",
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Settings {
    #[serde(default = "sound_default")]
    sound: bool,
}

fn sound_default() -> bool {
    true
}

/// Player economy and progression engine
///
/// Construct one per process and hand `&mut Engine` to every game and UI
/// consumer. All operations are synchronous and run to completion, so each
/// one is atomic with respect to the others.
pub struct Engine {
    pub(crate) config: EconomyConfig,
    pub(crate) levels: LevelTable,
    store: ScopedStore<Box<dyn KeyValueStore>>,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) random: RandomSource,
    pub(crate) bus: EventBus,

    pub(crate) balance: f64,
    pub(crate) xp: u64,
    pub(crate) level: u32,
    pub(crate) unlocked: Vec<String>,
    pub(crate) stats: Statistics,
    pub(crate) daily_last: Option<DateTime<Local>>,
    pub(crate) sound_enabled: bool,
    pub(crate) last_time_check: Option<DateTime<Local>>,

    dirty: BTreeSet<StateKey>,
}

impl Engine {
    /// Engine on the system clock with an OS-keyed random source
    pub fn new<S: KeyValueStore + 'static>(config: EconomyConfig, store: S) -> Result<Engine> {
        Self::with_parts(config, store, Box::new(SystemClock), RandomSource::try_from_os()?)
    }

    /// Engine with an explicit clock and random source
    pub fn with_parts<S: KeyValueStore + 'static>(
        config: EconomyConfig,
        store: S,
        clock: Box<dyn Clock>,
        random: RandomSource,
    ) -> Result<Engine> {
        config.validate()?;

        let store: Box<dyn KeyValueStore> = Box::new(store);
        let store = ScopedStore::new(store, &config.storage_namespace);
        let levels = LevelTable::new(config.level_thresholds.clone());
        let stats = Statistics::fresh(&config, clock.now().timestamp_millis());

        let mut engine = Engine {
            balance: config.starting_balance,
            config,
            levels,
            store,
            clock,
            random,
            bus: EventBus::new(),
            xp: 0,
            level: 1,
            unlocked: Vec::new(),
            stats,
            daily_last: None,
            sound_enabled: true,
            last_time_check: None,
            dirty: BTreeSet::new(),
        };

        engine.rehydrate();
        engine.flush();
        Ok(engine)
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Subscribe to one kind of event
    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> Subscription
    where
        F: FnMut(&EconomyEvent) + 'static,
    {
        self.bus.subscribe(kind, listener)
    }

    /// Subscribe to every event
    pub fn on_any<F>(&mut self, listener: F) -> Subscription
    where
        F: FnMut(&EconomyEvent) + 'static,
    {
        self.bus.subscribe_all(listener)
    }

    pub fn off(&mut self, subscription: Subscription) -> bool {
        self.bus.unsubscribe(subscription)
    }

    pub(crate) fn publish(&mut self, event: EconomyEvent) {
        self.bus.publish(&event);
    }

    // ------------------------------------------------------------------
    // Randomness
    // ------------------------------------------------------------------

    /// Uniform integer in `[min, max]` from the engine's random source
    pub fn random_int(&mut self, min: i64, max: i64) -> i64 {
        self.random.random_int(min, max)
    }

    /// Direct access for shuffles and weighted picks
    pub fn random(&mut self) -> &mut RandomSource {
        &mut self.random
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub fn sound_enabled(&self) -> bool {
        self.sound_enabled
    }

    pub fn set_sound_enabled(&mut self, enabled: bool) {
        self.sound_enabled = enabled;
        self.mark(StateKey::Settings);
        self.flush();
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    pub(crate) fn mark(&mut self, key: StateKey) {
        self.dirty.insert(key);
    }

    /// Write every dirty record as one batch
    ///
    /// Failures are logged and dropped; in-memory state stays authoritative
    /// for the rest of the session.
    pub(crate) fn flush(&mut self) {
        if self.dirty.is_empty() {
            return;
        }

        let mut batch = WriteBatch::new();
        for key in std::mem::take(&mut self.dirty) {
            match self.encode(key) {
                Ok(Some(value)) => batch.set(key.as_str(), value),
                Ok(None) => batch.remove(key.as_str()),
                Err(e) => log::warn!("Skipping {} write: {}", key.as_str(), e),
            }
        }

        if let Err(e) = self.store.commit(&batch) {
            log::warn!("Storage unavailable, keeping state in memory: {}", e);
        }
    }

    fn encode(&self, key: StateKey) -> Result<Option<String>> {
        let value = match key {
            StateKey::Balance => Some(format!("{:.2}", self.balance)),
            StateKey::Xp => Some(self.xp.to_string()),
            StateKey::Level => Some(self.level.to_string()),
            StateKey::Achievements => Some(serde_json::to_string(&self.unlocked)?),
            StateKey::Stats => Some(serde_json::to_string(&self.stats)?),
            StateKey::DailyLast => self.daily_last.map(|t| t.to_rfc3339()),
            StateKey::Settings => Some(serde_json::to_string(&Settings {
                sound: self.sound_enabled,
            })?),
        };
        Ok(value)
    }

    fn read(&self, key: StateKey) -> Option<String> {
        match self.store.get(key.as_str()) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Could not read {}: {}", key.as_str(), e);
                None
            }
        }
    }

    /// Load persisted state, falling back to defaults for anything missing
    /// or corrupt
    fn rehydrate(&mut self) {
        if let Some(raw) = self.read(StateKey::Balance) {
            match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => self.balance = round2(v),
                _ => log::warn!("Ignoring corrupt balance {:?}", raw),
            }
        }

        if let Some(raw) = self.read(StateKey::Xp) {
            match raw.trim().parse::<u64>() {
                Ok(v) => self.xp = v,
                Err(_) => log::warn!("Ignoring corrupt xp {:?}", raw),
            }
        }

        // Level is derived from XP; the stored copy is only checked
        self.level = self.levels.level_for_xp(self.xp);
        let stored_level = self.read(StateKey::Level);
        if stored_level.as_deref().map(str::trim) != Some(self.level.to_string().as_str()) {
            if stored_level.is_some() {
                log::warn!(
                    "Stored level {:?} disagrees with xp {}; repaired to {}",
                    stored_level,
                    self.xp,
                    self.level
                );
            }
            if self.xp > 0 || stored_level.is_some() {
                self.mark(StateKey::Level);
            }
        }

        if let Some(raw) = self.read(StateKey::Achievements) {
            match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(ids) => {
                    for id in ids {
                        if achievements::find(&id).is_some() && !self.unlocked.contains(&id) {
                            self.unlocked.push(id);
                        }
                    }
                }
                Err(e) => log::warn!("Ignoring corrupt achievements: {}", e),
            }
        }

        if let Some(raw) = self.read(StateKey::Stats) {
            match Statistics::from_stored(&raw, &self.config) {
                Ok(stats) => self.stats = stats,
                Err(e) => log::warn!("Ignoring corrupt stats: {}", e),
            }
        }
        self.stats.normalize(&self.config);
        self.stats.session_start = self.clock.now().timestamp_millis();
        self.mark(StateKey::Stats);

        if let Some(raw) = self.read(StateKey::DailyLast) {
            match DateTime::parse_from_rfc3339(raw.trim()) {
                Ok(t) => self.daily_last = Some(t.with_timezone(&Local)),
                Err(e) => log::warn!("Ignoring corrupt daily claim {:?}: {}", raw, e),
            }
        }

        if let Some(raw) = self.read(StateKey::Settings) {
            match serde_json::from_str::<Settings>(&raw) {
                Ok(settings) => self.sound_enabled = settings.sound,
                Err(e) => log::warn!("Ignoring corrupt settings: {}", e),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::rc::Rc;

    pub(crate) fn noon(year: i32, month: u32, day: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    /// Store handle whose contents stay inspectable after the engine takes it
    #[derive(Clone, Default)]
    pub(crate) struct SharedStore {
        pub(crate) inner: Rc<RefCell<MemoryStore>>,
        pub(crate) fail_writes: Rc<std::cell::Cell<bool>>,
    }

    impl SharedStore {
        pub(crate) fn with_entries(entries: &[(&str, &str)]) -> SharedStore {
            let store = SharedStore::default();
            for (k, v) in entries {
                store.inner.borrow_mut().set(k, v).unwrap();
            }
            store
        }

        pub(crate) fn value(&self, key: &str) -> Option<String> {
            self.inner.borrow().get(key).unwrap()
        }
    }

    impl KeyValueStore for SharedStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.borrow().get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            if self.fail_writes.get() {
                return Err(crate::types::EconomyError::Storage("quota exceeded".to_string()));
            }
            self.inner.borrow_mut().set(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<()> {
            self.inner.borrow_mut().remove(key)
        }
    }

    pub(crate) fn engine_at(config: EconomyConfig, store: SharedStore, clock: &ManualClock) -> Engine {
        Engine::with_parts(config, store, Box::new(clock.clone()), RandomSource::from_seed(42))
            .unwrap()
    }

    pub(crate) fn test_engine() -> (Engine, SharedStore, ManualClock) {
        let store = SharedStore::default();
        let clock = ManualClock::new(noon(2026, 3, 10));
        let engine = engine_at(EconomyConfig::default(), store.clone(), &clock);
        (engine, store, clock)
    }

    pub(crate) fn record_events(engine: &mut Engine) -> Rc<RefCell<Vec<EconomyEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        engine.on_any(move |event| sink.borrow_mut().push(event.clone()));
        seen
    }

    #[test]
    fn test_first_run_defaults() {
        let (engine, store, clock) = test_engine();

        assert_eq!(engine.balance(), 100.0);
        assert_eq!(engine.xp(), 0);
        assert_eq!(engine.level(), 1);
        assert!(engine.unlocked_achievements().is_empty());
        assert!(engine.can_claim_daily_bonus());
        assert!(engine.sound_enabled());
        assert_eq!(engine.stats().session_start, clock.now().timestamp_millis());
        assert_eq!(engine.stats().games_played.len(), 4);

        // Only the fresh stats record is written on startup
        assert!(store.value("gd_stats").is_some());
        assert_eq!(store.value("gd_balance"), None);
    }

    #[test]
    fn test_rehydrates_persisted_state() {
        let store = SharedStore::with_entries(&[
            ("gd_balance", "42.50"),
            ("gd_xp", "260"),
            ("gd_level", "3"),
            ("gd_achievements", r#"["first_spin","first_win"]"#),
            ("gd_stats", r#"{"totalWagered":26.0,"totalWon":8.5,"biggestWin":8.5,"consecutiveWins":1}"#),
            ("gd_daily_last", "2026-03-09T12:00:00+00:00"),
            ("gd_settings", r#"{"sound":false}"#),
        ]);
        let clock = ManualClock::new(noon(2026, 3, 10));
        let engine = engine_at(EconomyConfig::default(), store, &clock);

        assert_eq!(engine.balance(), 42.5);
        assert_eq!(engine.xp(), 260);
        assert_eq!(engine.level(), 3);
        assert_eq!(engine.unlocked_achievements(), ["first_spin", "first_win"]);
        assert_eq!(engine.stats().total_wagered, 26.0);
        assert_eq!(engine.stats().consecutive_wins, 1);
        assert_eq!(engine.stats().games_played.get("crash"), Some(&0));
        assert!(engine.last_daily_claim().is_some());
        assert!(!engine.sound_enabled());
    }

    #[test]
    fn test_one_bad_stats_field_keeps_the_rest() {
        let store = SharedStore::with_entries(&[(
            "gd_stats",
            r#"{"totalWagered":26.0,"totalWon":500.0,"biggestWin":null,"gamesPlayed":{"slots":3,"crash":"lots"}}"#,
        )]);
        let clock = ManualClock::new(noon(2026, 3, 10));
        let config = EconomyConfig {
            starting_balance: 250.0,
            ..EconomyConfig::default()
        };
        let engine = engine_at(config, store.clone(), &clock);

        let stats = engine.stats();
        assert_eq!(stats.total_wagered, 26.0);
        assert_eq!(stats.total_won, 500.0);
        assert_eq!(stats.biggest_win, 0.0);
        assert_eq!(stats.lowest_balance, 250.0);
        assert_eq!(stats.games_played.get("slots"), Some(&3));
        assert_eq!(stats.games_played.get("crash"), Some(&0));

        let saved: Statistics = serde_json::from_str(&store.value("gd_stats").unwrap()).unwrap();
        assert_eq!(saved.total_won, 500.0);
    }

    #[test]
    fn test_corrupt_state_falls_back_to_defaults() {
        let store = SharedStore::with_entries(&[
            ("gd_balance", "-5"),
            ("gd_xp", "lots"),
            ("gd_achievements", "{not json"),
            ("gd_stats", "[]"),
            ("gd_daily_last", "yesterday-ish"),
            ("gd_settings", "loud"),
        ]);
        let clock = ManualClock::new(noon(2026, 3, 10));
        let engine = engine_at(EconomyConfig::default(), store, &clock);

        assert_eq!(engine.balance(), 100.0);
        assert_eq!(engine.xp(), 0);
        assert_eq!(engine.level(), 1);
        assert!(engine.unlocked_achievements().is_empty());
        assert_eq!(engine.stats().total_won, 0.0);
        assert!(engine.can_claim_daily_bonus());
        assert!(engine.sound_enabled());
    }

    #[test]
    fn test_level_recomputed_from_xp() {
        // Stale level lower than xp allows, and a corrupt one higher than it
        for stored in ["1", "40"] {
            let store = SharedStore::with_entries(&[("gd_xp", "800"), ("gd_level", stored)]);
            let clock = ManualClock::new(noon(2026, 3, 10));
            let engine = engine_at(EconomyConfig::default(), store.clone(), &clock);

            assert_eq!(engine.level(), 5);
            assert_eq!(store.value("gd_level").as_deref(), Some("5"));
        }
    }

    #[test]
    fn test_unknown_and_duplicate_achievement_ids_dropped() {
        let store = SharedStore::with_entries(&[(
            "gd_achievements",
            r#"["first_win","mystery","first_win","whale"]"#,
        )]);
        let clock = ManualClock::new(noon(2026, 3, 10));
        let engine = engine_at(EconomyConfig::default(), store, &clock);

        assert_eq!(engine.unlocked_achievements(), ["first_win", "whale"]);
    }

    #[test]
    fn test_write_failures_keep_state_in_memory() {
        let (mut engine, store, _clock) = test_engine();
        store.fail_writes.set(true);

        assert!(engine.place_bet(10.0));
        assert_eq!(engine.balance(), 90.0 + 5.0 + 25.0);
        assert_eq!(engine.xp(), 100);
        assert_eq!(store.value("gd_balance"), None);

        store.fail_writes.set(false);
        engine.credit_win(5.0);
        // first_win adds its 10.00 reward on top of the win
        assert_eq!(store.value("gd_balance").as_deref(), Some("135.00"));
    }

    #[test]
    fn test_sound_setting_persists() {
        let (mut engine, store, _clock) = test_engine();
        engine.set_sound_enabled(false);

        assert!(!engine.sound_enabled());
        assert_eq!(store.value("gd_settings").as_deref(), Some(r#"{"sound":false}"#));
    }

    #[test]
    fn test_namespace_comes_from_config() {
        let config = EconomyConfig {
            storage_namespace: "den.".to_string(),
            ..EconomyConfig::default()
        };
        let store = SharedStore::default();
        let clock = ManualClock::new(noon(2026, 3, 10));
        let mut engine = engine_at(config, store.clone(), &clock);
        engine.adjust_balance(1.0);

        assert_eq!(store.value("den.balance").as_deref(), Some("101.00"));
        assert_eq!(store.value("gd_balance"), None);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EconomyConfig {
            level_thresholds: vec![],
            ..EconomyConfig::default()
        };
        assert!(Engine::new(config, MemoryStore::new()).is_err());
    }

    #[test]
    fn test_independent_engines_do_not_share_state() {
        let (mut a, _, _) = test_engine();
        let (b, _, _) = test_engine();

        a.adjust_balance(50.0);
        assert_eq!(a.balance(), 150.0);
        assert_eq!(b.balance(), 100.0);
    }
}
