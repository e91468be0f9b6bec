// JavaScript facade for the lobby and the games
//
// Every method takes `&self` so listeners may call back into the facade
// while an event is being delivered. Engine events are queued while the
// engine is borrowed and handed to JS listeners after the borrow ends.

use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::chronicle::Chronicle;
use crate::config::EconomyConfig;
use crate::engine::Engine;
use crate::events::{EconomyEvent, EventKind};
use crate::store::{KeyValueStore, MemoryStore};
use crate::types::StatsDelta;
use crate::utils;

/// Wildcard event name for `on`
const ANY_EVENT: &str = "*";

struct JsListener {
    id: u32,
    kind: Option<EventKind>,
    callback: js_sys::Function,
}

struct Shared {
    engine: RefCell<Engine>,
    outbox: Rc<RefCell<VecDeque<EconomyEvent>>>,
    listeners: RefCell<Vec<JsListener>>,
    next_listener: Cell<u32>,
}

impl Shared {
    /// Deliver queued events to JS listeners, in publish order
    fn dispatch(&self) {
        loop {
            let Some(event) = self.outbox.borrow_mut().pop_front() else {
                break;
            };

            let kind = event.kind();
            let targets: Vec<js_sys::Function> = self
                .listeners
                .borrow()
                .iter()
                .filter(|l| l.kind.map_or(true, |k| k == kind))
                .map(|l| l.callback.clone())
                .collect();
            if targets.is_empty() {
                continue;
            }

            let payload = match to_js(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    web_sys::console::error_2(&"GamblingDen: could not encode event".into(), &e);
                    continue;
                }
            };
            for callback in targets {
                if let Err(e) = callback.call1(&JsValue::NULL, &payload) {
                    web_sys::console::error_2(&"GamblingDen: listener threw".into(), &e);
                }
            }
        }
    }
}

/// Plain JS objects rather than `Map`s for the per-game counters
fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(JsValue::from)
}

fn parse_config(config_json: Option<String>) -> Result<EconomyConfig, JsValue> {
    match config_json {
        Some(json) => Ok(EconomyConfig::from_json(&json)?),
        None => Ok(EconomyConfig::default()),
    }
}

#[cfg(target_arch = "wasm32")]
fn browser_store() -> Box<dyn KeyValueStore> {
    match crate::web_storage::LocalStorageStore::open() {
        Ok(store) => Box::new(store),
        Err(e) => {
            log::warn!("{}; progress will not be saved", e);
            Box::new(MemoryStore::new())
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn browser_store() -> Box<dyn KeyValueStore> {
    Box::new(MemoryStore::new())
}

/// Recurring time-achievement poll; cleared on drop
struct Interval {
    handle: i32,
    _tick: Closure<dyn FnMut()>,
}

impl Drop for Interval {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            window.clear_interval_with_handle(self.handle);
        }
    }
}

/// Player economy engine for JavaScript
#[wasm_bindgen]
pub struct GamblingDen {
    shared: Rc<Shared>,
    snapshot: Option<Chronicle>,
    interval: RefCell<Option<Interval>>,
}

impl GamblingDen {
    fn build(config: EconomyConfig, store: Box<dyn KeyValueStore>, snapshot: Option<Chronicle>) -> Result<GamblingDen, JsValue> {
        let mut engine = Engine::new(config, store)?;

        let outbox = Rc::new(RefCell::new(VecDeque::new()));
        let sink = outbox.clone();
        engine.on_any(move |event| sink.borrow_mut().push_back(event.clone()));

        Ok(GamblingDen {
            shared: Rc::new(Shared {
                engine: RefCell::new(engine),
                outbox,
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(1),
            }),
            snapshot,
            interval: RefCell::new(None),
        })
    }

    /// Run `f` against the engine, then deliver whatever it published
    fn with_engine<T>(&self, f: impl FnOnce(&mut Engine) -> T) -> T {
        let result = f(&mut self.shared.engine.borrow_mut());
        self.shared.dispatch();
        result
    }

    fn read<T>(&self, f: impl FnOnce(&Engine) -> T) -> T {
        f(&self.shared.engine.borrow())
    }
}

#[wasm_bindgen]
impl GamblingDen {
    /// Engine persisted to `localStorage`
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<GamblingDen, JsValue> {
        GamblingDen::build(parse_config(config_json)?, browser_store(), None)
    }

    /// Engine persisted inside an Automerge document
    ///
    /// Pass a base64 snapshot from `exportSnapshot` to resume, or nothing to
    /// start fresh.
    #[wasm_bindgen(js_name = withSnapshot)]
    pub fn with_snapshot(snapshot: Option<String>, config_json: Option<String>) -> Result<GamblingDen, JsValue> {
        let chronicle = match snapshot {
            Some(base64) => Chronicle::load_from_base64(&base64)?,
            None => Chronicle::new(),
        };
        let store: Box<dyn KeyValueStore> = Box::new(chronicle.clone());
        GamblingDen::build(parse_config(config_json)?, store, Some(chronicle))
    }

    /// Base64 snapshot of every persisted key; undefined for `localStorage` engines
    #[wasm_bindgen(js_name = exportSnapshot)]
    pub fn export_snapshot(&self) -> Option<String> {
        self.snapshot.as_ref().map(Chronicle::save_to_base64)
    }

    // Ledger

    #[wasm_bindgen(js_name = getBalance)]
    pub fn get_balance(&self) -> f64 {
        self.read(Engine::balance)
    }

    #[wasm_bindgen(js_name = setBalance)]
    pub fn set_balance(&self, value: f64) -> f64 {
        self.with_engine(|e| e.set_balance(value))
    }

    #[wasm_bindgen(js_name = adjustBalance)]
    pub fn adjust_balance(&self, delta: f64) -> f64 {
        self.with_engine(|e| e.adjust_balance(delta))
    }

    #[wasm_bindgen(js_name = placeBet)]
    pub fn place_bet(&self, amount: f64) -> bool {
        self.with_engine(|e| e.place_bet(amount))
    }

    #[wasm_bindgen(js_name = creditWin)]
    pub fn credit_win(&self, amount: f64) {
        self.with_engine(|e| e.credit_win(amount))
    }

    #[wasm_bindgen(js_name = resetBalance)]
    pub fn reset_balance(&self) {
        self.with_engine(Engine::reset_balance)
    }

    // Progression

    #[wasm_bindgen(js_name = getXP)]
    pub fn get_xp(&self) -> f64 {
        self.read(Engine::xp) as f64
    }

    #[wasm_bindgen(js_name = getLevel)]
    pub fn get_level(&self) -> u32 {
        self.read(Engine::level)
    }

    #[wasm_bindgen(js_name = getLevelProgress)]
    pub fn get_level_progress(&self) -> Result<JsValue, JsValue> {
        to_js(&self.read(Engine::level_progress))
    }

    #[wasm_bindgen(js_name = addXP)]
    pub fn add_xp(&self, amount: f64) {
        self.with_engine(|e| e.add_xp(amount))
    }

    // Achievements

    #[wasm_bindgen(js_name = checkAchievement)]
    pub fn check_achievement(&self, id: &str) -> bool {
        self.with_engine(|e| e.check_achievement(id))
    }

    #[wasm_bindgen(js_name = isAchievementUnlocked)]
    pub fn is_achievement_unlocked(&self, id: &str) -> bool {
        self.read(|e| e.is_achievement_unlocked(id))
    }

    #[wasm_bindgen(js_name = getUnlockedAchievements)]
    pub fn get_unlocked_achievements(&self) -> Vec<String> {
        self.read(|e| e.unlocked_achievements().to_vec())
    }

    #[wasm_bindgen(js_name = getAllAchievements)]
    pub fn get_all_achievements(&self) -> Result<JsValue, JsValue> {
        to_js(&self.read(Engine::all_achievements))
    }

    #[wasm_bindgen(js_name = checkTimeAchievements)]
    pub fn check_time_achievements(&self) {
        self.with_engine(Engine::check_time_achievements)
    }

    /// Poll the time-based achievements on the configured interval
    #[wasm_bindgen(js_name = startTimeChecks)]
    pub fn start_time_checks(&self) -> Result<(), JsValue> {
        if self.interval.borrow().is_some() {
            return Ok(());
        }
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window object"))?;

        let shared = self.shared.clone();
        let tick = Closure::<dyn FnMut()>::new(move || {
            if let Ok(mut engine) = shared.engine.try_borrow_mut() {
                engine.poll_time_achievements();
            }
            shared.dispatch();
        });

        let secs = self.read(|e| e.config().time_check_interval_secs);
        let millis = secs.saturating_mul(1000).clamp(1, i32::MAX as i64) as i32;
        let handle = window
            .set_interval_with_callback_and_timeout_and_arguments_0(tick.as_ref().unchecked_ref(), millis)?;

        self.check_time_achievements();
        *self.interval.borrow_mut() = Some(Interval { handle, _tick: tick });
        Ok(())
    }

    #[wasm_bindgen(js_name = stopTimeChecks)]
    pub fn stop_time_checks(&self) {
        self.interval.borrow_mut().take();
    }

    // Statistics

    /// Apply a sparse `{totalWagered, totalWon, noWin, game}` delta
    #[wasm_bindgen(js_name = updateStats)]
    pub fn update_stats(&self, delta: JsValue) -> Result<(), JsValue> {
        let delta: StatsDelta = serde_wasm_bindgen::from_value(delta)?;
        self.with_engine(|e| e.update_stats(&delta));
        Ok(())
    }

    #[wasm_bindgen(js_name = getStats)]
    pub fn get_stats(&self) -> Result<JsValue, JsValue> {
        self.read(|e| to_js(e.stats()))
    }

    // Daily bonus

    #[wasm_bindgen(js_name = canClaimDailyBonus)]
    pub fn can_claim_daily_bonus(&self) -> bool {
        self.read(Engine::can_claim_daily_bonus)
    }

    /// `true` on success, `undefined` if already claimed today
    #[wasm_bindgen(js_name = claimDailyBonus)]
    pub fn claim_daily_bonus(&self) -> Option<bool> {
        self.with_engine(|e| e.claim_daily_bonus().map(|_| true))
    }

    /// `{index, prize, streak}`, or null if already claimed today
    #[wasm_bindgen(js_name = spinDailyWheel)]
    pub fn spin_daily_wheel(&self) -> Result<JsValue, JsValue> {
        match self.with_engine(Engine::spin_daily_wheel) {
            Some(outcome) => to_js(&outcome),
            None => Ok(JsValue::NULL),
        }
    }

    // Misc

    #[wasm_bindgen(js_name = randomInt)]
    pub fn random_int(&self, min: i32, max: i32) -> i32 {
        // Both bounds fit in i32 so the result does too
        self.with_engine(|e| e.random_int(min as i64, max as i64)) as i32
    }

    #[wasm_bindgen(js_name = isSoundEnabled)]
    pub fn is_sound_enabled(&self) -> bool {
        self.read(Engine::sound_enabled)
    }

    #[wasm_bindgen(js_name = setSoundEnabled)]
    pub fn set_sound_enabled(&self, enabled: bool) {
        self.with_engine(|e| e.set_sound_enabled(enabled))
    }

    /// Subscribe to an event by name (`"*"` for all); returns an id for `off`
    pub fn on(&self, event: &str, callback: js_sys::Function) -> Result<u32, JsValue> {
        let kind = if event == ANY_EVENT {
            None
        } else {
            let kind = EventKind::from_name(event)
                .ok_or_else(|| JsValue::from_str(&format!("unknown event: {}", event)))?;
            Some(kind)
        };

        let id = self.shared.next_listener.get();
        self.shared.next_listener.set(id.wrapping_add(1));
        self.shared
            .listeners
            .borrow_mut()
            .push(JsListener { id, kind, callback });
        Ok(id)
    }

    pub fn off(&self, id: u32) -> bool {
        let mut listeners = self.shared.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }
}

#[wasm_bindgen(js_name = formatEuro)]
pub fn format_euro(n: f64) -> String {
    utils::format_euro(n)
}

#[wasm_bindgen(js_name = formatCompact)]
pub fn format_compact(n: f64) -> String {
    utils::format_compact(n)
}
