// GamblingDen Core - Rust/WASM Implementation
// Copyright 2025 GamblingDen Contributors
// Licensed under the Apache License, Version 2.0

//! # GamblingDen Core (Rust/WASM)
//!
//! Player economy and progression engine shared by every GamblingDen
//! mini-game: one play-money balance, XP and levels, one-time achievements,
//! play statistics and a daily bonus. Compiles natively and to WebAssembly.
//!
//! ## Architecture
//!
//! - **Engine**: context object owning all state, one per process
//! - **Ledger / Progression / Achievements / Stats / Daily**: the engine's
//!   operations, one module each
//! - **EventBus**: typed publish/subscribe for UI, sound and games
//! - **KeyValueStore**: persistence port (`MemoryStore`, `Chronicle`,
//!   browser `localStorage`)
//! - **RandomSource**: unbiased integers from a CSPRNG for fairness-sensitive
//!   game outcomes
//!
//! ```
//! use gamblingden_core::{EconomyConfig, Engine, MemoryStore};
//!
//! let mut engine = Engine::new(EconomyConfig::default(), MemoryStore::new()).unwrap();
//! assert!(engine.place_bet(10.0));
//! assert_eq!(engine.xp(), 100);
//! ```

use wasm_bindgen::prelude::*;

// Module declarations
mod achievements;
mod bindings;
mod chronicle;
mod clock;
mod config;
mod daily;
mod engine;
mod events;
mod ledger;
mod progression;
mod random;
mod stats;
mod store;
mod types;
mod utils;
#[cfg(target_arch = "wasm32")]
mod web_storage;

// Re-exports
pub use achievements::{find as find_achievement, ids, AchievementDef, ACHIEVEMENTS};
pub use bindings::GamblingDen;
pub use chronicle::Chronicle;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EconomyConfig, WheelSegment, DEFAULT_LEVEL_THRESHOLDS, DEFAULT_WHEEL_PRIZES};
pub use engine::Engine;
pub use events::{AchievementUnlock, EconomyEvent, EventBus, EventKind, Subscription};
pub use progression::LevelTable;
pub use random::{random_int, RandomSource};
pub use stats::Statistics;
pub use store::{KeyValueStore, MemoryStore, ScopedStore, WriteBatch};
pub use types::{
    AchievementView, EconomyError, LevelProgress, Result, StatsDelta, Timestamp, WheelOutcome,
};
pub use utils::{clamp, format_compact, format_euro, round2};
#[cfg(target_arch = "wasm32")]
pub use web_storage::LocalStorageStore;

// WASM initialization
#[wasm_bindgen(start)]
pub fn init() {
    // Set up better panic messages in the browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    #[cfg(target_arch = "wasm32")]
    console_log::init_with_level(log::Level::Info).ok();
}

// Version information
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
