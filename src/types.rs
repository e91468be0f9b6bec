// Type definitions for GamblingDen Core

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// Timestamp in milliseconds since epoch
pub type Timestamp = i64;

/// Result type for GamblingDen operations
pub type Result<T> = std::result::Result<T, EconomyError>;

/// Error types for GamblingDen operations
///
/// Gameplay operations never surface these: a failed write is logged and the
/// in-memory state stays authoritative. They only reach callers from
/// construction-time work (config parsing, snapshot loading, seeding entropy).
#[derive(Debug, thiserror::Error, Clone, Serialize, Deserialize)]
pub enum EconomyError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("CRDT error: {0}")]
    Crdt(String),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Entropy unavailable: {0}")]
    Entropy(String),
}

impl From<serde_json::Error> for EconomyError {
    fn from(err: serde_json::Error) -> Self {
        EconomyError::Serialization(err.to_string())
    }
}

// Convert Rust errors to JsValue for WASM boundary
impl From<EconomyError> for JsValue {
    fn from(err: EconomyError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

/// XP bar state for the current level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    /// XP earned since the current level's threshold
    pub progress: u64,
    /// XP between the current and next threshold (0 at the top level)
    pub needed: u64,
    /// Always within [0, 100]
    pub percent: f64,
}

/// Achievement definition joined with its unlock state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementView {
    pub id: String,
    pub name: String,
    pub desc: String,
    pub reward: f64,
    pub unlocked: bool,
}

/// Sparse statistics delta
///
/// Only the fields that are present (and positive, for amounts) are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsDelta {
    #[serde(default)]
    pub total_wagered: Option<f64>,
    #[serde(default)]
    pub total_won: Option<f64>,
    #[serde(default)]
    pub no_win: bool,
    #[serde(default)]
    pub game: Option<String>,
}

impl StatsDelta {
    pub fn wagered(amount: f64) -> Self {
        StatsDelta { total_wagered: Some(amount), ..Default::default() }
    }

    pub fn won(amount: f64) -> Self {
        StatsDelta { total_won: Some(amount), ..Default::default() }
    }

    /// A round of `game` finished
    pub fn played(game: &str) -> Self {
        StatsDelta { game: Some(game.to_string()), ..Default::default() }
    }

    /// A round of `game` finished without a win
    pub fn lost(game: &str) -> Self {
        StatsDelta { no_win: true, game: Some(game.to_string()), ..Default::default() }
    }
}

/// Result of a daily bonus wheel spin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelOutcome {
    /// Segment the wheel landed on
    pub index: usize,
    pub prize: f64,
    /// Daily streak after this claim
    pub streak: u32,
}
