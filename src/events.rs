// Event bus for GamblingDen Core
//
// The lobby UI, sound layer and games observe the engine through these
// events. Every event is a variant of one closed enum with a typed payload.

use serde::{Deserialize, Serialize};

use crate::stats::Statistics;

/// Payload of an achievement unlock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementUnlock {
    pub id: String,
    pub name: String,
    pub desc: String,
    pub reward: f64,
}

/// Everything the engine announces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EconomyEvent {
    #[serde(rename = "balance:change")]
    BalanceChanged { balance: f64 },
    #[serde(rename = "balance:reset")]
    BalanceReset { balance: f64 },
    #[serde(rename = "xp:change")]
    XpChanged { xp: u64, level: u32 },
    #[serde(rename = "level:up")]
    LevelUp { level: u32 },
    #[serde(rename = "achievement:unlock")]
    AchievementUnlocked(AchievementUnlock),
    #[serde(rename = "stats:update")]
    StatsUpdated(Statistics),
    #[serde(rename = "bet:placed")]
    BetPlaced { amount: f64 },
    #[serde(rename = "win")]
    Win { amount: f64 },
    #[serde(rename = "daily:claim")]
    DailyClaimed { streak: u32 },
}

/// Event names, used for subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BalanceChanged,
    BalanceReset,
    XpChanged,
    LevelUp,
    AchievementUnlocked,
    StatsUpdated,
    BetPlaced,
    Win,
    DailyClaimed,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::BalanceChanged,
        EventKind::BalanceReset,
        EventKind::XpChanged,
        EventKind::LevelUp,
        EventKind::AchievementUnlocked,
        EventKind::StatsUpdated,
        EventKind::BetPlaced,
        EventKind::Win,
        EventKind::DailyClaimed,
    ];

    /// Wire name, e.g. `balance:change`
    pub fn name(self) -> &'static str {
        match self {
            EventKind::BalanceChanged => "balance:change",
            EventKind::BalanceReset => "balance:reset",
            EventKind::XpChanged => "xp:change",
            EventKind::LevelUp => "level:up",
            EventKind::AchievementUnlocked => "achievement:unlock",
            EventKind::StatsUpdated => "stats:update",
            EventKind::BetPlaced => "bet:placed",
            EventKind::Win => "win",
            EventKind::DailyClaimed => "daily:claim",
        }
    }

    pub fn from_name(name: &str) -> Option<EventKind> {
        EventKind::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

impl EconomyEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EconomyEvent::BalanceChanged { .. } => EventKind::BalanceChanged,
            EconomyEvent::BalanceReset { .. } => EventKind::BalanceReset,
            EconomyEvent::XpChanged { .. } => EventKind::XpChanged,
            EconomyEvent::LevelUp { .. } => EventKind::LevelUp,
            EconomyEvent::AchievementUnlocked(_) => EventKind::AchievementUnlocked,
            EconomyEvent::StatsUpdated(_) => EventKind::StatsUpdated,
            EconomyEvent::BetPlaced { .. } => EventKind::BetPlaced,
            EconomyEvent::Win { .. } => EventKind::Win,
            EconomyEvent::DailyClaimed { .. } => EventKind::DailyClaimed,
        }
    }
}

/// Handle returned by `subscribe`; pass it back to `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

impl Subscription {
    pub fn id(self) -> u64 {
        self.0
    }
}

type Listener = Box<dyn FnMut(&EconomyEvent)>;

struct Entry {
    id: u64,
    /// `None` listens to every kind
    kind: Option<EventKind>,
    listener: Listener,
}

/// In-process publish/subscribe
///
/// Listeners run synchronously, in subscription order, on the thread that
/// publishes. They receive a shared reference and cannot reach back into the
/// engine while it is mid-operation.
#[derive(Default)]
pub struct EventBus {
    entries: Vec<Entry>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> EventBus {
        EventBus::default()
    }

    /// Listen for one kind of event
    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> Subscription
    where
        F: FnMut(&EconomyEvent) + 'static,
    {
        self.insert(Some(kind), Box::new(listener))
    }

    /// Listen for every event
    pub fn subscribe_all<F>(&mut self, listener: F) -> Subscription
    where
        F: FnMut(&EconomyEvent) + 'static,
    {
        self.insert(None, Box::new(listener))
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != subscription.0);
        self.entries.len() != before
    }

    pub fn publish(&mut self, event: &EconomyEvent) {
        let kind = event.kind();
        for entry in self.entries.iter_mut() {
            if entry.kind.map_or(true, |k| k == kind) {
                (entry.listener)(event);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.entries.len()
    }

    fn insert(&mut self, kind: Option<EventKind>, listener: Listener) -> Subscription {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry { id, kind, listener });
        Subscription(id)
    }
}
