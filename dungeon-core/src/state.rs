//! Game state for one playthrough.

use crate::character::Character;
use std::fmt;

pub const STARTING_LOCATION: &str = "entrance";
pub const MAX_HEALTH: i32 = 100;

/// A single change to the game state.
///
/// Every field is optional; [`GameState::update`] applies whichever are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdate {
    pub location: Option<String>,
    pub item: Option<String>,
    pub health_change: i32,
    pub exp_gain: u32,
    pub quest: Option<String>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }

    pub fn with_health_change(mut self, change: i32) -> Self {
        self.health_change = change;
        self
    }

    pub fn with_exp_gain(mut self, exp: u32) -> Self {
        self.exp_gain = exp;
        self
    }

    pub fn with_quest(mut self, quest: impl Into<String>) -> Self {
        self.quest = Some(quest.into());
        self
    }
}

/// Character and progress. Lives as long as the session.
#[derive(Debug, Clone)]
pub struct GameState {
    character: Character,
    location: String,
    inventory: Vec<String>,
    health: i32,
    experience: u32,
    quests: Vec<String>,
}

impl GameState {
    pub fn new(character: Character) -> Self {
        Self {
            character,
            location: STARTING_LOCATION.to_string(),
            inventory: Vec::new(),
            health: MAX_HEALTH,
            experience: 0,
            quests: Vec::new(),
        }
    }

    /// The only way to change the state.
    ///
    /// Empty strings count as absent. Health is clamped to `0..=MAX_HEALTH`
    /// on every call; experience only grows.
    pub fn update(&mut self, update: StateUpdate) {
        if let Some(location) = update.location.filter(|l| !l.is_empty()) {
            self.location = location;
        }
        if let Some(item) = update.item.filter(|i| !i.is_empty()) {
            self.inventory.push(item);
        }
        self.health = self
            .health
            .saturating_add(update.health_change)
            .clamp(0, MAX_HEALTH);
        self.experience = self.experience.saturating_add(update.exp_gain);
        if let Some(quest) = update.quest.filter(|q| !q.is_empty()) {
            self.quests.push(quest);
        }
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn inventory(&self) -> &[String] {
        &self.inventory
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn experience(&self) -> u32 {
        self.experience
    }

    pub fn quests(&self) -> &[String] {
        &self.quests
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.character)?;
        write!(
            f,
            "Location: {}, Health: {}, XP: {}, Inventory: {}, Quests: {}",
            self.location,
            self.health,
            self.experience,
            self.inventory.join(", "),
            self.quests.join(", ")
        )
    }
}
