//! Player character and parsing of the generated character sheet.

use rand::Rng;
use std::fmt;

/// The six abilities every character is guaranteed to have.
pub const ABILITIES: [&str; 6] = [
    "Strength",
    "Dexterity",
    "Constitution",
    "Intelligence",
    "Wisdom",
    "Charisma",
];

pub const DEFAULT_RACE: &str = "Human";
pub const DEFAULT_CLASS: &str = "Adventurer";
pub const DEFAULT_BACKGROUND: &str = "A mysterious traveler with an unknown past.";

/// Lowest and highest ability score.
pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 20;

/// An ability name and its score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub name: String,
    pub score: u8,
}

/// The player character. Built once and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub name: String,
    pub race: String,
    pub class: String,
    pub background: String,
    stats: Vec<Stat>,
}

impl Character {
    /// Build a character from a generated sheet of the form
    ///
    /// ```text
    /// Race: Elf
    /// Class: Ranger
    /// Background: Raised by wolves.
    /// Stats:
    /// - Strength: 12
    /// - Dexterity: 17
    /// ```
    ///
    /// Nothing here fails: missing text fields fall back to defaults, and a
    /// missing or unreadable score is rolled uniformly in 1..=20.
    pub fn from_sheet(name: impl Into<String>, sheet: &str, rng: &mut impl Rng) -> Self {
        let mut race = None;
        let mut class = None;
        let mut background = None;
        let mut stats: Vec<Stat> = Vec::new();

        for line in sheet.lines().map(str::trim) {
            if let Some(value) = line.strip_prefix("Race:") {
                race = non_empty(value);
            } else if let Some(value) = line.strip_prefix("Class:") {
                class = non_empty(value);
            } else if let Some(value) = line.strip_prefix("Background:") {
                background = non_empty(value);
            } else if let Some((ability, value)) = bulleted_stat(line) {
                let score = match value.parse::<u8>() {
                    Ok(score) if (MIN_SCORE..=MAX_SCORE).contains(&score) => score,
                    _ => {
                        tracing::debug!(ability, value, "unreadable ability score, rolling");
                        roll_score(rng)
                    }
                };
                set_stat(&mut stats, ability, score);
            }
        }

        for ability in ABILITIES {
            if !stats.iter().any(|s| s.name == ability) {
                tracing::debug!(ability, "ability missing from sheet, rolling");
                let score = roll_score(rng);
                stats.push(Stat {
                    name: ability.to_string(),
                    score,
                });
            }
        }

        Self {
            name: name.into(),
            race: race.unwrap_or_else(|| DEFAULT_RACE.to_string()),
            class: class.unwrap_or_else(|| DEFAULT_CLASS.to_string()),
            background: background.unwrap_or_else(|| DEFAULT_BACKGROUND.to_string()),
            stats,
        }
    }

    /// Scores in the order they were parsed, followed by any rolled ones.
    pub fn stats(&self) -> &[Stat] {
        &self.stats
    }

    pub fn stat(&self, ability: &str) -> Option<u8> {
        self.stats
            .iter()
            .find(|s| s.name == ability)
            .map(|s| s.score)
    }
}

impl fmt::Display for Character {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Name: {}, Race: {}, Class: {}, Background: {}, Stats: {{",
            self.name, self.race, self.class, self.background
        )?;
        for (i, stat) in self.stats.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", stat.name, stat.score)?;
        }
        write!(f, "}}")
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// `- Strength: 14` → `("Strength", "14")`.
fn bulleted_stat(line: &str) -> Option<(&str, &str)> {
    let (ability, value) = line.strip_prefix('-')?.split_once(':')?;
    let ability = ability.trim();
    (!ability.is_empty()).then(|| (ability, value.trim()))
}

fn set_stat(stats: &mut Vec<Stat>, ability: &str, score: u8) {
    match stats.iter_mut().find(|s| s.name == ability) {
        Some(existing) => existing.score = score,
        None => stats.push(Stat {
            name: ability.to_string(),
            score,
        }),
    }
}

fn roll_score(rng: &mut impl Rng) -> u8 {
    rng.gen_range(MIN_SCORE..=MAX_SCORE)
}
