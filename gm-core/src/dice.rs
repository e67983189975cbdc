//! Dice expression parsing and rolling.
//!
//! Supports standard notation: `[count]d<sides>` with an optional signed
//! modifier and an optional keep clause (`kh<k>` / `kl<k>`), in either
//! order after the die, e.g. `2d6+3`, `4d6kh3`, `1d20-1`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound on dice per expression; a runaway count is a parse error.
const MAX_COUNT: u32 = 100;

/// Upper bound on die sides.
const MAX_SIDES: u32 = 1000;

/// Error type for dice parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("Invalid dice count: {0}")]
    InvalidDiceCount(u32),
    #[error("Cannot keep {keep} dice when only rolling {count} (in {notation})")]
    InvalidKeepCount {
        keep: u32,
        count: u32,
        notation: String,
    },
}

/// Advantage state for single d20 rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

/// Keep clause: keep the k highest or k lowest of the rolled set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keep {
    Highest(u32),
    Lowest(u32),
}

/// A parsed dice expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiceExpression {
    pub count: u32,
    pub sides: u32,
    pub modifier: i32,
    pub keep: Option<Keep>,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let normalized: String = notation
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        let d_pos = normalized
            .find('d')
            .ok_or_else(|| DiceError::InvalidNotation(notation.to_string()))?;

        let count_str = &normalized[..d_pos];
        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(notation.to_string()))?
        };
        if count == 0 || count > MAX_COUNT {
            return Err(DiceError::InvalidDiceCount(count));
        }

        let rest = &normalized[d_pos + 1..];
        let sides_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if sides_len == 0 {
            return Err(DiceError::InvalidNotation(notation.to_string()));
        }
        let sides: u32 = rest[..sides_len]
            .parse()
            .map_err(|_| DiceError::InvalidNotation(notation.to_string()))?;
        if sides < 2 || sides > MAX_SIDES {
            return Err(DiceError::InvalidDieSize(sides));
        }

        // Keep clause and modifier may appear in either order after the die.
        let mut keep = None;
        let mut modifier: i32 = 0;
        let mut tail = &rest[sides_len..];
        while !tail.is_empty() {
            if let Some(after) = tail.strip_prefix("kh") {
                let (k, len) = take_number(after, notation)?;
                if keep.is_some() {
                    return Err(DiceError::InvalidNotation(notation.to_string()));
                }
                keep = Some(Keep::Highest(k));
                tail = &after[len..];
            } else if let Some(after) = tail.strip_prefix("kl") {
                let (k, len) = take_number(after, notation)?;
                if keep.is_some() {
                    return Err(DiceError::InvalidNotation(notation.to_string()));
                }
                keep = Some(Keep::Lowest(k));
                tail = &after[len..];
            } else if let Some(after) = tail.strip_prefix('+') {
                let (value, len) = take_number(after, notation)?;
                modifier += value as i32;
                tail = &after[len..];
            } else if let Some(after) = tail.strip_prefix('-') {
                let (value, len) = take_number(after, notation)?;
                modifier -= value as i32;
                tail = &after[len..];
            } else {
                return Err(DiceError::InvalidNotation(notation.to_string()));
            }
        }

        if let Some(Keep::Highest(k)) | Some(Keep::Lowest(k)) = keep {
            if k == 0 || k > count {
                return Err(DiceError::InvalidKeepCount {
                    keep: k,
                    count,
                    notation: notation.to_string(),
                });
            }
        }

        Ok(DiceExpression {
            count,
            sides,
            modifier,
            keep,
            original: normalized,
        })
    }

    /// Whether this is a bare single d20 (the only shape advantage applies to).
    pub fn is_bare_d20(&self) -> bool {
        self.count == 1 && self.sides == 20 && self.keep.is_none()
    }

    /// Roll the expression with the thread RNG.
    pub fn roll(&self) -> RollResult {
        self.roll_with_rng(&mut rand::thread_rng())
    }

    /// Roll with a specific RNG (useful for testing).
    pub fn roll_with_rng<R: Rng>(&self, rng: &mut R) -> RollResult {
        let rolls: Vec<u32> = (0..self.count)
            .map(|_| rng.gen_range(1..=self.sides))
            .collect();

        let kept = match self.keep {
            Some(Keep::Highest(k)) => {
                let mut sorted = rolls.clone();
                sorted.sort_unstable_by(|a, b| b.cmp(a));
                sorted.truncate(k as usize);
                sorted
            }
            Some(Keep::Lowest(k)) => {
                let mut sorted = rolls.clone();
                sorted.sort_unstable();
                sorted.truncate(k as usize);
                sorted
            }
            None => rolls.clone(),
        };

        self.result_from(rolls, kept, Advantage::Normal)
    }

    /// Roll with advantage or disadvantage.
    ///
    /// Advantage only applies to a bare single d20; any other shape is
    /// rolled plainly, advantage ignored.
    pub fn roll_with_advantage(&self, advantage: Advantage) -> RollResult {
        self.roll_with_advantage_rng(advantage, &mut rand::thread_rng())
    }

    /// Advantage roll with a specific RNG.
    pub fn roll_with_advantage_rng<R: Rng>(&self, advantage: Advantage, rng: &mut R) -> RollResult {
        if advantage == Advantage::Normal || !self.is_bare_d20() {
            return self.roll_with_rng(rng);
        }

        let first = rng.gen_range(1..=20u32);
        let second = rng.gen_range(1..=20u32);
        let chosen = match advantage {
            Advantage::Advantage => first.max(second),
            Advantage::Disadvantage => first.min(second),
            Advantage::Normal => unreachable!(),
        };

        self.result_from(vec![first, second], vec![chosen], advantage)
    }

    fn result_from(&self, rolls: Vec<u32>, kept: Vec<u32>, advantage: Advantage) -> RollResult {
        let subtotal: u32 = kept.iter().sum();
        let total = subtotal as i32 + self.modifier;

        // Natural 20/1 is the kept face of a single d20, judged before the
        // modifier is applied.
        let d20_face = (self.sides == 20 && kept.len() == 1).then(|| kept[0]);

        RollResult {
            expression: self.original.clone(),
            rolls,
            kept,
            modifier: self.modifier,
            subtotal,
            total,
            natural_20: d20_face == Some(20),
            natural_1: d20_face == Some(1),
            advantage,
        }
    }
}

fn take_number(s: &str, notation: &str) -> Result<(u32, usize), DiceError> {
    let len = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if len == 0 {
        return Err(DiceError::InvalidNotation(notation.to_string()));
    }
    let value = s[..len]
        .parse()
        .map_err(|_| DiceError::InvalidNotation(notation.to_string()))?;
    Ok((value, len))
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Complete result of a dice roll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollResult {
    pub expression: String,
    pub rolls: Vec<u32>,
    pub kept: Vec<u32>,
    pub modifier: i32,
    pub subtotal: u32,
    pub total: i32,
    pub natural_20: bool,
    pub natural_1: bool,
    pub advantage: Advantage,
}

impl RollResult {
    /// Format the rolled and kept dice for display, e.g. `[6, 4, (1)] + 2`.
    pub fn dice_display(&self) -> String {
        let shown = if self.rolls.len() > self.kept.len() {
            let mut kept_used = vec![false; self.kept.len()];
            self.rolls
                .iter()
                .map(|&roll| {
                    let is_kept = self.kept.iter().enumerate().any(|(i, &k)| {
                        if k == roll && !kept_used[i] {
                            kept_used[i] = true;
                            true
                        } else {
                            false
                        }
                    });
                    if is_kept {
                        roll.to_string()
                    } else {
                        format!("({roll})")
                    }
                })
                .collect::<Vec<_>>()
        } else {
            self.rolls.iter().map(|r| r.to_string()).collect()
        };

        let dice_str = format!("[{}]", shown.join(", "));
        match self.modifier.cmp(&0) {
            std::cmp::Ordering::Greater => format!("{} + {}", dice_str, self.modifier),
            std::cmp::Ordering::Less => format!("{} - {}", dice_str, self.modifier.abs()),
            std::cmp::Ordering::Equal => dice_str,
        }
    }

    /// Check if the roll meets or exceeds a DC.
    pub fn meets_dc(&self, dc: i32) -> bool {
        self.total >= dc
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.dice_display(), self.total)
    }
}

/// Convenience function to roll from a notation string.
pub fn roll(notation: &str) -> Result<RollResult, DiceError> {
    let expr = DiceExpression::parse(notation)?;
    Ok(expr.roll())
}

/// Roll with advantage/disadvantage from a notation string.
pub fn roll_with_advantage(notation: &str, advantage: Advantage) -> Result<RollResult, DiceError> {
    let expr = DiceExpression::parse(notation)?;
    Ok(expr.roll_with_advantage(advantage))
}
