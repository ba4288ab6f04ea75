//! Rank progression: experience accumulation against a fixed ladder of
//! cumulative thresholds.
//!
//! The ladder has five ordinary ranks ending at Agricultural Expert. "Reborn"
//! is deliberately not a rank; it is rebirth-engine state (see the rebirth
//! module) rendered separately. Advancement is single-step: one grant moves a
//! player up at most one rank even when the gain crosses several thresholds,
//! matching the long-standing server behavior that players rank up once per
//! award.

use serde::{Deserialize, Serialize};

use crate::economy::errors::EconomyError;

/// Number of ordinary ranks on the ladder.
pub const RANK_COUNT: usize = 5;

/// Ordered progression ranks, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Newcomer,
    Farmer,
    ExpertFarmer,
    MasterFarmer,
    AgriculturalExpert,
}

impl Rank {
    pub const ALL: [Rank; RANK_COUNT] = [
        Rank::Newcomer,
        Rank::Farmer,
        Rank::ExpertFarmer,
        Rank::MasterFarmer,
        Rank::AgriculturalExpert,
    ];

    /// Zero-based position on the ladder.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Rank> {
        Rank::ALL.get(index).copied()
    }

    /// The rank one step up, or `None` at the top of the ladder.
    pub fn next(&self) -> Option<Rank> {
        Rank::from_index(self.index() + 1)
    }

    pub fn is_max(&self) -> bool {
        self.next().is_none()
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Rank::Newcomer => "Newcomer",
            Rank::Farmer => "Farmer",
            Rank::ExpertFarmer => "Expert Farmer",
            Rank::MasterFarmer => "Master Farmer",
            Rank::AgriculturalExpert => "Agricultural Expert",
        }
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Immutable cumulative experience thresholds, one per rank. Built once from
/// configuration and shared by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankLadder {
    thresholds: [u64; RANK_COUNT],
}

impl RankLadder {
    pub const DEFAULT_THRESHOLDS: [u64; RANK_COUNT] = [0, 5000, 15000, 30000, 60000];

    /// Validate and build a ladder. Requires exactly one threshold per rank,
    /// a zero first entry, and non-decreasing values.
    pub fn new(thresholds: &[u64]) -> Result<Self, EconomyError> {
        if thresholds.len() != RANK_COUNT {
            return Err(EconomyError::InvalidConfig(format!(
                "expected {} rank thresholds, got {}",
                RANK_COUNT,
                thresholds.len()
            )));
        }
        if thresholds[0] != 0 {
            return Err(EconomyError::InvalidConfig(format!(
                "first rank threshold must be 0, got {}",
                thresholds[0]
            )));
        }
        for pair in thresholds.windows(2) {
            if pair[1] < pair[0] {
                return Err(EconomyError::InvalidConfig(format!(
                    "rank thresholds must be non-decreasing ({} after {})",
                    pair[1], pair[0]
                )));
            }
        }
        let mut fixed = [0u64; RANK_COUNT];
        fixed.copy_from_slice(thresholds);
        Ok(Self { thresholds: fixed })
    }

    /// Cumulative experience required to hold `rank`.
    pub fn threshold(&self, rank: Rank) -> u64 {
        self.thresholds[rank.index()]
    }
}

impl Default for RankLadder {
    fn default() -> Self {
        Self {
            thresholds: Self::DEFAULT_THRESHOLDS,
        }
    }
}

/// Receipt for one experience grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperienceGain {
    /// Raw amount requested by the caller.
    pub base: u64,
    /// Amount actually added after the bonus multiplier, rounded down.
    pub applied: u64,
    /// New experience total.
    pub total: u64,
    /// Set when this grant triggered a rank-up.
    pub advanced_to: Option<Rank>,
}

/// Per-account progression state: current rank plus lifetime experience
/// (reset on rebirth).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progression {
    pub rank: Rank,
    pub experience: u64,
}

impl Progression {
    pub fn new() -> Self {
        Self {
            rank: Rank::Newcomer,
            experience: 0,
        }
    }

    pub fn from_parts(rank: Rank, experience: u64) -> Self {
        Self { rank, experience }
    }

    /// Grant experience. `amount == 0` is ignored (documented no-op, not an
    /// error). `bonus` is the account's total multiplier; the effective gain
    /// is rounded down to a whole point. Invokes `try_advance_rank` exactly
    /// once, so a grant crossing several thresholds still advances a single
    /// rank.
    pub fn add_experience(&mut self, amount: u64, bonus: f64, ladder: &RankLadder) -> ExperienceGain {
        if amount == 0 {
            return ExperienceGain {
                base: 0,
                applied: 0,
                total: self.experience,
                advanced_to: None,
            };
        }
        let applied = (amount as f64 * bonus).floor() as u64;
        self.experience = self.experience.saturating_add(applied);
        let advanced_to = if self.try_advance_rank(ladder) {
            Some(self.rank)
        } else {
            None
        };
        ExperienceGain {
            base: amount,
            applied,
            total: self.experience,
            advanced_to,
        }
    }

    /// Advance exactly one rank when the next threshold is met. Returns
    /// whether a rank-up happened. Never decreases rank.
    pub fn try_advance_rank(&mut self, ladder: &RankLadder) -> bool {
        let Some(next) = self.rank.next() else {
            return false;
        };
        if self.experience >= ladder.threshold(next) {
            self.rank = next;
            return true;
        }
        false
    }

    /// Percentage toward the next rank. Returns 100 at the top of the
    /// ladder. Can exceed 100 transiently when a grant crossed a threshold
    /// the single-step advance has not consumed yet.
    pub fn progress_percentage(&self, ladder: &RankLadder) -> f64 {
        let Some(next) = self.rank.next() else {
            return 100.0;
        };
        let current = ladder.threshold(self.rank) as f64;
        let target = ladder.threshold(next) as f64;
        if target <= current {
            return 100.0;
        }
        (self.experience as f64 - current) / (target - current) * 100.0
    }

    /// Back to the bottom of the ladder. Used by the rebirth engine.
    pub fn reset(&mut self) {
        self.rank = Rank::Newcomer;
        self.experience = 0;
    }
}

impl Default for Progression {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-width textual progress bar for status displays.
pub fn format_progress_bar(percentage: f64, width: usize) -> String {
    let clamped = percentage.clamp(0.0, 100.0);
    let filled = ((clamped / 100.0) * width as f64).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    for i in 0..width {
        bar.push(if i < filled { '█' } else { '░' });
    }
    bar.push(']');
    bar
}
