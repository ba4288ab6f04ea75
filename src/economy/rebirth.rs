//! Rebirth ("prestige") engine: a permanent reset of rank and experience in
//! exchange for a permanent experience multiplier and a cosmetic tier.
//!
//! Layered on top are the temporary effects that stack additively with the
//! permanent bonus: blessings granted by high-rebirth players and admin-set
//! timed experience boosts. Expired effects are treated as absent and purged
//! lazily whenever they are read; a sweep over all accounts also exists for
//! housekeeping.

use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::economy::errors::EconomyError;
use crate::economy::ledger::Ledger;
use crate::economy::progression::{Progression, Rank};
use crate::economy::types::{
    DeclineReason, ExpBoost, Outcome, TransactionKind, SYSTEM_ACCOUNT,
};

/// Rebirth level at which deity abilities unlock.
pub const DEITY_LEVEL: u32 = 10;
/// Rebirth level at which seasonal market insight unlocks.
pub const SEASONAL_INSIGHT_LEVEL: u32 = 15;
/// Extra boost per blesser rebirth level on top of the flat blessing bonus.
const BLESS_BOOST_PER_LEVEL: f64 = 0.05;
/// Abundance aura base radius in blocks.
const BASE_AURA_RADIUS: u32 = 20;
/// Aura radius gained per rebirth level above five.
const AURA_RADIUS_STEP: u32 = 2;
/// Stars rendered before falling back to a numeric badge.
const MAX_STARS: u32 = 5;

/// Cost, requirement, and bonus for one rebirth level. Tiers may be sparse
/// in configuration; [`RebirthRules::tier_for`] fills the gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebirthTier {
    pub level: u32,
    pub name: String,
    pub color: String,
    pub xp_multiplier: f64,
    pub min_rank: Rank,
    pub cost: f64,
}

/// Immutable rebirth rules, built once from configuration and passed by
/// reference into the engine.
#[derive(Debug, Clone)]
pub struct RebirthRules {
    pub max_level: u32,
    pub cooldown: Duration,
    /// Permanent bonus added to the experience multiplier per rebirth level.
    pub bonus_per_level: f64,
    /// Cost of a derived tier is `base_cost * level`.
    pub base_cost: f64,
    /// Multiplier of a derived tier is `base_multiplier_per_level * level`.
    pub base_multiplier_per_level: f64,
    pub default_min_rank: Rank,
    pub keep_rank_on_rebirth: bool,
    /// Villager trades required before a rebirth; zero disables the gate.
    pub required_trades: u32,
    pub min_bless_level: u32,
    pub bless_cooldown: Duration,
    pub blessing_duration: Duration,
    /// Flat bonus an active blessing adds to the total multiplier.
    pub blessing_bonus: f64,
    tiers: BTreeMap<u32, RebirthTier>,
}

impl Default for RebirthRules {
    fn default() -> Self {
        Self {
            max_level: 100,
            cooldown: Duration::hours(1),
            bonus_per_level: 0.05,
            base_cost: 100.0,
            base_multiplier_per_level: 0.1,
            default_min_rank: Rank::AgriculturalExpert,
            keep_rank_on_rebirth: false,
            required_trades: 0,
            min_bless_level: 3,
            bless_cooldown: Duration::hours(24),
            blessing_duration: Duration::minutes(20),
            blessing_bonus: 0.1,
            tiers: BTreeMap::new(),
        }
    }
}

impl RebirthRules {
    /// Install explicitly configured tiers. Levels must be unique and within
    /// `1..=max_level`.
    pub fn with_tiers(mut self, tiers: Vec<RebirthTier>) -> Result<Self, EconomyError> {
        for tier in tiers {
            if tier.level == 0 || tier.level > self.max_level {
                return Err(EconomyError::InvalidConfig(format!(
                    "rebirth tier level {} outside 1..={}",
                    tier.level, self.max_level
                )));
            }
            if self.tiers.insert(tier.level, tier).is_some() {
                return Err(EconomyError::InvalidConfig(
                    "duplicate rebirth tier level".to_string(),
                ));
            }
        }
        Ok(self)
    }

    /// Resolve the tier for a level: exact match first, then the nearest
    /// lower configured tier re-leveled upward, then a fully derived tier
    /// from the base rates.
    pub fn tier_for(&self, level: u32) -> RebirthTier {
        if let Some(tier) = self.tiers.get(&level) {
            return tier.clone();
        }
        if let Some((_, lower)) = self.tiers.range(..level).next_back() {
            let mut tier = lower.clone();
            tier.level = level;
            return tier;
        }
        RebirthTier {
            level,
            name: format!("Rebirth {}", level),
            color: "gray".to_string(),
            xp_multiplier: level as f64 * self.base_multiplier_per_level,
            min_rank: self.default_min_rank,
            cost: self.base_cost * level as f64,
        }
    }

    /// Permanent experience multiplier for a rebirth level: 1.0 plus the
    /// resolved tier bonus. Level zero means never reborn.
    pub fn experience_multiplier(&self, level: u32) -> f64 {
        if level == 0 {
            return 1.0;
        }
        1.0 + self.tier_for(level).xp_multiplier
    }
}

/// Per-account rebirth state: the permanent level plus the timed effects.
#[derive(Debug, Clone, PartialEq)]
pub struct RebirthState {
    pub level: u32,
    pub last_rebirth_at: Option<DateTime<Utc>>,
    pub aura_enabled: bool,
    pub blessing_expires_at: Option<DateTime<Utc>>,
    pub exp_boost: Option<ExpBoost>,
    pub last_bless_given_at: Option<DateTime<Utc>>,
    pub trade_count: u32,
}

impl RebirthState {
    pub fn new() -> Self {
        Self {
            level: 0,
            last_rebirth_at: None,
            aura_enabled: false,
            blessing_expires_at: None,
            exp_boost: None,
            last_bless_given_at: None,
            trade_count: 0,
        }
    }

    /// Whether a blessing is active at `now`. Purges an expired entry.
    pub fn has_active_blessing(&mut self, now: DateTime<Utc>) -> bool {
        match self.blessing_expires_at {
            Some(expires) if expires > now => true,
            Some(_) => {
                self.blessing_expires_at = None;
                false
            }
            None => false,
        }
    }

    /// Current boost multiplier at `now`, if any. Purges an expired entry.
    pub fn active_exp_boost(&mut self, now: DateTime<Utc>) -> Option<f64> {
        match self.exp_boost {
            Some(boost) if boost.active_at(now) => Some(boost.multiplier),
            Some(_) => {
                self.exp_boost = None;
                None
            }
            None => None,
        }
    }

    /// Install a timed experience boost. The multiplier is absolute
    /// (1.25 = +25%) and must be at least 1.0.
    pub fn set_exp_boost(
        &mut self,
        multiplier: f64,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), EconomyError> {
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(EconomyError::InvalidAmount(format!(
                "exp boost multiplier must be >= 1.0, got {}",
                multiplier
            )));
        }
        self.exp_boost = Some(ExpBoost {
            multiplier,
            expires_at: now + duration,
        });
        Ok(())
    }

    /// Drop any effects that have expired by `now`. Returns how many were
    /// purged.
    pub fn cleanup_expired(&mut self, now: DateTime<Utc>) -> usize {
        let mut purged = 0;
        if matches!(self.blessing_expires_at, Some(expires) if expires <= now) {
            self.blessing_expires_at = None;
            purged += 1;
        }
        if matches!(self.exp_boost, Some(boost) if !boost.active_at(now)) {
            self.exp_boost = None;
            purged += 1;
        }
        purged
    }

    /// Combined experience multiplier at `now`: the permanent per-level
    /// bonus plus the flat blessing bonus plus the boost delta, additively.
    pub fn total_bonus(&mut self, rules: &RebirthRules, now: DateTime<Utc>) -> f64 {
        let mut bonus = 1.0 + self.level as f64 * rules.bonus_per_level;
        if self.has_active_blessing(now) {
            bonus += rules.blessing_bonus;
        }
        if let Some(multiplier) = self.active_exp_boost(now) {
            bonus += multiplier - 1.0;
        }
        bonus
    }

    /// Flip the abundance aura and return the new state.
    pub fn toggle_aura(&mut self) -> bool {
        self.aura_enabled = !self.aura_enabled;
        self.aura_enabled
    }

    /// Aura radius in blocks: grows past rebirth level five.
    pub fn aura_radius(&self) -> u32 {
        if self.level > 5 {
            BASE_AURA_RADIUS + (self.level - 5) * AURA_RADIUS_STEP
        } else {
            BASE_AURA_RADIUS
        }
    }

    pub fn has_deity_status(&self) -> bool {
        self.level >= DEITY_LEVEL
    }

    pub fn has_seasonal_insight(&self) -> bool {
        self.level >= SEASONAL_INSIGHT_LEVEL
    }

    /// Tally one villager trade and return the new count.
    pub fn record_trade(&mut self) -> u32 {
        self.trade_count = self.trade_count.saturating_add(1);
        self.trade_count
    }

    pub fn reset_trades(&mut self) {
        self.trade_count = 0;
    }

    /// Time left on the rebirth cooldown at `now`, if it is still running.
    pub fn cooldown_remaining(&self, cooldown: Duration, now: DateTime<Utc>) -> Option<Duration> {
        let last = self.last_rebirth_at?;
        let elapsed = now - last;
        if elapsed < cooldown {
            Some(cooldown - elapsed)
        } else {
            None
        }
    }
}

impl Default for RebirthState {
    fn default() -> Self {
        Self::new()
    }
}

/// Receipt for a successful rebirth.
#[derive(Debug, Clone, PartialEq)]
pub struct RebirthReceipt {
    pub new_level: u32,
    pub tier_name: String,
    pub cost_paid: f64,
    pub experience_multiplier: f64,
}

/// Receipt for a granted blessing.
#[derive(Debug, Clone, PartialEq)]
pub struct BlessReceipt {
    pub boost_multiplier: f64,
    pub expires_at: DateTime<Utc>,
}

/// Gate checks for a rebirth, in decline order: cooldown, level cap, rank,
/// trade count. Funds are the caller's concern. Passing every gate yields
/// the tier the next rebirth would use.
pub fn check_rebirth_gates(
    progression: &Progression,
    state: &RebirthState,
    rules: &RebirthRules,
    now: DateTime<Utc>,
) -> Result<RebirthTier, DeclineReason> {
    if let Some(remaining) = state.cooldown_remaining(rules.cooldown, now) {
        return Err(DeclineReason::CooldownActive {
            remaining_secs: remaining.num_seconds().max(1),
        });
    }
    if state.level >= rules.max_level {
        return Err(DeclineReason::RebirthCapReached {
            max: rules.max_level,
        });
    }
    let tier = rules.tier_for(state.level + 1);
    if progression.rank < tier.min_rank {
        return Err(DeclineReason::RankTooLow {
            required: tier.min_rank,
            current: progression.rank,
        });
    }
    if rules.required_trades > 0 && state.trade_count < rules.required_trades {
        return Err(DeclineReason::NotEnoughTrades {
            required: rules.required_trades,
            current: state.trade_count,
        });
    }
    Ok(tier)
}

/// The first unmet rebirth requirement, funds included, without mutating
/// anything. `None` means a rebirth would go through right now.
pub fn rebirth_eligibility(
    progression: &Progression,
    state: &RebirthState,
    rules: &RebirthRules,
    balance: f64,
    now: DateTime<Utc>,
) -> Option<DeclineReason> {
    match check_rebirth_gates(progression, state, rules, now) {
        Err(reason) => Some(reason),
        Ok(tier) if balance < tier.cost => Some(DeclineReason::InsufficientFunds {
            required: tier.cost,
            available: balance,
        }),
        Ok(_) => None,
    }
}

/// Attempt a rebirth. Preconditions run in decline order (cooldown, level
/// cap, rank gate, trade gate, funds) and the tier cost is deducted only
/// once everything else holds, so a decline never mutates anything. On
/// success the level increments and the cooldown anchor is recorded;
/// progression resets unless configured to keep rank.
pub fn perform_rebirth(
    ledger: &mut Ledger,
    progression: &mut Progression,
    state: &mut RebirthState,
    rules: &RebirthRules,
    now: DateTime<Utc>,
) -> Result<Outcome<RebirthReceipt>, EconomyError> {
    let tier = match check_rebirth_gates(progression, state, rules, now) {
        Ok(tier) => tier,
        Err(reason) => return Ok(Outcome::Declined(reason)),
    };
    if tier.cost > 0.0 {
        let note = format!("Rebirth to {}", tier.name);
        match ledger.debit(tier.cost, SYSTEM_ACCOUNT, TransactionKind::RankPurchase, note)? {
            Outcome::Declined(reason) => return Ok(Outcome::Declined(reason)),
            Outcome::Applied(_) => {}
        }
    }
    state.level = tier.level.min(rules.max_level);
    state.last_rebirth_at = Some(now);
    if !rules.keep_rank_on_rebirth {
        progression.reset();
    }
    info!(
        "account {} reborn at level {} ({})",
        ledger.account_id(),
        state.level,
        tier.name
    );
    Ok(Outcome::Applied(RebirthReceipt {
        new_level: state.level,
        tier_name: tier.name,
        cost_paid: tier.cost,
        experience_multiplier: rules.experience_multiplier(state.level),
    }))
}

/// Gate checks for giving a blessing: blesser rebirth level and the
/// blesser-side cooldown. Returns the decline reason when a gate fails.
pub fn check_bless_gates(
    blesser: &RebirthState,
    rules: &RebirthRules,
    now: DateTime<Utc>,
) -> Option<DeclineReason> {
    if blesser.level < rules.min_bless_level {
        return Some(DeclineReason::RebirthLevelTooLow {
            required: rules.min_bless_level,
            current: blesser.level,
        });
    }
    if let Some(last) = blesser.last_bless_given_at {
        let elapsed = now - last;
        if elapsed < rules.bless_cooldown {
            return Some(DeclineReason::CooldownActive {
                remaining_secs: (rules.bless_cooldown - elapsed).num_seconds().max(1),
            });
        }
    }
    None
}

/// Apply a blessing from a blesser of `blesser_level` to `target`: the
/// blessing flag and a matching timed exp boost, both expiring together.
pub fn grant_blessing(
    blesser_level: u32,
    target: &mut RebirthState,
    rules: &RebirthRules,
    now: DateTime<Utc>,
) -> BlessReceipt {
    let expires_at = now + rules.blessing_duration;
    let boost_multiplier =
        1.0 + rules.blessing_bonus + blesser_level as f64 * BLESS_BOOST_PER_LEVEL;
    target.blessing_expires_at = Some(expires_at);
    target.exp_boost = Some(ExpBoost {
        multiplier: boost_multiplier,
        expires_at,
    });
    BlessReceipt {
        boost_multiplier,
        expires_at,
    }
}

/// Bless another player: gate checks on the blesser, then the timed effects
/// on the target and the cooldown anchor on the blesser.
pub fn bless(
    blesser: &mut RebirthState,
    target: &mut RebirthState,
    rules: &RebirthRules,
    now: DateTime<Utc>,
) -> Result<Outcome<BlessReceipt>, EconomyError> {
    if let Some(reason) = check_bless_gates(blesser, rules, now) {
        return Ok(Outcome::Declined(reason));
    }
    let receipt = grant_blessing(blesser.level, target, rules, now);
    blesser.last_bless_given_at = Some(now);
    Ok(Outcome::Applied(receipt))
}

/// Star badge for a rebirth level: one star per level up to five, then a
/// numeric badge. Level zero renders empty.
pub fn format_rebirth_stars(level: u32) -> String {
    if level == 0 {
        String::new()
    } else if level <= MAX_STARS {
        "★".repeat(level as usize)
    } else {
        format!("[{}]", level)
    }
}

/// Humanized remaining-duration text for cooldown messages: days, hours,
/// minutes, and seconds only under an hour.
pub fn format_remaining(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut parts: Vec<String> = Vec::new();
    if days > 0 {
        parts.push(format!("{} day{}", days, if days > 1 { "s" } else { "" }));
    }
    if hours > 0 {
        parts.push(format!("{} hour{}", hours, if hours > 1 { "s" } else { "" }));
    }
    if minutes > 0 {
        parts.push(format!(
            "{} minute{}",
            minutes,
            if minutes > 1 { "s" } else { "" }
        ));
    }
    if seconds > 0 && days == 0 && hours == 0 {
        parts.push(format!(
            "{} second{}",
            seconds,
            if seconds > 1 { "s" } else { "" }
        ));
    }
    if parts.is_empty() {
        return "0 seconds".to_string();
    }
    parts.join(" ")
}
