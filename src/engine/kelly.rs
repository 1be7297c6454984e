//! Kelly criterion stake sizing for American-odds bets.

use super::odds::{self, OddsError};
use crate::config::SizingConfig;

/// Hard ceiling on any single recommendation, as a fraction of bankroll.
pub const MAX_BANKROLL_FRACTION: f64 = 0.10;

/// Full-Kelly fraction of bankroll: f* = (b*p - q) / b, with b = decimal - 1.
/// Negative when the bet has no edge.
pub fn kelly_fraction(true_probability: f64, american_odds: i32) -> Result<f64, OddsError> {
    let b = odds::decimal_odds(american_odds)? - 1.0;
    let p = true_probability;
    let q = 1.0 - p;
    Ok((b * p - q) / b)
}

/// Recommended stake in bankroll currency.
///
/// - `bankroll`: available balance
/// - `true_probability`: estimated win probability (0–1)
/// - `american_odds`: posted price
/// - `kelly_multiplier`: scaling factor (e.g. 0.25 for quarter-Kelly)
///
/// Always within `[0, 0.10 * bankroll]`; no edge means no bet.
pub fn kelly_stake(
    bankroll: f64,
    true_probability: f64,
    american_odds: i32,
    kelly_multiplier: f64,
) -> Result<f64, OddsError> {
    capped_stake(
        bankroll,
        true_probability,
        american_odds,
        kelly_multiplier,
        MAX_BANKROLL_FRACTION,
    )
}

fn capped_stake(
    bankroll: f64,
    true_probability: f64,
    american_odds: i32,
    kelly_multiplier: f64,
    max_fraction: f64,
) -> Result<f64, OddsError> {
    let f_star = kelly_fraction(true_probability, american_odds)?;
    if !bankroll.is_finite() || bankroll <= 0.0 {
        return Ok(0.0);
    }
    let adjusted = f_star * kelly_multiplier;
    if !adjusted.is_finite() {
        return Ok(0.0);
    }
    let ceiling = max_fraction.clamp(0.0, MAX_BANKROLL_FRACTION) * bankroll;
    Ok((adjusted * bankroll).clamp(0.0, ceiling))
}

/// Sized bet recommendation.
#[derive(Debug, Clone, PartialEq)]
pub struct StakeRecommendation {
    pub raw_fraction: f64,      // Full Kelly
    pub adjusted_fraction: f64, // After multiplier
    pub stake: f64,             // After 0..=cap clamp
    pub expected_profit: f64,   // stake * EV
    pub capped: bool,
}

pub struct StakeSizer {
    config: SizingConfig,
}

impl StakeSizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    pub fn recommend(
        &self,
        bankroll: f64,
        true_probability: f64,
        american_odds: i32,
    ) -> Result<StakeRecommendation, OddsError> {
        let raw_fraction = kelly_fraction(true_probability, american_odds)?;
        let adjusted_fraction = raw_fraction * self.config.kelly_fraction;
        let stake = capped_stake(
            bankroll,
            true_probability,
            american_odds,
            self.config.kelly_fraction,
            self.config.max_bankroll_fraction,
        )?;
        let ev_pct = odds::expected_value_percent(true_probability, american_odds)?;
        let uncapped = adjusted_fraction * bankroll;

        Ok(StakeRecommendation {
            raw_fraction,
            adjusted_fraction,
            stake,
            expected_profit: stake * ev_pct / 100.0,
            capped: uncapped > stake + f64::EPSILON && stake > 0.0,
        })
    }
}
