//! American odds conversions and expected value.
//!
//! Every function that divides by an odds-derived quantity validates the odds
//! first, so a zero or malformed price surfaces as `OddsError::InvalidOdds`
//! instead of an infinite or NaN result.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OddsError {
    #[error("invalid American odds: {0} (magnitude must be at least 100)")]
    InvalidOdds(i32),
}

/// Check that `odds` is a usable American price: non-zero with |odds| >= 100.
pub fn validate(odds: i32) -> Result<i32, OddsError> {
    if odds.unsigned_abs() < 100 {
        return Err(OddsError::InvalidOdds(odds));
    }
    Ok(odds)
}

/// Convert American odds to implied probability.
/// Positive odds (e.g., +150): prob = 100 / (odds + 100)
/// Negative odds (e.g., -150): prob = |odds| / (|odds| + 100)
pub fn implied_probability(odds: i32) -> Result<f64, OddsError> {
    let odds = validate(odds)?;
    let prob = if odds > 0 {
        100.0 / (odds as f64 + 100.0)
    } else {
        let abs = -(odds as f64);
        abs / (abs + 100.0)
    };
    Ok(prob)
}

/// Convert American odds to decimal odds (total return per unit staked).
pub fn decimal_odds(odds: i32) -> Result<f64, OddsError> {
    let odds = validate(odds)?;
    let decimal = if odds > 0 {
        odds as f64 / 100.0 + 1.0
    } else {
        100.0 / -(odds as f64) + 1.0
    };
    Ok(decimal)
}

/// Expected profit of a bet as a percentage of stake.
///
/// `(p * decimal - 1) * 100`. Strictly increasing in `true_probability`
/// for a fixed price since `decimal > 1`.
pub fn expected_value_percent(true_probability: f64, odds: i32) -> Result<f64, OddsError> {
    let decimal = decimal_odds(odds)?;
    Ok((true_probability * decimal - 1.0) * 100.0)
}

/// Fair American price for a probability. Returns `None` outside (0, 1).
pub fn probability_to_american(prob: f64) -> Option<i32> {
    if !prob.is_finite() || prob <= 0.0 || prob >= 1.0 {
        return None;
    }
    let odds = if prob >= 0.5 {
        -(prob / (1.0 - prob)) * 100.0
    } else {
        (1.0 - prob) / prob * 100.0
    };
    Some(odds.round() as i32)
}

/// Devig one book's two-way market into fair probabilities.
/// Returns (over_fair_prob, under_fair_prob).
pub fn devig(over_odds: i32, under_odds: i32) -> Result<(f64, f64), OddsError> {
    let over = implied_probability(over_odds)?;
    let under = implied_probability(under_odds)?;
    let total = over + under;
    Ok((over / total, under / total))
}
