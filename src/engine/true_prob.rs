//! Consensus-of-books true probability.
//!
//! Averages the raw implied probability for one side across books, then scales
//! it by the inverse of the *average* two-sided implied total. Removing the
//! average margin (rather than devigging each book and averaging) is a policy
//! choice kept as-is; there is no outcome model to calibrate it against.

use crate::feed::types::{PricedQuote, Side};

pub const MIN_TRUE_PROB: f64 = 0.01;
pub const MAX_TRUE_PROB: f64 = 0.99;

/// Estimate the vig-free probability of `side` from complete quotes.
///
/// Returns 0.5 with no quotes. Always within [0.01, 0.99].
pub fn estimate_true_probability(quotes: &[PricedQuote<'_>], side: Side) -> f64 {
    if quotes.is_empty() {
        return 0.5;
    }
    let n = quotes.len() as f64;

    let avg_side_prob = quotes.iter().map(|q| q.implied(side)).sum::<f64>() / n;
    let avg_total_implied = quotes.iter().map(|q| q.total_implied()).sum::<f64>() / n;

    if avg_total_implied <= 0.0 || !avg_total_implied.is_finite() {
        return 0.5;
    }

    let vig_multiplier = 1.0 / avg_total_implied;
    (avg_side_prob * vig_multiplier).clamp(MIN_TRUE_PROB, MAX_TRUE_PROB)
}
