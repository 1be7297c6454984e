//! Cross-book arbitrage and middle detection for a single prop.
//!
//! Every unordered pair of complete quotes from different books is checked
//! twice: once for a straight arbitrage (either leg assignment whose combined
//! implied probability is below 1.0) and once for a middle window when the two
//! lines are far enough apart. Pair counts are tiny (single-digit books per
//! prop), so the O(n²) scan is fine.

use chrono::{DateTime, Duration, Utc};

use super::opportunity::{ArbKind, ArbLeg, ArbitrageOpportunity, Confidence};
use crate::config::DetectionConfig;
use crate::feed::types::{priced_quotes, PricedQuote, PropKey, SportsbookQuote};

/// Guaranteed profit % for a combined implied probability.
pub fn profit_pct(total_implied: f64) -> f64 {
    (1.0 / total_implied - 1.0) * 100.0
}

/// Split `total_stake` across two legs in proportion to their implied
/// probabilities so both outcomes pay the same. Returns (over, under).
pub fn split_stake(over_implied: f64, under_implied: f64, total_stake: f64) -> (f64, f64) {
    let total = over_implied + under_implied;
    (
        over_implied / total * total_stake,
        under_implied / total * total_stake,
    )
}

/// First match wins.
pub fn arbitrage_confidence(line_diff: f64, profit_pct: f64) -> Confidence {
    if line_diff < f64::EPSILON && profit_pct >= 1.5 {
        Confidence::High
    } else if line_diff <= 1.0 && profit_pct >= 1.0 {
        Confidence::High
    } else if line_diff <= 2.0 || profit_pct >= 0.8 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

pub fn middle_confidence(line_diff: f64, config: &DetectionConfig) -> Confidence {
    if line_diff >= config.middle_wide_line_diff {
        Confidence::High
    } else {
        Confidence::Medium
    }
}

/// Every arbitrage and middle that clears threshold, in pair scan order.
pub fn find_candidates(
    key: &PropKey,
    quotes: &[SportsbookQuote],
    config: &DetectionConfig,
    now: DateTime<Utc>,
) -> Vec<ArbitrageOpportunity> {
    let priced = priced_quotes(quotes);
    let mut found = Vec::new();

    for (i, a) in priced.iter().enumerate() {
        for b in &priced[i + 1..] {
            if a.quote.sportsbook_id == b.quote.sportsbook_id {
                continue;
            }
            let line_diff = (a.quote.line - b.quote.line).abs();

            if let Some(arb) = straight_arbitrage(key, a, b, line_diff, config, now) {
                found.push(arb);
            }
            if let Some(middle) = middle(key, a, b, line_diff, config, now) {
                found.push(middle);
            }
        }
    }

    found
}

/// Best single opportunity for the prop (highest profit %, first on ties).
pub fn detect_arbitrage(
    key: &PropKey,
    quotes: &[SportsbookQuote],
    config: &DetectionConfig,
    now: DateTime<Utc>,
) -> Option<ArbitrageOpportunity> {
    let mut best: Option<ArbitrageOpportunity> = None;
    for candidate in find_candidates(key, quotes, config, now) {
        let better = best
            .as_ref()
            .map_or(true, |b| candidate.guaranteed_profit_pct > b.guaranteed_profit_pct);
        if better {
            best = Some(candidate);
        }
    }
    if let Some(ref arb) = best {
        tracing::debug!(
            player = %key.player,
            prop = %key.prop_type,
            kind = ?arb.kind,
            profit_pct = arb.guaranteed_profit_pct,
            "arbitrage detected"
        );
    }
    best
}

fn straight_arbitrage(
    key: &PropKey,
    a: &PricedQuote<'_>,
    b: &PricedQuote<'_>,
    line_diff: f64,
    config: &DetectionConfig,
    now: DateTime<Utc>,
) -> Option<ArbitrageOpportunity> {
    let a_over = a.over_implied + b.under_implied;
    let b_over = b.over_implied + a.under_implied;

    // Keep whichever assignment is cheaper, if either is under 1.0.
    let (over, under, total) = if a_over <= b_over { (a, b, a_over) } else { (b, a, b_over) };
    if total >= 1.0 {
        return None;
    }

    let profit = profit_pct(total);
    if profit < config.min_arbitrage_profit_pct {
        return None;
    }

    let confidence = arbitrage_confidence(line_diff, profit);
    Some(build(key, ArbKind::Arbitrage, over, under, line_diff, confidence, config, now))
}

fn middle(
    key: &PropKey,
    a: &PricedQuote<'_>,
    b: &PricedQuote<'_>,
    line_diff: f64,
    config: &DetectionConfig,
    now: DateTime<Utc>,
) -> Option<ArbitrageOpportunity> {
    if line_diff < config.middle_min_line_diff {
        return None;
    }

    let (low, high) = if a.quote.line < b.quote.line { (a, b) } else { (b, a) };
    let total = low.over_implied + high.under_implied;
    let profit = profit_pct(total);

    // A wide window is worth flagging even without locked-in profit.
    let attractive =
        profit >= config.min_arbitrage_profit_pct || line_diff >= config.middle_wide_line_diff;
    if !attractive {
        return None;
    }

    let confidence = middle_confidence(line_diff, config);
    Some(build(key, ArbKind::Middle, low, high, line_diff, confidence, config, now))
}

#[allow(clippy::too_many_arguments)]
fn build(
    key: &PropKey,
    kind: ArbKind,
    over: &PricedQuote<'_>,
    under: &PricedQuote<'_>,
    line_diff: f64,
    confidence: Confidence,
    config: &DetectionConfig,
    now: DateTime<Utc>,
) -> ArbitrageOpportunity {
    let total_implied = over.over_implied + under.under_implied;
    let total_stake = config.total_stake;
    let (over_stake, under_stake) = split_stake(over.over_implied, under.under_implied, total_stake);
    let payout = total_stake / total_implied;

    let kind_tag = match kind {
        ArbKind::Arbitrage => "arb",
        ArbKind::Middle => "middle",
    };

    ArbitrageOpportunity {
        id: format!(
            "{}:{}:{}:{}:{}",
            kind_tag, key.player, key.prop_type, over.quote.sportsbook_id, under.quote.sportsbook_id
        ),
        key: key.clone(),
        kind,
        over_leg: ArbLeg {
            sportsbook_id: over.quote.sportsbook_id.clone(),
            display_name: over.quote.display_name.clone(),
            line: over.quote.line,
            odds: over.over_odds,
            implied_prob: over.over_implied,
        },
        under_leg: ArbLeg {
            sportsbook_id: under.quote.sportsbook_id.clone(),
            display_name: under.quote.display_name.clone(),
            line: under.quote.line,
            odds: under.under_odds,
            implied_prob: under.under_implied,
        },
        line_diff,
        total_implied,
        guaranteed_profit_pct: profit_pct(total_implied),
        total_stake,
        over_stake,
        under_stake,
        profit_amount: payout - total_stake,
        confidence,
        created_at: now,
        expires_at: Duration::try_minutes(config.arbitrage_ttl_mins)
            .and_then(|ttl| now.checked_add_signed(ttl)),
    }
}
