//! Positive expected-value detection against the consensus true probability.

use chrono::{DateTime, Utc};

use super::opportunity::{BookPrice, Confidence, EvOpportunity, LineRange};
use super::true_prob::estimate_true_probability;
use crate::config::DetectionConfig;
use crate::feed::types::{priced_quotes, PricedQuote, PropKey, Side, SportsbookQuote};

/// Star rating for the better side's EV %.
pub fn rating(max_ev_pct: f64) -> u8 {
    if max_ev_pct < 0.0 {
        1
    } else if max_ev_pct < 2.0 {
        2
    } else if max_ev_pct < 4.0 {
        3
    } else if max_ev_pct < 6.0 {
        4
    } else {
        5
    }
}

/// First match wins. `spread` is the max-min line across books.
pub fn ev_confidence(spread: f64, max_ev_pct: f64) -> Confidence {
    if spread <= 0.5 && max_ev_pct >= 4.0 {
        Confidence::High
    } else if spread <= 1.0 && max_ev_pct >= 3.0 {
        Confidence::High
    } else if spread <= 2.0 || max_ev_pct >= 2.5 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Book with the highest EV for `side`. Ties keep the earliest quote.
pub fn best_price(quotes: &[PricedQuote<'_>], side: Side, true_probability: f64) -> Option<BookPrice> {
    let mut best: Option<BookPrice> = None;
    for q in quotes {
        let ev_pct = match q.ev_percent(side, true_probability) {
            Ok(ev) => ev,
            Err(_) => continue,
        };
        if best.as_ref().map_or(true, |b| ev_pct > b.ev_pct) {
            best = Some(BookPrice {
                sportsbook_id: q.quote.sportsbook_id.clone(),
                display_name: q.quote.display_name.clone(),
                line: q.quote.line,
                odds: q.odds(side),
                implied_prob: q.implied(side),
                ev_pct,
            });
        }
    }
    best
}

/// Best over/under prices for a prop, or `None` when neither side clears
/// the minimum EV.
pub fn detect_ev(
    key: &PropKey,
    quotes: &[SportsbookQuote],
    config: &DetectionConfig,
    now: DateTime<Utc>,
) -> Option<EvOpportunity> {
    let priced = priced_quotes(quotes);
    if priced.is_empty() {
        return None;
    }

    let true_over = estimate_true_probability(&priced, Side::Over);
    let true_under = 1.0 - true_over;

    let best_over = best_price(&priced, Side::Over, true_over)?;
    let best_under = best_price(&priced, Side::Under, true_under)?;

    let lines: Vec<f64> = priced.iter().map(|q| q.quote.line).collect();
    let line_range = LineRange::from_lines(&lines)?;

    if best_over.ev_pct < config.min_ev_pct && best_under.ev_pct < config.min_ev_pct {
        return None;
    }

    let max_ev = best_over.ev_pct.max(best_under.ev_pct);
    tracing::debug!(
        player = %key.player,
        prop = %key.prop_type,
        true_over,
        max_ev,
        "+EV prop detected"
    );

    Some(EvOpportunity {
        id: format!("ev:{}:{}", key.player, key.prop_type),
        key: key.clone(),
        estimated_true_probability_over: true_over,
        best_over,
        best_under,
        all_books: priced.iter().map(|q| q.quote.clone()).collect(),
        line_range,
        rating: rating(max_ev),
        confidence: ev_confidence(line_range.spread, max_ev),
        created_at: now,
    })
}
