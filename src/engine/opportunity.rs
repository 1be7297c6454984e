use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::feed::types::{PropKey, SportsbookQuote};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Result of one detection pass. Never mutated; the next pass replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Opportunity {
    Arbitrage(ArbitrageOpportunity),
    Ev(EvOpportunity),
}

impl Opportunity {
    pub fn id(&self) -> &str {
        match self {
            Opportunity::Arbitrage(a) => &a.id,
            Opportunity::Ev(e) => &e.id,
        }
    }

    pub fn key(&self) -> &PropKey {
        match self {
            Opportunity::Arbitrage(a) => &a.key,
            Opportunity::Ev(e) => &e.key,
        }
    }

    /// Profit % for arbitrage, best-side EV % for EV plays.
    pub fn score(&self) -> f64 {
        match self {
            Opportunity::Arbitrage(a) => a.guaranteed_profit_pct,
            Opportunity::Ev(e) => e.max_ev_pct(),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Opportunity::Arbitrage(a) => a.created_at,
            Opportunity::Ev(e) => e.created_at,
        }
    }

    pub fn confidence(&self) -> Confidence {
        match self {
            Opportunity::Arbitrage(a) => a.confidence,
            Opportunity::Ev(e) => e.confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArbKind {
    /// Both legs priced so payout beats stake on either outcome.
    Arbitrage,
    /// Over at the lower line, Under at the higher line; both win inside the window.
    Middle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbLeg {
    pub sportsbook_id: String,
    pub display_name: String,
    pub line: f64,
    pub odds: i32,
    pub implied_prob: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrageOpportunity {
    pub id: String,
    pub key: PropKey,
    pub kind: ArbKind,
    pub over_leg: ArbLeg,
    pub under_leg: ArbLeg,
    pub line_diff: f64,
    pub total_implied: f64,
    pub guaranteed_profit_pct: f64,
    pub total_stake: f64,
    pub over_stake: f64,
    pub under_stake: f64,
    pub profit_amount: f64,
    pub confidence: Confidence,
    pub created_at: DateTime<Utc>,
    /// Soft TTL: odds have likely moved after this.
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPrice {
    pub sportsbook_id: String,
    pub display_name: String,
    pub line: f64,
    pub odds: i32,
    pub implied_prob: f64,
    pub ev_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineRange {
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub spread: f64,
}

impl LineRange {
    /// Returns `None` for an empty slice.
    pub fn from_lines(lines: &[f64]) -> Option<Self> {
        if lines.is_empty() {
            return None;
        }
        let min = lines.iter().copied().fold(f64::INFINITY, f64::min);
        let max = lines.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let average = lines.iter().sum::<f64>() / lines.len() as f64;
        Some(Self {
            min,
            max,
            average,
            spread: max - min,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvOpportunity {
    pub id: String,
    pub key: PropKey,
    pub estimated_true_probability_over: f64,
    pub best_over: BookPrice,
    pub best_under: BookPrice,
    pub all_books: Vec<SportsbookQuote>,
    pub line_range: LineRange,
    /// 1..=5 stars
    pub rating: u8,
    pub confidence: Confidence,
    pub created_at: DateTime<Utc>,
}

impl EvOpportunity {
    pub fn max_ev_pct(&self) -> f64 {
        self.best_over.ev_pct.max(self.best_under.ev_pct)
    }
}
