use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::odds::{self, OddsError};

/// Normalized internal types used by the engine (provider-agnostic).

/// Which side of a two-way prop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Over,
    Under,
}

/// Identity of a prop: who, what stat, which game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropKey {
    pub player: String,
    pub prop_type: String,
    pub game: String,
}

impl PropKey {
    pub fn new(player: &str, prop_type: &str, game: &str) -> Self {
        Self {
            player: player.to_string(),
            prop_type: prop_type.to_string(),
            game: game.to_string(),
        }
    }

    /// Ranking collapses opportunities on (player, prop_type); the game is display-only.
    pub fn dedup_key(&self) -> (&str, &str) {
        (&self.player, &self.prop_type)
    }
}

/// One book's two-sided market for a prop at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SportsbookQuote {
    pub sportsbook_id: String,
    pub display_name: String,
    pub line: f64,
    pub over_odds: Option<i32>, // American odds
    pub under_odds: Option<i32>, // American odds
    pub observed_at: DateTime<Utc>,
}

impl SportsbookQuote {
    pub fn over_implied_prob(&self) -> Option<f64> {
        self.over_odds.and_then(|o| odds::implied_probability(o).ok())
    }

    pub fn under_implied_prob(&self) -> Option<f64> {
        self.under_odds.and_then(|o| odds::implied_probability(o).ok())
    }

    /// Both sides present and valid. Incomplete quotes are skipped by every detector.
    pub fn priced(&self) -> Option<PricedQuote<'_>> {
        let over_odds = self.over_odds?;
        let under_odds = self.under_odds?;
        let over_implied = odds::implied_probability(over_odds).ok()?;
        let under_implied = odds::implied_probability(under_odds).ok()?;
        Some(PricedQuote {
            quote: self,
            over_odds,
            under_odds,
            over_implied,
            under_implied,
        })
    }
}

/// A complete quote with both implied probabilities resolved.
#[derive(Debug, Clone, Copy)]
pub struct PricedQuote<'a> {
    pub quote: &'a SportsbookQuote,
    pub over_odds: i32,
    pub under_odds: i32,
    pub over_implied: f64,
    pub under_implied: f64,
}

impl PricedQuote<'_> {
    pub fn odds(&self, side: Side) -> i32 {
        match side {
            Side::Over => self.over_odds,
            Side::Under => self.under_odds,
        }
    }

    pub fn implied(&self, side: Side) -> f64 {
        match side {
            Side::Over => self.over_implied,
            Side::Under => self.under_implied,
        }
    }

    /// Two-sided implied sum; above 1.0 by the book's margin.
    pub fn total_implied(&self) -> f64 {
        self.over_implied + self.under_implied
    }

    pub fn ev_percent(&self, side: Side, true_probability: f64) -> Result<f64, OddsError> {
        odds::expected_value_percent(true_probability, self.odds(side))
    }
}

/// Complete quotes in input order.
pub fn priced_quotes(quotes: &[SportsbookQuote]) -> Vec<PricedQuote<'_>> {
    let priced: Vec<_> = quotes.iter().filter_map(SportsbookQuote::priced).collect();
    if priced.len() < quotes.len() {
        tracing::debug!(
            skipped = quotes.len() - priced.len(),
            "skipping incomplete sportsbook quotes"
        );
    }
    priced
}

/// All quotes for one prop, as handed to the detectors and stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropMarket {
    pub key: PropKey,
    pub quotes: Vec<SportsbookQuote>,
}

/// An upstream event (game) that carries player props.
#[derive(Debug, Clone)]
pub struct EventRef {
    pub event_id: String,
    pub home_team: String,
    pub away_team: String,
    pub commence_time: String,
}

impl EventRef {
    pub fn matchup(&self) -> String {
        format!("{} @ {}", self.away_team, self.home_team)
    }
}

/// API usage quota info extracted from response headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiQuota {
    pub requests_used: u64,
    pub requests_remaining: u64,
}

impl ApiQuota {
    pub fn is_exhausted(&self) -> bool {
        self.requests_remaining == 0
    }
}

/// the-odds-api.com v4 `/events` response entry
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct TheOddsApiEvent {
    pub id: String,
    pub sport_key: String,
    pub home_team: String,
    pub away_team: String,
    pub commence_time: String,
}

/// the-odds-api.com v4 `/events/{id}/odds` response
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct TheOddsApiEventOdds {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub bookmakers: Vec<TheOddsApiBookmaker>,
}

#[derive(Debug, Deserialize)]
pub struct TheOddsApiBookmaker {
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub markets: Vec<TheOddsApiMarket>,
}

#[derive(Debug, Deserialize)]
pub struct TheOddsApiMarket {
    pub key: String,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub outcomes: Vec<TheOddsApiOutcome>,
}

#[derive(Debug, Deserialize)]
pub struct TheOddsApiOutcome {
    /// "Over" or "Under"
    pub name: String,
    /// Player name for player-prop markets.
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub point: Option<f64>,
}
