pub mod arbitrage;
pub mod ev;
pub mod kelly;
pub mod odds;
pub mod opportunity;
pub mod ranking;
pub mod true_prob;

pub use odds::OddsError;
pub use opportunity::{Confidence, Opportunity};

use chrono::{DateTime, Utc};

use crate::config::DetectionConfig;
use crate::feed::types::PropMarket;

/// One detection pass over a set of prop markets: arbitrage and EV scans run
/// independently per prop, then results are deduplicated and ranked.
pub fn detect_opportunities(
    markets: &[PropMarket],
    config: &DetectionConfig,
    now: DateTime<Utc>,
) -> Vec<Opportunity> {
    let mut found = Vec::new();
    for market in markets {
        if let Some(arb) = arbitrage::detect_arbitrage(&market.key, &market.quotes, config, now) {
            found.push(Opportunity::Arbitrage(arb));
        }
        if let Some(ev) = ev::detect_ev(&market.key, &market.quotes, config, now) {
            found.push(Opportunity::Ev(ev));
        }
    }
    ranking::rank_and_dedup(found)
}
