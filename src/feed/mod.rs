pub mod the_odds_api;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use types::{ApiQuota, EventRef, PropMarket};

/// Upstream source of player-prop quotes.
///
/// Methods take `&self` so the scanner can fetch several events concurrently.
#[async_trait]
pub trait OddsFeed: Send + Sync {
    async fn list_events(&self, sport: &str) -> Result<Vec<EventRef>>;
    async fn fetch_event_props(
        &self,
        sport: &str,
        event: &EventRef,
        markets: &[String],
    ) -> Result<Vec<PropMarket>>;
    fn last_quota(&self) -> Option<ApiQuota>;
}
