//! Fetch orchestration: cache gate, concurrent per-event fetches, detection.

use anyhow::{Context, Result};
use futures_util::future::join_all;
use std::sync::Arc;

use crate::cache::{Clock, QuotaAwareCache};
use crate::config::{DetectionConfig, OddsFeedConfig};
use crate::engine::{self, Opportunity};
use crate::feed::types::PropMarket;
use crate::feed::OddsFeed;

/// Outcome of one scan pass.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub opportunities: Vec<Opportunity>,
    pub from_cache: bool,
    pub events_fetched: usize,
    pub events_failed: usize,
    pub props_scanned: usize,
}

pub struct PropScanner<F> {
    feed: F,
    cache: QuotaAwareCache<Vec<PropMarket>>,
    detection: DetectionConfig,
    markets: Vec<String>,
    market_type: String,
    clock: Arc<dyn Clock>,
}

impl<F: OddsFeed> PropScanner<F> {
    pub fn new(
        feed: F,
        cache: QuotaAwareCache<Vec<PropMarket>>,
        detection: DetectionConfig,
        feed_config: &OddsFeedConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            feed,
            cache,
            detection,
            markets: feed_config.markets.clone(),
            market_type: feed_config.market_list(),
            clock,
        }
    }

    pub fn cache(&self) -> &QuotaAwareCache<Vec<PropMarket>> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut QuotaAwareCache<Vec<PropMarket>> {
        &mut self.cache
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    /// Scan one sport. Uses cached quotes while they are fresh unless
    /// `force_refresh` is set. A pass where every event failed is not cached.
    pub async fn scan(&mut self, sport: &str, force_refresh: bool) -> Result<ScanReport> {
        self.cache.sweep_expired();
        let market_type = self.market_type.clone();

        let (markets, from_cache, events_fetched, events_failed) =
            match self.cached(sport, &market_type, force_refresh) {
                Some(markets) => (markets, true, 0, 0),
                None => {
                    let (markets, fetched, failed) = self.fetch_markets(sport).await?;
                    let quota = self.feed.last_quota();
                    if let Some(ref q) = quota {
                        self.cache.record_usage(q);
                    }
                    if fetched == 0 && failed > 0 {
                        tracing::warn!(sport, failed, "every event fetch failed; not caching");
                    } else {
                        self.cache.set(
                            sport,
                            &market_type,
                            markets.clone(),
                            quota.map(|q| q.requests_remaining),
                        )?;
                    }
                    (markets, false, fetched, failed)
                }
            };

        let opportunities = engine::detect_opportunities(&markets, &self.detection, self.clock.now());

        tracing::info!(
            sport,
            from_cache,
            props = markets.len(),
            events_fetched,
            events_failed,
            opportunities = opportunities.len(),
            "scan complete"
        );

        Ok(ScanReport {
            opportunities,
            from_cache,
            events_fetched,
            events_failed,
            props_scanned: markets.len(),
        })
    }

    fn cached(&self, sport: &str, market_type: &str, force_refresh: bool) -> Option<Vec<PropMarket>> {
        if self.cache.should_fetch_fresh(sport, market_type, force_refresh) {
            return None;
        }
        self.cache.get(sport, market_type)
    }

    /// List events, then fetch every event's props concurrently. A failed
    /// event contributes no quotes; the rest still flow through.
    async fn fetch_markets(&self, sport: &str) -> Result<(Vec<PropMarket>, usize, usize)> {
        let events = self
            .feed
            .list_events(sport)
            .await
            .with_context(|| format!("failed to list events for {sport}"))?;

        let feed = &self.feed;
        let markets = &self.markets;
        let results = join_all(events.iter().map(|event| async move {
            (event, feed.fetch_event_props(sport, event, markets).await)
        }))
        .await;

        let mut all = Vec::new();
        let mut failed = 0;
        for (event, result) in results {
            match result {
                Ok(props) => all.extend(props),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        sport,
                        event = %event.event_id,
                        matchup = %event.matchup(),
                        error = %e,
                        "event props fetch failed"
                    );
                }
            }
        }

        Ok((all, events.len() - failed, failed))
    }
}
