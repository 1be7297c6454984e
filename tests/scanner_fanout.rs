// Scanner behaviour against a scripted feed: partial failures and the cache gate.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use prop_edge::cache::{Clock, ManualClock, QuotaAwareCache};
use prop_edge::config::{CacheConfig, DetectionConfig, OddsFeedConfig};
use prop_edge::feed::types::{ApiQuota, EventRef};
use prop_edge::feed::OddsFeed;
use prop_edge::scanner::PropScanner;
use prop_edge::{PropKey, PropMarket, SportsbookQuote};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

const MARKET_TYPE: &str = "player_points";

struct ScriptedFeed {
    fail_event: &'static str,
    outage: AtomicBool,
    list_calls: AtomicUsize,
    prop_calls: AtomicUsize,
}

impl ScriptedFeed {
    fn new(fail_event: &'static str) -> Self {
        Self {
            fail_event,
            outage: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            prop_calls: AtomicUsize::new(0),
        }
    }
}

fn event(id: &str, away: &str, home: &str) -> EventRef {
    EventRef {
        event_id: id.to_string(),
        home_team: home.to_string(),
        away_team: away.to_string(),
        commence_time: "2026-03-14T23:30:00Z".to_string(),
    }
}

fn quote(book: &str, line: f64, over: i32, under: i32) -> SportsbookQuote {
    SportsbookQuote {
        sportsbook_id: book.to_string(),
        display_name: book.to_string(),
        line,
        over_odds: Some(over),
        under_odds: Some(under),
        observed_at: Utc.with_ymd_and_hms(2026, 3, 14, 18, 0, 0).unwrap(),
    }
}

#[async_trait]
impl OddsFeed for ScriptedFeed {
    async fn list_events(&self, _sport: &str) -> Result<Vec<EventRef>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![
            event("evt1", "Boston Celtics", "Miami Heat"),
            event("evt2", "Denver Nuggets", "Phoenix Suns"),
            event("evt3", "New York Knicks", "Chicago Bulls"),
        ])
    }

    async fn fetch_event_props(
        &self,
        _sport: &str,
        event: &EventRef,
        _markets: &[String],
    ) -> Result<Vec<PropMarket>> {
        self.prop_calls.fetch_add(1, Ordering::SeqCst);
        if self.outage.load(Ordering::SeqCst) || event.event_id == self.fail_event {
            anyhow::bail!("upstream 500 for {}", event.event_id);
        }
        let game = event.matchup();
        let market = match event.event_id.as_str() {
            "evt1" => PropMarket {
                key: PropKey::new("Jayson Tatum", MARKET_TYPE, &game),
                quotes: vec![quote("a", 27.5, 120, -150), quote("b", 27.5, -140, 110)],
            },
            _ => PropMarket {
                key: PropKey::new("Jalen Brunson", MARKET_TYPE, &game),
                quotes: vec![quote("a", 26.5, -110, -110), quote("b", 26.5, -110, -110)],
            },
        };
        Ok(vec![market])
    }

    fn last_quota(&self) -> Option<ApiQuota> {
        Some(ApiQuota {
            requests_used: 42,
            requests_remaining: 458,
        })
    }
}

fn scanner(fail_event: &'static str) -> (PropScanner<ScriptedFeed>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 14, 18, 0, 0).unwrap()));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let cache = QuotaAwareCache::new(&CacheConfig::default(), dyn_clock.clone());
    let scanner = PropScanner::new(
        ScriptedFeed::new(fail_event),
        cache,
        DetectionConfig::default(),
        &OddsFeedConfig {
            markets: vec![MARKET_TYPE.to_string()],
            ..OddsFeedConfig::default()
        },
        dyn_clock,
    );
    (scanner, clock)
}

#[tokio::test]
async fn test_failed_event_does_not_sink_the_scan() {
    let (mut scanner, _clock) = scanner("evt2");
    let report = scanner.scan("basketball_nba", false).await.unwrap();

    assert!(!report.from_cache);
    assert_eq!(report.events_fetched, 2);
    assert_eq!(report.events_failed, 1);
    assert_eq!(report.props_scanned, 2);
    assert_eq!(report.opportunities.len(), 1);
    assert_eq!(report.opportunities[0].key().player, "Jayson Tatum");
}

#[tokio::test]
async fn test_second_scan_served_from_cache() {
    let (mut scanner, _clock) = scanner("none");
    scanner.scan("basketball_nba", false).await.unwrap();
    let report = scanner.scan("basketball_nba", false).await.unwrap();

    assert!(report.from_cache);
    assert_eq!(report.props_scanned, 3);
    assert_eq!(scanner.feed().list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(scanner.feed().prop_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_force_refresh_bypasses_fresh_cache() {
    let (mut scanner, _clock) = scanner("none");
    scanner.scan("basketball_nba", false).await.unwrap();
    let report = scanner.scan("basketball_nba", true).await.unwrap();

    assert!(!report.from_cache);
    assert_eq!(scanner.feed().list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_expired_cache_refetches() {
    let (mut scanner, clock) = scanner("none");
    scanner.scan("basketball_nba", false).await.unwrap();

    clock.advance(Duration::seconds(299));
    assert!(scanner.scan("basketball_nba", false).await.unwrap().from_cache);

    clock.advance(Duration::seconds(2));
    let report = scanner.scan("basketball_nba", false).await.unwrap();
    assert!(!report.from_cache);
    assert_eq!(scanner.feed().list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_quota_recorded_after_fetch() {
    let (mut scanner, _clock) = scanner("none");
    scanner.scan("basketball_nba", false).await.unwrap();

    let quota = scanner.cache().quota();
    assert_eq!(quota.requests_used, 42);
    assert_eq!(quota.requests_remaining, Some(458));
    assert_eq!(
        quota.reset_at,
        Some(Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn test_cached_record_keeps_quota_snapshot() {
    let (mut scanner, _clock) = scanner("none");
    scanner.scan("basketball_nba", false).await.unwrap();

    let record = scanner.cache().record("basketball_nba", MARKET_TYPE).unwrap();
    assert_eq!(record.quota_remaining_at_fetch, Some(458));
    assert_eq!(record.data.len(), 3);
}

#[tokio::test]
async fn test_total_outage_is_not_cached() {
    let (mut scanner, clock) = scanner("none");
    scanner.feed().outage.store(true, Ordering::SeqCst);
    let down = scanner.scan("basketball_nba", false).await.unwrap();
    assert_eq!(down.events_fetched, 0);
    assert_eq!(down.events_failed, 3);
    assert_eq!(down.props_scanned, 0);
    assert!(!scanner.cache().is_fresh("basketball_nba", MARKET_TYPE));

    scanner.feed().outage.store(false, Ordering::SeqCst);
    clock.advance(Duration::seconds(60));
    let up = scanner.scan("basketball_nba", false).await.unwrap();
    assert!(!up.from_cache);
    assert_eq!(up.props_scanned, 3);
    assert_eq!(up.opportunities.len(), 1);
    assert_eq!(scanner.feed().list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_exhausted_quota_still_served_from_cache() {
    let (mut scanner, _clock) = scanner("none");
    scanner.scan("basketball_nba", false).await.unwrap();
    scanner.cache_mut().record_usage(&ApiQuota {
        requests_used: 500,
        requests_remaining: 0,
    });

    let report = scanner.scan("basketball_nba", false).await.unwrap();
    assert!(report.from_cache);
    assert_eq!(report.opportunities.len(), 1);
    assert_eq!(scanner.cache().quota().requests_remaining, Some(0));
    assert_eq!(scanner.feed().list_calls.load(Ordering::SeqCst), 1);
}
