use super::types::*;
use super::OddsFeed;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub struct TheOddsApi {
    client: Client,
    api_key: String,
    base_url: String,
    regions: String,
    bookmakers: Option<String>,
    last_quota: Mutex<Option<ApiQuota>>,
}

/// Map short league names to the-odds-api.com sport keys.
fn api_sport_key(sport: &str) -> &str {
    match sport {
        "nba" => "basketball_nba",
        "wnba" => "basketball_wnba",
        "ncaab" => "basketball_ncaab",
        "nfl" => "americanfootball_nfl",
        "ncaaf" => "americanfootball_ncaaf",
        "mlb" => "baseball_mlb",
        "nhl" => "icehockey_nhl",
        _ => sport,
    }
}

/// Parse a quota header that may be an integer or float (e.g. "14527.0").
fn parse_quota_header(headers: &reqwest::header::HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok())
        .map(|v| v as u64)
}

/// Concurrent responses land in any order; the most-spent view wins.
fn merge_quota(prev: Option<ApiQuota>, next: ApiQuota) -> ApiQuota {
    match prev {
        Some(prev) => ApiQuota {
            requests_used: prev.requests_used.max(next.requests_used),
            requests_remaining: prev.requests_remaining.min(next.requests_remaining),
        },
        None => next,
    }
}

impl TheOddsApi {
    pub fn new(
        api_key: String,
        base_url: &str,
        regions: &str,
        bookmakers: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            regions: regions.to_string(),
            bookmakers: bookmakers.map(str::to_string),
            last_quota: Mutex::new(None),
        })
    }

    /// Store quota from response headers. `fresh` starts a new batch;
    /// otherwise the report is merged with what the batch has seen so far.
    fn record_quota(&self, headers: &reqwest::header::HeaderMap, fresh: bool) {
        let used = parse_quota_header(headers, "x-requests-used");
        let remaining = parse_quota_header(headers, "x-requests-remaining");
        if let (Some(used), Some(remaining)) = (used, remaining) {
            let report = ApiQuota {
                requests_used: used,
                requests_remaining: remaining,
            };
            let mut last = self.last_quota.lock().unwrap_or_else(|e| e.into_inner());
            *last = Some(if fresh { report } else { merge_quota(last.take(), report) });
        }
    }

    /// Call the free `/v4/sports` endpoint to check quota without consuming usage credits.
    /// Returns an error only if the key is rejected; an exhausted quota is
    /// reported, not refused, so cached odds can still be served.
    pub async fn check_quota(&self) -> Result<ApiQuota> {
        let url = format!("{}/v4/sports?apiKey={}", self.base_url, self.api_key);

        let resp = self.client.get(&url).send().await
            .context("failed to reach the-odds-api for quota check")?;

        let status = resp.status();
        self.record_quota(resp.headers(), true);

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("the-odds-api key validation failed ({}): {}", status, body);
        }

        let quota = self.last_quota().unwrap_or_default();
        if quota.is_exhausted() {
            tracing::warn!(
                used = quota.requests_used,
                "odds API quota exhausted; only cached odds can be served"
            );
        }

        Ok(quota)
    }
}

#[async_trait]
impl OddsFeed for TheOddsApi {
    async fn list_events(&self, sport: &str) -> Result<Vec<EventRef>> {
        let api_sport = api_sport_key(sport);
        let url = format!(
            "{}/v4/sports/{}/events?apiKey={}",
            self.base_url, api_sport, self.api_key,
        );

        let resp = self.client.get(&url).send().await
            .context("the-odds-api events request failed")?;
        self.record_quota(resp.headers(), true);

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("the-odds-api events {} ({}): {}", api_sport, status, body);
        }

        let events: Vec<TheOddsApiEvent> = resp.json().await
            .context("failed to parse the-odds-api events response")?;

        Ok(events
            .into_iter()
            .map(|e| EventRef {
                event_id: e.id,
                home_team: e.home_team,
                away_team: e.away_team,
                commence_time: e.commence_time,
            })
            .collect())
    }

    async fn fetch_event_props(
        &self,
        sport: &str,
        event: &EventRef,
        markets: &[String],
    ) -> Result<Vec<PropMarket>> {
        let api_sport = api_sport_key(sport);
        let mut url = format!(
            "{}/v4/sports/{}/events/{}/odds?apiKey={}&regions={}&markets={}&oddsFormat=american",
            self.base_url,
            api_sport,
            event.event_id,
            self.api_key,
            self.regions,
            markets.join(","),
        );
        if let Some(ref books) = self.bookmakers {
            url.push_str("&bookmakers=");
            url.push_str(books);
        }

        let resp = self.client.get(&url).send().await
            .with_context(|| format!("the-odds-api odds request failed for event {}", event.event_id))?;
        self.record_quota(resp.headers(), false);

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("the-odds-api event {} ({}): {}", event.event_id, status, body);
        }

        let odds: TheOddsApiEventOdds = resp.json().await
            .context("failed to parse the-odds-api event odds response")?;

        Ok(props_from_event_odds(&odds, event, Utc::now()))
    }

    fn last_quota(&self) -> Option<ApiQuota> {
        self.last_quota.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Group Over/Under outcomes into one quote per (market, player, book, line).
/// A side the book does not offer stays `None`.
pub fn props_from_event_odds(
    odds: &TheOddsApiEventOdds,
    event: &EventRef,
    fetched_at: DateTime<Utc>,
) -> Vec<PropMarket> {
    let game = event.matchup();
    let mut markets: Vec<PropMarket> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for bm in &odds.bookmakers {
        for market in &bm.markets {
            let observed_at = market.last_update.unwrap_or(fetched_at);
            let mut quotes: Vec<(String, SportsbookQuote)> = Vec::new();

            for outcome in &market.outcomes {
                let (Some(player), Some(line)) = (outcome.description.as_deref(), outcome.point) else {
                    continue;
                };
                let price = outcome.price.round() as i32;

                let pos = quotes
                    .iter()
                    .position(|(p, q)| p == player && q.line == line);
                let i = match pos {
                    Some(i) => i,
                    None => {
                        quotes.push((
                            player.to_string(),
                            SportsbookQuote {
                                sportsbook_id: bm.key.clone(),
                                display_name: bm.title.clone(),
                                line,
                                over_odds: None,
                                under_odds: None,
                                observed_at,
                            },
                        ));
                        quotes.len() - 1
                    }
                };
                let quote = &mut quotes[i].1;

                if outcome.name.eq_ignore_ascii_case("over") {
                    quote.over_odds = Some(price);
                } else if outcome.name.eq_ignore_ascii_case("under") {
                    quote.under_odds = Some(price);
                }
            }

            for (player, quote) in quotes {
                let slot = (market.key.clone(), player.clone());
                let i = *index.entry(slot).or_insert_with(|| {
                    markets.push(PropMarket {
                        key: PropKey::new(&player, &market.key, &game),
                        quotes: Vec::new(),
                    });
                    markets.len() - 1
                });
                markets[i].quotes.push(quote);
            }
        }
    }

    markets
}
