use anyhow::{Context, Result};
use prop_edge::cache::{Clock, JsonFileStore, QuotaAwareCache, SystemClock};
use prop_edge::config::Config;
use prop_edge::engine::kelly::StakeSizer;
use prop_edge::engine::opportunity::ArbKind;
use prop_edge::feed::the_odds_api::TheOddsApi;
use prop_edge::feed::types::PropMarket;
use prop_edge::scanner::PropScanner;
use prop_edge::Opportunity;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Value following `flag` on the command line, if any.
fn arg_value(flag: &str) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1).cloned())
}

/// `--bankroll` must be a finite, positive amount when given.
fn parse_bankroll(raw: Option<&str>) -> Result<Option<f64>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let bankroll: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid --bankroll value: {raw:?}"))?;
    if !bankroll.is_finite() || bankroll <= 0.0 {
        anyhow::bail!("--bankroll must be a positive amount, got {raw:?}");
    }
    Ok(Some(bankroll))
}

fn print_opportunity(rank: usize, opp: &Opportunity, sizer: &StakeSizer, bankroll: Option<f64>) {
    let key = opp.key();
    match opp {
        Opportunity::Arbitrage(a) => {
            let label = match a.kind {
                ArbKind::Arbitrage => "ARB",
                ArbKind::Middle => "MIDDLE",
            };
            println!(
                "  {:>2}. {:<6} {} {} ({}) {:+.2}% [{:?}]",
                rank, label, key.player, key.prop_type, key.game,
                a.guaranteed_profit_pct, a.confidence,
            );
            println!(
                "      O{} {:+} @ {} -> ${:.2}   U{} {:+} @ {} -> ${:.2}",
                a.over_leg.line, a.over_leg.odds, a.over_leg.display_name, a.over_stake,
                a.under_leg.line, a.under_leg.odds, a.under_leg.display_name, a.under_stake,
            );
        }
        Opportunity::Ev(e) => {
            println!(
                "  {:>2}. {:<6} {} {} ({}) {:+.2}% {}★ [{:?}] true over {:.1}%",
                rank, "EV", key.player, key.prop_type, key.game,
                e.max_ev_pct(), e.rating, e.confidence,
                e.estimated_true_probability_over * 100.0,
            );
            let (side, best, true_prob) = if e.best_over.ev_pct >= e.best_under.ev_pct {
                ("O", &e.best_over, e.estimated_true_probability_over)
            } else {
                ("U", &e.best_under, 1.0 - e.estimated_true_probability_over)
            };
            print!(
                "      {}{} {:+} @ {}",
                side, best.line, best.odds, best.display_name,
            );
            match bankroll.map(|b| sizer.recommend(b, true_prob, best.odds)) {
                Some(Ok(rec)) => println!("   stake ${:.2}", rec.stake),
                Some(Err(err)) => println!("   ({err})"),
                None => println!(),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("prop_edge=info")),
        )
        .init();

    let config_path = arg_value("--config").unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(Path::new(&config_path))?;

    // Load saved keys from .env (real env vars take precedence)
    Config::load_env_file();
    let api_key = Config::odds_api_key()?;

    let force_refresh = std::env::args().any(|arg| arg == "--refresh");
    let sport = arg_value("--sport").unwrap_or_else(|| config.odds_feed.sport.clone());
    let bankroll = parse_bankroll(arg_value("--bankroll").as_deref())?;

    let feed = TheOddsApi::new(
        api_key,
        &config.odds_feed.base_url,
        &config.odds_feed.regions,
        config.odds_feed.bookmakers.as_deref(),
        Duration::from_millis(config.odds_feed.request_timeout_ms),
    )?;

    let quota = match feed.check_quota().await {
        Ok(quota) => {
            tracing::info!(
                used = quota.requests_used,
                remaining = quota.requests_remaining,
                "odds API key OK"
            );
            quota
        }
        Err(e) => {
            tracing::error!("odds API check failed: {:#}", e);
            return Err(e);
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache: QuotaAwareCache<Vec<PropMarket>> = match config.cache.store_dir {
        Some(ref dir) => QuotaAwareCache::with_store(
            Box::new(JsonFileStore::<Vec<PropMarket>>::new(dir)?),
            &config.cache,
            clock.clone(),
        ),
        None => QuotaAwareCache::new(&config.cache, clock.clone()),
    };

    let mut scanner = PropScanner::new(
        feed,
        cache,
        config.detection.clone(),
        &config.odds_feed,
        clock,
    );
    scanner.cache_mut().record_usage(&quota);

    let report = scanner.scan(&sport, force_refresh).await?;
    let sizer = StakeSizer::new(config.sizing.clone());

    println!();
    println!(
        "  {} props scanned ({}), {} opportunities",
        report.props_scanned,
        if report.from_cache { "cached" } else { "fresh" },
        report.opportunities.len(),
    );
    if report.events_failed > 0 {
        println!("  {} event(s) failed to load; see log", report.events_failed);
    }
    for (i, opp) in report.opportunities.iter().enumerate() {
        print_opportunity(i + 1, opp, &sizer, bankroll);
    }
    if let Some(remaining) = scanner.cache().quota().requests_remaining {
        println!("  API requests remaining: {}", remaining);
    }

    Ok(())
}
