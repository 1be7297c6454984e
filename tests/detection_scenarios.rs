// End-to-end detection passes over hand-built quote sets.

use chrono::{TimeZone, Utc};
use prop_edge::config::DetectionConfig;
use prop_edge::engine::arbitrage::find_candidates;
use prop_edge::engine::opportunity::ArbKind;
use prop_edge::{detect_opportunities, kelly_stake, Opportunity, PropKey, PropMarket, SportsbookQuote};

fn quote(book: &str, line: f64, over: Option<i32>, under: Option<i32>) -> SportsbookQuote {
    SportsbookQuote {
        sportsbook_id: book.to_string(),
        display_name: book.to_string(),
        line,
        over_odds: over,
        under_odds: under,
        observed_at: Utc.with_ymd_and_hms(2026, 3, 14, 18, 0, 0).unwrap(),
    }
}

/// EV scan effectively off so arbitrage results are not outscored.
fn arbitrage_only() -> DetectionConfig {
    DetectionConfig {
        min_ev_pct: 1000.0,
        ..DetectionConfig::default()
    }
}

fn market(player: &str, prop: &str, quotes: Vec<SportsbookQuote>) -> PropMarket {
    PropMarket {
        key: PropKey::new(player, prop, "BOS @ MIA"),
        quotes,
    }
}

#[test]
fn test_arbitrage_scenario_through_full_pass() {
    let markets = vec![market(
        "Jayson Tatum",
        "player_points",
        vec![
            quote("a", 27.5, Some(120), Some(-150)),
            quote("b", 27.5, Some(-140), Some(110)),
        ],
    )];
    let now = Utc::now();
    let ranked = detect_opportunities(&markets, &arbitrage_only(), now);

    assert_eq!(ranked.len(), 1);
    match &ranked[0] {
        Opportunity::Arbitrage(a) => {
            assert_eq!(a.kind, ArbKind::Arbitrage);
            assert!((a.guaranteed_profit_pct - 7.44).abs() < 0.01);
            assert!((a.over_stake - 48.83).abs() < 0.02);
            assert!((a.under_stake - 51.17).abs() < 0.02);
            assert!(a.over_leg.implied_prob + a.under_leg.implied_prob < 1.0);
        }
        other => panic!("expected arbitrage, got {other:?}"),
    }
}

#[test]
fn test_dedup_keeps_richer_arbitrage() {
    // a/b: 0.4854 + 0.4854 = 0.9709 -> 3%; c/d: 0.4762 + 0.4762 = 0.9524 -> 5%.
    // Cross pairs (a/d, b/c) land in between.
    let quotes = vec![
        quote("a", 27.5, Some(106), Some(-200)),
        quote("b", 27.5, Some(-200), Some(106)),
        quote("c", 27.5, Some(110), Some(-250)),
        quote("d", 27.5, Some(-250), Some(110)),
    ];
    let cfg = arbitrage_only();
    let now = Utc::now();
    let key = PropKey::new("Jayson Tatum", "player_points", "BOS @ MIA");

    let all = find_candidates(&key, &quotes, &cfg, now);
    assert!(all.len() >= 2, "expected several arbitrage pairs, got {}", all.len());

    let ranked = detect_opportunities(&[market("Jayson Tatum", "player_points", quotes)], &cfg, now);
    let arbs: Vec<_> = ranked
        .iter()
        .filter_map(|o| match o {
            Opportunity::Arbitrage(a) => Some(a),
            _ => None,
        })
        .collect();
    assert_eq!(ranked.len(), 1);
    assert_eq!(arbs.len(), 1);
    let best = all.iter().map(|c| c.guaranteed_profit_pct).fold(f64::MIN, f64::max);
    assert_eq!(arbs[0].guaranteed_profit_pct, best);
    assert_eq!(arbs[0].over_leg.sportsbook_id, "c");
    assert_eq!(arbs[0].under_leg.sportsbook_id, "d");
}

#[test]
fn test_ranked_across_players() {
    let markets = vec![
        market(
            "Bam Adebayo",
            "player_rebounds",
            vec![
                quote("a", 9.5, Some(-110), Some(-110)),
                quote("b", 9.5, Some(-112), Some(-108)),
                quote("c", 9.5, Some(135), Some(-165)),
            ],
        ),
        market(
            "Jayson Tatum",
            "player_points",
            vec![
                quote("a", 27.5, Some(120), Some(-150)),
                quote("b", 27.5, Some(-140), Some(110)),
            ],
        ),
        market(
            "Derrick White",
            "player_assists",
            vec![
                quote("a", 4.5, Some(-110), Some(-110)),
                quote("b", 4.5, Some(-110), Some(-110)),
            ],
        ),
    ];
    let ranked = detect_opportunities(&markets, &DetectionConfig::default(), Utc::now());

    assert_eq!(ranked.len(), 2);
    for pair in ranked.windows(2) {
        assert!(pair[0].score() >= pair[1].score());
    }
    assert!(ranked.iter().all(|o| o.key().player != "Derrick White"));
}

#[test]
fn test_incomplete_quotes_do_not_produce_opportunities() {
    let markets = vec![market(
        "Jayson Tatum",
        "player_points",
        vec![quote("a", 27.5, Some(200), None), quote("b", 27.5, None, Some(200))],
    )];
    assert!(detect_opportunities(&markets, &DetectionConfig::default(), Utc::now()).is_empty());
}

#[test]
fn test_kelly_calculator_scenario() {
    let stake = kelly_stake(1000.0, 0.55, -110, 0.25).unwrap();
    assert!((stake - 13.75).abs() < 1e-9);
}
