pub mod cache;
pub mod config;
pub mod engine;
pub mod feed;
pub mod scanner;

pub use engine::kelly::kelly_stake;
pub use engine::{detect_opportunities, Confidence, OddsError, Opportunity};
pub use feed::types::{PropKey, PropMarket, SportsbookQuote};
