//! Rug-pull classification for tracked tokens.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

use crate::db::models::{DogPatch, NewDogRecord, TokenStatus};

pub const DEFAULT_TOKEN_NAME: &str = "Unknown Token";
pub const DEFAULT_NARRATIVE: &str = "Token info fetched automatically";

const NEAR_ZERO_MARKET_CAP: f64 = 10_000.0;
const NEAR_ZERO_DROP_PCT: f64 = -90.0;
const SHARP_DECLINE_DROP_PCT: f64 = -50.0;

/// Market data for one contract address.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenQuote {
    pub name: Option<String>,
    pub market_cap: f64,
    pub price_change_24h: f64,
}

/// Source of market data for contract addresses.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn quote(&self, ca: &str) -> anyhow::Result<TokenQuote>;
}

/// Stand-in feed producing random quotes until a real price source is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPriceFeed;

#[async_trait]
impl PriceFeed for RandomPriceFeed {
    async fn quote(&self, _ca: &str) -> anyhow::Result<TokenQuote> {
        let mut rng = rand::thread_rng();
        Ok(TokenQuote {
            name: None,
            market_cap: rng.gen_range(0.0..1_000_000.0),
            price_change_24h: rng.gen_range(-50.0..50.0),
        })
    }
}

/// First matching rule wins.
pub fn classify(market_cap: f64, price_change_24h: f64) -> (TokenStatus, &'static str) {
    if market_cap == 0.0 {
        (TokenStatus::Zeroed, "Token price has gone to zero")
    } else if market_cap < NEAR_ZERO_MARKET_CAP || price_change_24h < NEAR_ZERO_DROP_PCT {
        (TokenStatus::NearZero, "Market cap is extremely low, close to zero")
    } else if price_change_24h < SHARP_DECLINE_DROP_PCT {
        (TokenStatus::SharpDecline, "Price dropped sharply")
    } else {
        (TokenStatus::Normal, "Token looks normal")
    }
}

/// Builds a new tracked token from its first quote.
pub fn new_dog_record(
    ca: String,
    user_id: i64,
    username: String,
    quote: TokenQuote,
) -> NewDogRecord {
    let now = Utc::now();
    let (status, reason) = classify(quote.market_cap, quote.price_change_24h);
    NewDogRecord {
        user_id,
        username,
        name: quote.name.unwrap_or_else(|| DEFAULT_TOKEN_NAME.to_string()),
        ca,
        narrative: DEFAULT_NARRATIVE.to_string(),
        time: now,
        current_market_cap: quote.market_cap,
        status,
        reason: reason.to_string(),
        last_updated: now,
    }
}

/// Patch applied when a tracked token is refreshed.
pub fn refresh_patch(quote: TokenQuote) -> DogPatch {
    let (status, reason) = classify(quote.market_cap, quote.price_change_24h);
    DogPatch {
        name: quote.name,
        current_market_cap: Some(quote.market_cap),
        status: Some(status),
        reason: Some(reason.to_string()),
        last_updated: Some(Utc::now()),
        ..Default::default()
    }
}
