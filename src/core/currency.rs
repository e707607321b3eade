use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of fractional digits money amounts are presented and converted at.
pub const MONEY_DP: u32 = 2;

/// ISO 4217-style currency code.
///
/// # Examples
///
/// ```
/// use settlement_engine::core::currency::CurrencyCode;
///
/// let eur = CurrencyCode::new("EUR");
/// let usd = CurrencyCode::new("USD");
/// assert_ne!(eur, usd);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A pair of currencies representing an exchange rate direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CurrencyPair {
    pub base: CurrencyCode,
    pub quote: CurrencyCode,
}

impl CurrencyPair {
    pub fn new(base: CurrencyCode, quote: CurrencyCode) -> Self {
        Self { base, quote }
    }

    pub fn inverse(&self) -> Self {
        Self {
            base: self.quote.clone(),
            quote: self.base.clone(),
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// A fetched exchange rate: 1 unit of `base` = `rate` units of `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub base: CurrencyCode,
    pub target: CurrencyCode,
    pub rate: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn new(base: CurrencyCode, target: CurrencyCode, rate: Decimal, fetched_at: DateTime<Utc>) -> Self {
        Self {
            base,
            target,
            rate,
            fetched_at,
        }
    }

    /// Age of the entry at `now`. Entries stamped in the future count as fresh.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).max(Duration::zero())
    }

    /// An entry is stale once its age reaches the TTL.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) >= ttl
    }
}

/// Round a money amount to cents, half-up (midpoint away from zero).
pub fn round_money(amount: Decimal) -> Decimal {
    round_money_dp(amount, MONEY_DP)
}

/// Round half-up to `dp` decimal places, for display at a configured precision.
pub fn round_money_dp(amount: Decimal, dp: u32) -> Decimal {
    amount.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}
