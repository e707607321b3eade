use crate::core::currency::{CurrencyCode, CurrencyPair};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors arising from exchange rate lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FxError {
    /// No live rate could be fetched and nothing is cached for the pair.
    #[error("no exchange rate available for {from} -> {to}")]
    RateUnavailable {
        from: CurrencyCode,
        to: CurrencyCode,
    },
    #[error("exchange rate must be positive, got {rate} for {from} -> {to}")]
    InvalidRate {
        from: CurrencyCode,
        to: CurrencyCode,
        rate: Decimal,
    },
    #[error("fetching {pair} failed: {reason}")]
    FetchFailed { pair: CurrencyPair, reason: String },
    /// The converted amount does not fit in a decimal.
    #[error("converting {from} -> {to} overflowed")]
    Overflow {
        from: CurrencyCode,
        to: CurrencyCode,
    },
}

/// Something that can answer "how many `to` is one `from` worth".
///
/// The normalizer only ever talks to this trait. Implementations decide
/// whether rates are static, cached, or fetched live.
pub trait RateProvider {
    fn get_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<Decimal, FxError>;
}

impl<P: RateProvider + ?Sized> RateProvider for &P {
    fn get_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<Decimal, FxError> {
        (**self).get_rate(from, to)
    }
}

/// A live origin of exchange rates, typically a network API.
///
/// `fetch` may block. It must give up and return an error once `timeout`
/// has elapsed; the caching provider treats any error as a failed fetch and
/// falls back to its cache.
pub trait RateSource {
    fn fetch(
        &self,
        base: &CurrencyCode,
        target: &CurrencyCode,
        timeout: Duration,
    ) -> Result<Decimal, FxError>;
}

/// Fixed table of exchange rates.
///
/// Stores direct rates and their inverses. Useful as a provider for trips
/// with agreed rates, and as a [`RateSource`] in tests and the CLI.
///
/// # Examples
///
/// ```
/// use settlement_engine::core::currency::CurrencyCode;
/// use settlement_engine::fx::rates::{FxRateTable, RateProvider};
/// use rust_decimal_macros::dec;
///
/// let mut rates = FxRateTable::new();
/// rates.set_rate(CurrencyCode::new("CHF"), CurrencyCode::new("EUR"), dec!(1.25)).unwrap();
///
/// let rate = rates.get_rate(&CurrencyCode::new("EUR"), &CurrencyCode::new("CHF")).unwrap();
/// assert_eq!(rate, dec!(0.8));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FxRateTable {
    /// Direct rates: (from, to) -> rate.
    rates: HashMap<(CurrencyCode, CurrencyCode), Decimal>,
}

impl FxRateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a direct exchange rate: 1 unit of `from` = `rate` units of `to`.
    ///
    /// The inverse direction is stored as well.
    pub fn set_rate(
        &mut self,
        from: CurrencyCode,
        to: CurrencyCode,
        rate: Decimal,
    ) -> Result<(), FxError> {
        if rate <= Decimal::ZERO {
            return Err(FxError::InvalidRate { from, to, rate });
        }
        self.rates.insert((from.clone(), to.clone()), rate);
        self.rates.insert((to, from), Decimal::ONE / rate);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    fn lookup(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<Decimal, FxError> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        self.rates
            .get(&(from.clone(), to.clone()))
            .copied()
            .ok_or_else(|| FxError::RateUnavailable {
                from: from.clone(),
                to: to.clone(),
            })
    }
}

impl RateProvider for FxRateTable {
    fn get_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<Decimal, FxError> {
        self.lookup(from, to)
    }
}

impl RateSource for FxRateTable {
    fn fetch(
        &self,
        base: &CurrencyCode,
        target: &CurrencyCode,
        _timeout: Duration,
    ) -> Result<Decimal, FxError> {
        self.lookup(base, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn chf() -> CurrencyCode {
        CurrencyCode::new("CHF")
    }

    fn eur() -> CurrencyCode {
        CurrencyCode::new("EUR")
    }

    #[test]
    fn test_rate_table_direct_and_inverse() {
        let mut table = FxRateTable::new();
        table.set_rate(eur(), chf(), dec!(0.80)).unwrap();

        assert_eq!(table.get_rate(&eur(), &chf()).unwrap(), dec!(0.80));
        assert_eq!(table.get_rate(&chf(), &eur()).unwrap(), dec!(1.25));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_same_currency_rate() {
        let table = FxRateTable::new();
        assert_eq!(table.get_rate(&eur(), &eur()).unwrap(), Decimal::ONE);
    }

    #[test]
    fn test_missing_rate() {
        let table = FxRateTable::new();
        assert_eq!(
            table.get_rate(&eur(), &chf()).unwrap_err(),
            FxError::RateUnavailable {
                from: eur(),
                to: chf()
            }
        );
    }

    #[test]
    fn test_invalid_rate() {
        let mut table = FxRateTable::new();
        let result = table.set_rate(chf(), eur(), dec!(-0.5));
        assert!(matches!(result, Err(FxError::InvalidRate { .. })));
        assert!(table.is_empty());
    }
}
