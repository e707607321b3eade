use crate::core::config::EngineConfig;
use crate::core::currency::{CurrencyCode, CurrencyPair, ExchangeRate};
use crate::fx::rates::{FxError, RateProvider, RateSource};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::{debug, warn};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, PoisonError};

/// Rate provider that caches a [`RateSource`] with a staleness policy.
///
/// Lookup order for a pair:
///
/// 1. A cached rate younger than the TTL is returned as is.
/// 2. Otherwise the source is asked for a live rate. On success the cache
///    entry is replaced and stamped with the fetch time.
/// 3. If the fetch fails, the last cached rate is returned no matter how old.
/// 4. With nothing cached, the lookup fails with [`FxError::RateUnavailable`].
///
/// Refreshes are serialized per currency pair: concurrent lookups of the
/// same stale pair trigger one fetch, and the others read its result.
/// Different pairs refresh independently.
pub struct CachedRateProvider<S> {
    source: S,
    ttl: Duration,
    fetch_timeout: std::time::Duration,
    entries: DashMap<CurrencyPair, ExchangeRate>,
    refresh_locks: DashMap<CurrencyPair, Arc<Mutex<()>>>,
}

impl<S: RateSource> CachedRateProvider<S> {
    pub fn new(source: S, ttl: Duration, fetch_timeout: std::time::Duration) -> Self {
        Self {
            source,
            ttl,
            fetch_timeout,
            entries: DashMap::new(),
            refresh_locks: DashMap::new(),
        }
    }

    pub fn from_config(source: S, config: &EngineConfig) -> Self {
        Self::new(source, config.rate_ttl(), config.fetch_timeout())
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Look up a rate as of `now`. [`RateProvider::get_rate`] calls this with the wall clock.
    pub fn get_rate_at(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
        now: DateTime<Utc>,
    ) -> Result<Decimal, FxError> {
        let pair = CurrencyPair::new(from.clone(), to.clone());
        if let Some(rate) = self.fresh_rate(&pair, now) {
            return Ok(rate);
        }

        let lock = self.refresh_lock(&pair);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have refreshed the pair while we waited.
        if let Some(rate) = self.fresh_rate(&pair, now) {
            return Ok(rate);
        }

        let fetched = self
            .source
            .fetch(from, to, self.fetch_timeout)
            .and_then(|rate| {
                if rate > Decimal::ZERO {
                    Ok(rate)
                } else {
                    Err(FxError::InvalidRate {
                        from: from.clone(),
                        to: to.clone(),
                        rate,
                    })
                }
            });

        match fetched {
            Ok(rate) => {
                debug!("refreshed {} at {}", pair, rate);
                self.store(ExchangeRate::new(from.clone(), to.clone(), rate, now));
                Ok(rate)
            }
            Err(err) => match self.cached_rate(&pair) {
                Some(entry) => {
                    warn!(
                        "fetching {} failed ({}), using cached rate from {}",
                        pair, err, entry.fetched_at
                    );
                    Ok(entry.rate)
                }
                None => {
                    warn!("fetching {} failed ({}) and nothing is cached", pair, err);
                    Err(FxError::RateUnavailable {
                        from: from.clone(),
                        to: to.clone(),
                    })
                }
            },
        }
    }

    /// The cached entry for a pair, fresh or stale.
    pub fn cached_rate(&self, pair: &CurrencyPair) -> Option<ExchangeRate> {
        self.entries.get(pair).map(|entry| entry.value().clone())
    }

    /// Seed the cache, e.g. from rates persisted by a previous session.
    pub fn seed(&self, entry: ExchangeRate) -> Result<(), FxError> {
        if entry.rate <= Decimal::ZERO {
            return Err(FxError::InvalidRate {
                from: entry.base,
                to: entry.target,
                rate: entry.rate,
            });
        }
        self.store(entry);
        Ok(())
    }

    /// Snapshot of every cached entry, for persisting.
    pub fn entries(&self) -> Vec<ExchangeRate> {
        let mut entries: Vec<ExchangeRate> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by(|a, b| (&a.base, &a.target).cmp(&(&b.base, &b.target)));
        entries
    }

    /// Drop every cached rate.
    pub fn clear(&self) {
        self.entries.clear();
        debug!("rate cache cleared");
    }

    fn fresh_rate(&self, pair: &CurrencyPair, now: DateTime<Utc>) -> Option<Decimal> {
        self.cached_rate(pair)
            .filter(|entry| !entry.is_stale(now, self.ttl))
            .map(|entry| entry.rate)
    }

    fn store(&self, entry: ExchangeRate) {
        let pair = CurrencyPair::new(entry.base.clone(), entry.target.clone());
        self.entries.insert(pair, entry);
    }

    fn refresh_lock(&self, pair: &CurrencyPair) -> Arc<Mutex<()>> {
        Arc::clone(&self.refresh_locks.entry(pair.clone()).or_default())
    }
}

impl<S: RateSource> RateProvider for CachedRateProvider<S> {
    fn get_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<Decimal, FxError> {
        self.get_rate_at(from, to, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Source returning a fixed rate that can be switched to failing.
    struct ScriptedSource {
        rate: Decimal,
        failing: AtomicBool,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(rate: Decimal) -> Self {
            Self {
                rate,
                failing: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RateSource for ScriptedSource {
        fn fetch(
            &self,
            base: &CurrencyCode,
            target: &CurrencyCode,
            _timeout: std::time::Duration,
        ) -> Result<Decimal, FxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            if self.failing.load(Ordering::SeqCst) {
                Err(FxError::FetchFailed {
                    pair: CurrencyPair::new(base.clone(), target.clone()),
                    reason: "timed out".into(),
                })
            } else {
                Ok(self.rate)
            }
        }
    }

    fn provider(rate: Decimal) -> CachedRateProvider<ScriptedSource> {
        CachedRateProvider::new(
            ScriptedSource::new(rate),
            Duration::hours(24),
            std::time::Duration::from_secs(1),
        )
    }

    fn usd() -> CurrencyCode {
        CurrencyCode::new("USD")
    }

    fn eur() -> CurrencyCode {
        CurrencyCode::new("EUR")
    }

    #[test]
    fn test_fresh_cache_skips_fetch() {
        let cache = provider(dec!(0.9));
        let t0 = Utc::now();

        assert_eq!(cache.get_rate_at(&usd(), &eur(), t0).unwrap(), dec!(0.9));
        assert_eq!(
            cache
                .get_rate_at(&usd(), &eur(), t0 + Duration::hours(23))
                .unwrap(),
            dec!(0.9)
        );
        assert_eq!(cache.source().calls(), 1);
    }

    #[test]
    fn test_stale_entry_is_refreshed() {
        let cache = provider(dec!(0.9));
        let t0 = Utc::now();
        cache
            .seed(ExchangeRate::new(usd(), eur(), dec!(0.85), t0 - Duration::hours(30)))
            .unwrap();

        assert_eq!(cache.get_rate_at(&usd(), &eur(), t0).unwrap(), dec!(0.9));
        assert_eq!(cache.source().calls(), 1);
        let entry = cache.cached_rate(&CurrencyPair::new(usd(), eur())).unwrap();
        assert_eq!(entry.fetched_at, t0);
        assert_eq!(entry.rate, dec!(0.9));
    }

    #[test]
    fn test_failed_fetch_falls_back_to_stale() {
        let cache = provider(dec!(0.9));
        let t0 = Utc::now();
        cache
            .seed(ExchangeRate::new(usd(), eur(), dec!(0.85), t0 - Duration::days(10)))
            .unwrap();
        cache.source().failing.store(true, Ordering::SeqCst);

        assert_eq!(cache.get_rate_at(&usd(), &eur(), t0).unwrap(), dec!(0.85));
    }

    #[test]
    fn test_failed_fetch_without_cache_is_unavailable() {
        let cache = provider(dec!(0.9));
        cache.source().failing.store(true, Ordering::SeqCst);

        assert_eq!(
            cache.get_rate(&usd(), &eur()).unwrap_err(),
            FxError::RateUnavailable {
                from: usd(),
                to: eur()
            }
        );
    }

    #[test]
    fn test_non_positive_fetched_rate_is_rejected() {
        let cache = provider(Decimal::ZERO);
        assert!(matches!(
            cache.get_rate(&usd(), &eur()),
            Err(FxError::RateUnavailable { .. })
        ));
        assert!(cache.entries().is_empty());
    }

    #[test]
    fn test_clear_empties_cache() {
        let cache = provider(dec!(0.9));
        cache.get_rate(&usd(), &eur()).unwrap();
        assert_eq!(cache.entries().len(), 1);

        cache.clear();
        assert!(cache.entries().is_empty());
        cache.source().failing.store(true, Ordering::SeqCst);
        assert!(cache.get_rate(&usd(), &eur()).is_err());
    }

    #[test]
    fn test_concurrent_refresh_fetches_once() {
        let cache = provider(dec!(0.9));
        let now = Utc::now();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    assert_eq!(cache.get_rate_at(&usd(), &eur(), now).unwrap(), dec!(0.9));
                });
            }
        });

        assert_eq!(cache.source().calls(), 1);
    }

    #[test]
    fn test_distinct_pairs_refresh_independently() {
        let cache = provider(dec!(0.9));
        let gbp = CurrencyCode::new("GBP");
        let now = Utc::now();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let target = if i % 2 == 0 { eur() } else { gbp.clone() };
                let cache = &cache;
                scope.spawn(move || {
                    assert_eq!(cache.get_rate_at(&usd(), &target, now).unwrap(), dec!(0.9));
                });
            }
        });

        assert_eq!(cache.source().calls(), 2);
        assert_eq!(cache.refresh_locks.len(), 2);
        assert_eq!(cache.entries().len(), 2);
    }

    #[test]
    fn test_seed_rejects_invalid_rate() {
        let cache = provider(dec!(0.9));
        let result = cache.seed(ExchangeRate::new(usd(), eur(), dec!(-1), Utc::now()));
        assert!(matches!(result, Err(FxError::InvalidRate { .. })));
    }
}
