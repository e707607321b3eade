//! Currency normalization: rate providers, the rate cache, and conversion.

pub mod cache;
pub mod normalizer;
pub mod rates;

pub use cache::CachedRateProvider;
pub use normalizer::{normalize, normalize_ledger};
pub use rates::{FxError, FxRateTable, RateProvider, RateSource};
