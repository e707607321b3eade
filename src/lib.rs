//! # settlement-engine
//!
//! Balance aggregation and settlement optimization for shared-expense trips.
//!
//! Given the expenses a group paid for each other, this engine computes each
//! participant's net balance and the fewest payments that settle everyone up.
//!
//! ## Architecture
//!
//! - **core** — Foundational types: participants, currencies, expenses, payments, balances
//! - **aggregation** — Expenses and recorded payments into per-participant balances
//! - **fx** — Exchange rate providers, the rate cache, and currency normalization
//! - **optimization** — Greedy minimal-transaction settlement and plan summaries
//! - **recording** — Append-only history of real-world payments
//! - **simulation** — Random trip generation for benchmarks and tests
//!
//! Data flows leaf to root: expenses → aggregation → fx → optimization, with
//! recorded payments fed back into aggregation.

pub mod aggregation;
pub mod core;
pub mod fx;
pub mod optimization;
pub mod recording;
pub mod simulation;
pub mod trip;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::aggregation::compute_balances;
    pub use crate::core::config::EngineConfig;
    pub use crate::core::currency::CurrencyCode;
    pub use crate::core::expense::{Expense, Split};
    pub use crate::core::ledger::{Balances, Ledger};
    pub use crate::core::participant::Participant;
    pub use crate::core::payment::SettlementPayment;
    pub use crate::fx::{normalize, normalize_ledger, CachedRateProvider, FxRateTable, RateProvider};
    pub use crate::optimization::{
        calculate_optimized_settlements, Settlement, SettlementOptimizer, SettlementPlan,
        SettlementSummary,
    };
    pub use crate::recording::{InMemoryPaymentStore, PaymentRecorder, PaymentStore};
    pub use crate::trip::{EngineError, Trip};
}
