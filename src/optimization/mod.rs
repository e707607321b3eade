//! Settlement optimization: turning balances into the fewest payments.

pub mod settlement;
pub mod summary;

pub use settlement::{
    calculate_optimized_settlements, Settlement, SettlementError, SettlementOptimizer,
    SettlementPlan,
};
pub use summary::SettlementSummary;
