//! Reduction of expenses and recorded payments into net balances.

pub mod aggregator;

pub use aggregator::{compute_balances, compute_balances_in};
