//! Foundational types: participants, currencies, expenses, payments, balances.

pub mod config;
pub mod currency;
pub mod expense;
pub mod ledger;
pub mod participant;
pub mod payment;
