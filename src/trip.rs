//! A trip: roster, trip currency and expenses, plus the full balance pipeline.

use crate::aggregation::compute_balances;
use crate::core::config::ConfigError;
use crate::core::currency::CurrencyCode;
use crate::core::expense::{Expense, ExpenseError};
use crate::core::ledger::{Balances, Ledger, LedgerError};
use crate::core::participant::Participant;
use crate::core::payment::SettlementPayment;
use crate::fx::normalizer::normalize_ledger;
use crate::fx::rates::{FxError, RateProvider};
use crate::optimization::settlement::{SettlementError, SettlementOptimizer, SettlementPlan};
use crate::recording::recorder::{PaymentRecorder, RecordError};
use crate::recording::store::PaymentStore;
use log::debug;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

/// Any failure surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Expense(#[from] ExpenseError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Fx(#[from] FxError),
    #[error(transparent)]
    Settlement(#[from] SettlementError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0} is not a participant of this trip")]
    UnknownParticipant(Participant),
}

/// A group of participants sharing expenses, settled in one trip currency.
#[derive(Debug, Clone)]
pub struct Trip {
    name: String,
    currency: CurrencyCode,
    participants: BTreeSet<Participant>,
    expenses: Vec<Expense>,
}

impl Trip {
    pub fn new(name: impl Into<String>, currency: CurrencyCode) -> Self {
        Self {
            name: name.into(),
            currency,
            participants: BTreeSet::new(),
            expenses: Vec::new(),
        }
    }

    pub fn with_participants(mut self, participants: impl IntoIterator<Item = Participant>) -> Self {
        self.participants.extend(participants);
        self
    }

    pub fn add_participant(&mut self, participant: Participant) {
        self.participants.insert(participant);
    }

    /// Add an expense. Its payer and every split member must be on the roster.
    pub fn add_expense(&mut self, expense: Expense) -> Result<(), EngineError> {
        if let Some(stranger) = expense
            .participants()
            .into_iter()
            .find(|p| !self.participants.contains(*p))
        {
            return Err(EngineError::UnknownParticipant(stranger.clone()));
        }
        self.expenses.push(expense);
        Ok(())
    }

    /// Remove an expense by id, returning it if present.
    pub fn remove_expense(&mut self, id: Uuid) -> Option<Expense> {
        let index = self.expenses.iter().position(|e| e.id() == id)?;
        Some(self.expenses.remove(index))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    /// Raw per-currency positions after the given payments.
    pub fn ledger(&self, payments: &[SettlementPayment]) -> Result<Ledger, EngineError> {
        Ok(compute_balances(&self.expenses, payments)?)
    }

    /// Net balance of every participant in the trip currency.
    ///
    /// Participants with no activity are listed with a zero balance.
    pub fn balances<P: RateProvider + ?Sized>(
        &self,
        payments: &[SettlementPayment],
        provider: &P,
    ) -> Result<Balances, EngineError> {
        let ledger = self.ledger(payments)?;
        let mut balances = normalize_ledger(&ledger, &self.currency, provider)?;
        for participant in &self.participants {
            balances.adjust(participant, Decimal::ZERO);
        }
        Ok(balances)
    }

    /// Balances followed by the optimized plan that clears them.
    pub fn settlement_plan<P: RateProvider + ?Sized>(
        &self,
        payments: &[SettlementPayment],
        provider: &P,
        optimizer: &SettlementOptimizer,
    ) -> Result<SettlementPlan, EngineError> {
        let balances = self.balances(payments, provider)?;
        let plan = optimizer.calculate_optimized_settlements(&balances)?;
        debug!("trip '{}': {} settlements", self.name, plan.len());
        Ok(plan)
    }

    /// A recorder for this trip's roster and currency over `store`.
    pub fn recorder<S: PaymentStore>(&self, store: S) -> PaymentRecorder<S> {
        PaymentRecorder::new(self.participants.iter().cloned(), self.currency.clone(), store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fx::rates::FxRateTable;
    use crate::recording::store::InMemoryPaymentStore;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn p(name: &str) -> Participant {
        Participant::new(name)
    }

    fn trip() -> Trip {
        Trip::new("Lisbon", CurrencyCode::new("EUR"))
            .with_participants([p("Ana"), p("Ben"), p("Cleo")])
    }

    #[test]
    fn test_unknown_participant_in_expense() {
        let mut trip = trip();
        let ex = Expense::split_equally(
            p("Ana"),
            dec!(10),
            CurrencyCode::new("EUR"),
            &[p("Ana"), p("Dov")],
        )
        .unwrap();
        assert!(matches!(
            trip.add_expense(ex),
            Err(EngineError::UnknownParticipant(ref who)) if who == &p("Dov")
        ));
        assert!(trip.expenses().is_empty());
    }

    #[test]
    fn test_idle_participant_listed_as_zero() {
        let mut trip = trip();
        let ex = Expense::split_equally(
            p("Ana"),
            dec!(10),
            CurrencyCode::new("EUR"),
            &[p("Ana"), p("Ben")],
        )
        .unwrap();
        trip.add_expense(ex).unwrap();

        let balances = trip.balances(&[], &FxRateTable::new()).unwrap();
        assert_eq!(balances.len(), 3);
        assert_eq!(balances.get(&p("Cleo")), Decimal::ZERO);
    }

    #[test]
    fn test_pipeline_with_payment() {
        let mut trip = trip();
        let roster = [p("Ana"), p("Ben"), p("Cleo")];
        trip.add_expense(
            Expense::split_equally(p("Ana"), dec!(90), CurrencyCode::new("EUR"), &roster).unwrap(),
        )
        .unwrap();

        let rates = FxRateTable::new();
        let optimizer = SettlementOptimizer::default();
        let plan = trip.settlement_plan(&[], &rates, &optimizer).unwrap();
        assert_eq!(plan.len(), 2);

        let mut recorder = trip.recorder(InMemoryPaymentStore::new());
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        recorder.record_settlement(&plan.settlements()[0], date).unwrap();

        let payments = recorder.payments().unwrap();
        let plan = trip.settlement_plan(&payments, &rates, &optimizer).unwrap();
        assert_eq!(plan.len(), 1);

        let removed = trip.remove_expense(trip.expenses()[0].id());
        assert!(removed.is_some());
    }
}
