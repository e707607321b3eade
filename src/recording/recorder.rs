use crate::core::currency::CurrencyCode;
use crate::core::participant::Participant;
use crate::core::payment::SettlementPayment;
use crate::optimization::settlement::Settlement;
use crate::recording::store::{PaymentStore, StoreError};
use chrono::{NaiveDate, Utc};
use log::info;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

/// Reasons a payment cannot be recorded or removed.
///
/// Validation errors are raised before the store is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("payment amount must be positive, got {0}")]
    InvalidAmount(Decimal),
    #[error("{0} cannot pay themselves")]
    SelfPayment(Participant),
    #[error("{0} is not a participant of this trip")]
    UnknownParticipant(Participant),
    #[error("no recorded payment with id {0}")]
    PaymentNotFound(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Records real-world payments between trip participants.
///
/// The recorder is the only writer of payment history. Records are created
/// or deleted, never edited. It keeps no balances of its own: after every
/// write, recompute balances from expenses plus [`PaymentRecorder::payments`]
/// and rerun the optimizer.
pub struct PaymentRecorder<S> {
    participants: BTreeSet<Participant>,
    currency: CurrencyCode,
    store: S,
}

impl<S: PaymentStore> PaymentRecorder<S> {
    pub fn new(
        participants: impl IntoIterator<Item = Participant>,
        currency: CurrencyCode,
        store: S,
    ) -> Self {
        Self {
            participants: participants.into_iter().collect(),
            currency,
            store,
        }
    }

    pub fn add_participant(&mut self, participant: Participant) {
        self.participants.insert(participant);
    }

    pub fn is_participant(&self, participant: &Participant) -> bool {
        self.participants.contains(participant)
    }

    /// Currency every recorded payment is denominated in.
    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    /// Record that `from` paid `to` the given amount on `date`.
    pub fn record_payment(
        &mut self,
        from: &Participant,
        to: &Participant,
        amount: Decimal,
        date: NaiveDate,
    ) -> Result<SettlementPayment, RecordError> {
        if amount <= Decimal::ZERO {
            return Err(RecordError::InvalidAmount(amount));
        }
        if from == to {
            return Err(RecordError::SelfPayment(from.clone()));
        }
        for participant in [from, to] {
            if !self.is_participant(participant) {
                return Err(RecordError::UnknownParticipant(participant.clone()));
            }
        }

        let payment = SettlementPayment::new(
            from.clone(),
            to.clone(),
            amount,
            self.currency.clone(),
            date,
            Utc::now(),
        );
        self.store.append(payment.clone())?;
        info!("recorded payment {}: {}", payment.id(), payment);
        Ok(payment)
    }

    /// Record a planned settlement as paid in full.
    pub fn record_settlement(
        &mut self,
        settlement: &Settlement,
        date: NaiveDate,
    ) -> Result<SettlementPayment, RecordError> {
        self.record_payment(&settlement.from, &settlement.to, settlement.amount, date)
    }

    /// Undo a recorded payment.
    pub fn delete_payment(&mut self, id: Uuid) -> Result<SettlementPayment, RecordError> {
        let removed = self
            .store
            .remove(id)?
            .ok_or(RecordError::PaymentNotFound(id))?;
        info!("deleted payment {}: {}", id, removed);
        Ok(removed)
    }

    /// Every recorded payment, oldest first.
    pub fn payments(&self) -> Result<Vec<SettlementPayment>, RecordError> {
        let mut payments = self.store.list()?;
        payments.sort_by_key(|p| p.timestamp());
        Ok(payments)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::store::InMemoryPaymentStore;
    use rust_decimal_macros::dec;

    fn p(name: &str) -> Participant {
        Participant::new(name)
    }

    fn recorder() -> PaymentRecorder<InMemoryPaymentStore> {
        PaymentRecorder::new(
            [p("A"), p("B"), p("C")],
            CurrencyCode::new("EUR"),
            InMemoryPaymentStore::new(),
        )
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 14).unwrap()
    }

    #[test]
    fn test_record_payment() {
        let mut rec = recorder();
        let payment = rec.record_payment(&p("A"), &p("C"), dec!(25), day()).unwrap();

        assert_eq!(payment.from(), &p("A"));
        assert_eq!(payment.to(), &p("C"));
        assert_eq!(payment.amount(), dec!(25));
        assert_eq!(payment.currency().as_str(), "EUR");
        assert_eq!(payment.date(), day());
        assert_eq!(rec.payments().unwrap(), vec![payment]);
    }

    #[test]
    fn test_invalid_amount() {
        let mut rec = recorder();
        assert_eq!(
            rec.record_payment(&p("A"), &p("B"), Decimal::ZERO, day()),
            Err(RecordError::InvalidAmount(Decimal::ZERO))
        );
        assert_eq!(
            rec.record_payment(&p("A"), &p("B"), dec!(-3), day()),
            Err(RecordError::InvalidAmount(dec!(-3)))
        );
        assert!(rec.store().is_empty());
    }

    #[test]
    fn test_self_payment() {
        let mut rec = recorder();
        assert_eq!(
            rec.record_payment(&p("A"), &p("A"), dec!(5), day()),
            Err(RecordError::SelfPayment(p("A")))
        );
    }

    #[test]
    fn test_unknown_participant() {
        let mut rec = recorder();
        assert_eq!(
            rec.record_payment(&p("A"), &p("Zed"), dec!(5), day()),
            Err(RecordError::UnknownParticipant(p("Zed")))
        );
        rec.add_participant(p("Zed"));
        assert!(rec.record_payment(&p("A"), &p("Zed"), dec!(5), day()).is_ok());
    }

    #[test]
    fn test_delete_payment() {
        let mut rec = recorder();
        let first = rec.record_payment(&p("A"), &p("B"), dec!(5), day()).unwrap();
        let second = rec.record_payment(&p("B"), &p("C"), dec!(7), day()).unwrap();

        let removed = rec.delete_payment(first.id()).unwrap();
        assert_eq!(removed, first);
        assert_eq!(rec.payments().unwrap(), vec![second]);

        assert_eq!(
            rec.delete_payment(first.id()),
            Err(RecordError::PaymentNotFound(first.id()))
        );
    }

    #[test]
    fn test_record_settlement() {
        let mut rec = recorder();
        let settlement = Settlement::new(p("B"), p("C"), dec!(12.5));
        let payment = rec.record_settlement(&settlement, day()).unwrap();
        assert_eq!(payment.amount(), dec!(12.5));
        assert_eq!(payment.from(), &p("B"));
    }

    struct BrokenStore;

    impl PaymentStore for BrokenStore {
        fn append(&mut self, _payment: SettlementPayment) -> Result<(), StoreError> {
            Err(StoreError("disk full".into()))
        }

        fn remove(&mut self, _id: Uuid) -> Result<Option<SettlementPayment>, StoreError> {
            Err(StoreError("disk full".into()))
        }

        fn list(&self) -> Result<Vec<SettlementPayment>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_store_failure_is_reported() {
        let mut rec = PaymentRecorder::new([p("A"), p("B")], CurrencyCode::new("EUR"), BrokenStore);
        assert_eq!(
            rec.record_payment(&p("A"), &p("B"), dec!(1), day()),
            Err(RecordError::Store(StoreError("disk full".into())))
        );
    }
}
