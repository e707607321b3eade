use crate::core::payment::SettlementPayment;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("payment store failure: {0}")]
pub struct StoreError(pub String);

/// Persistence for recorded payments, supplied by the caller.
///
/// Implementations must give read-your-writes: once `append` or `remove`
/// returns `Ok`, the next `list` reflects it.
pub trait PaymentStore {
    fn append(&mut self, payment: SettlementPayment) -> Result<(), StoreError>;

    /// Remove a payment by id, returning it if it existed.
    fn remove(&mut self, id: Uuid) -> Result<Option<SettlementPayment>, StoreError>;

    fn list(&self) -> Result<Vec<SettlementPayment>, StoreError>;
}

/// Store that keeps payments in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentStore {
    payments: Vec<SettlementPayment>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.payments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payments.is_empty()
    }
}

impl PaymentStore for InMemoryPaymentStore {
    fn append(&mut self, payment: SettlementPayment) -> Result<(), StoreError> {
        self.payments.push(payment);
        Ok(())
    }

    fn remove(&mut self, id: Uuid) -> Result<Option<SettlementPayment>, StoreError> {
        Ok(self
            .payments
            .iter()
            .position(|p| p.id() == id)
            .map(|index| self.payments.remove(index)))
    }

    fn list(&self) -> Result<Vec<SettlementPayment>, StoreError> {
        Ok(self.payments.clone())
    }
}
