use crate::core::currency::CurrencyCode;
use crate::core::participant::Participant;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A real-world transfer one participant made to another to pay down debt.
///
/// Payment records are an append-only audit trail. They have no setters:
/// correcting a payment means deleting it and recording a new one.
///
/// Only [`PaymentRecorder`](crate::recording::recorder::PaymentRecorder)
/// creates these; it validates the parties and amount first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPayment {
    id: Uuid,
    from: Participant,
    to: Participant,
    amount: Decimal,
    currency: CurrencyCode,
    /// Day the payment happened, as reported by the user.
    date: NaiveDate,
    /// When the record was created.
    timestamp: DateTime<Utc>,
}

impl SettlementPayment {
    pub(crate) fn new(
        from: Participant,
        to: Participant,
        amount: Decimal,
        currency: CurrencyCode,
        date: NaiveDate,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            amount,
            currency,
            date,
            timestamp,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn from(&self) -> &Participant {
        &self.from
    }

    pub fn to(&self) -> &Participant {
        &self.to
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl std::fmt::Display for SettlementPayment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} paid {} {} {} on {}",
            self.from, self.to, self.amount, self.currency, self.date
        )
    }
}
