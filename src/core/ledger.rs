use crate::core::currency::{round_money, CurrencyCode};
use crate::core::expense::Expense;
use crate::core::participant::Participant;
use crate::core::payment::SettlementPayment;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A position grew beyond what a decimal can hold.
    #[error("position of {participant} in {currency} overflowed")]
    Overflow {
        participant: Participant,
        currency: CurrencyCode,
    },
}

/// Net balance of each participant in one currency.
///
/// A positive balance means the participant is owed money (creditor).
/// A negative balance means the participant owes money (debtor).
/// A participant missing from the map has a balance of zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balances {
    balances: BTreeMap<Participant, Decimal>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a participant's balance, replacing any previous value.
    pub fn set(&mut self, participant: Participant, balance: Decimal) {
        self.balances.insert(participant, balance);
    }

    /// Add `delta` to a participant's balance.
    pub fn adjust(&mut self, participant: &Participant, delta: Decimal) {
        *self
            .balances
            .entry(participant.clone())
            .or_insert(Decimal::ZERO) += delta;
    }

    /// [`Balances::adjust`], or `None` (leaving the balance untouched) if the
    /// new balance would overflow.
    pub fn checked_adjust(&mut self, participant: &Participant, delta: Decimal) -> Option<Decimal> {
        let balance = self.get(participant).checked_add(delta)?;
        self.balances.insert(participant.clone(), balance);
        Some(balance)
    }

    /// Balance of `participant`; absent participants are zero.
    pub fn get(&self, participant: &Participant) -> Decimal {
        self.balances
            .get(participant)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Participant, Decimal)> {
        self.balances.iter().map(|(p, b)| (p, *b))
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.balances.keys()
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Sum of all balances. Zero for a closed trip.
    pub fn total(&self) -> Decimal {
        self.balances.values().sum()
    }

    /// [`Balances::total`], or `None` if the sum overflows.
    pub fn checked_total(&self) -> Option<Decimal> {
        self.balances
            .values()
            .try_fold(Decimal::ZERO, |sum, b| sum.checked_add(*b))
    }

    /// True if every balance is within `tolerance` of zero.
    pub fn is_settled(&self, tolerance: Decimal) -> bool {
        self.balances.values().all(|b| b.abs() < tolerance)
    }

    /// Number of participants whose balance is at least `tolerance` away from zero.
    pub fn unsettled_count(&self, tolerance: Decimal) -> usize {
        self.balances
            .values()
            .filter(|b| b.abs() >= tolerance)
            .count()
    }

    /// Total owed to creditors (equal to the total owed by debtors when balanced).
    pub fn total_outstanding(&self) -> Decimal {
        self.balances.values().filter(|b| **b > Decimal::ZERO).sum()
    }
}

impl FromIterator<(Participant, Decimal)> for Balances {
    fn from_iter<T: IntoIterator<Item = (Participant, Decimal)>>(iter: T) -> Self {
        let mut balances = Balances::new();
        for (participant, amount) in iter {
            balances.adjust(&participant, amount);
        }
        balances
    }
}

impl std::fmt::Display for Balances {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (participant, balance) in self.iter() {
            let status = if balance > Decimal::ZERO {
                "is owed"
            } else if balance < Decimal::ZERO {
                "owes"
            } else {
                "is settled"
            };
            writeln!(f, "  {:<15} {:>12}  [{}]", participant, round_money(balance), status)?;
        }
        Ok(())
    }
}

/// Per-currency net positions derived from a trip's expenses and payments.
///
/// This is the raw output of balance aggregation. Expenses in different
/// currencies stay in separate positions until the normalizer converts them
/// into the trip currency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    /// (Participant, CurrencyCode) -> net balance
    #[serde(with = "positions_serde")]
    positions: HashMap<(Participant, CurrencyCode), Decimal>,
}

mod positions_serde {
    use super::*;
    use serde::de::{self, MapAccess, Visitor};
    use serde::ser::SerializeMap;

    pub fn serialize<S: serde::Serializer>(
        positions: &HashMap<(Participant, CurrencyCode), Decimal>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let sorted: BTreeMap<_, _> = positions.iter().collect();
        let mut map = serializer.serialize_map(Some(sorted.len()))?;
        for ((participant, currency), amount) in sorted {
            map.serialize_entry(&format!("{}:{}", participant, currency), amount)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<(Participant, CurrencyCode), Decimal>, D::Error> {
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = HashMap<(Participant, CurrencyCode), Decimal>;
            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map with \"participant:currency\" keys")
            }
            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
                let mut map = HashMap::new();
                while let Some((key, value)) = access.next_entry::<String, Decimal>()? {
                    // Names may contain ':'; currency codes never do.
                    let (participant, currency) = key
                        .rsplit_once(':')
                        .ok_or_else(|| de::Error::custom(format!("invalid key: {key}")))?;
                    map.insert(
                        (Participant::new(participant), CurrencyCode::new(currency)),
                        value,
                    );
                }
                Ok(map)
            }
        }
        deserializer.deserialize_map(V)
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an expense: the payer is owed the amount, every split member owes their share.
    ///
    /// On overflow the expense may be partially applied; discard the ledger.
    pub fn apply_expense(&mut self, expense: &Expense) -> Result<(), LedgerError> {
        self.credit(expense.payer(), expense.currency(), expense.amount())?;
        for split in expense.splits() {
            self.credit(&split.participant, expense.currency(), -split.share)?;
        }
        Ok(())
    }

    /// Apply a recorded payment: the payer's debt shrinks, the payee is owed less.
    pub fn apply_payment(&mut self, payment: &SettlementPayment) -> Result<(), LedgerError> {
        self.credit(payment.from(), payment.currency(), payment.amount())?;
        self.credit(payment.to(), payment.currency(), -payment.amount())
    }

    fn credit(
        &mut self,
        participant: &Participant,
        currency: &CurrencyCode,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        let position = self
            .positions
            .entry((participant.clone(), currency.clone()))
            .or_insert(Decimal::ZERO);
        *position = position
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow {
                participant: participant.clone(),
                currency: currency.clone(),
            })?;
        Ok(())
    }

    /// Net position of a participant in a specific currency.
    pub fn position(&self, participant: &Participant, currency: &CurrencyCode) -> Decimal {
        self.positions
            .get(&(participant.clone(), currency.clone()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn all_positions(&self) -> &HashMap<(Participant, CurrencyCode), Decimal> {
        &self.positions
    }

    /// Currencies with at least one position, sorted.
    pub fn currencies(&self) -> Vec<CurrencyCode> {
        let set: BTreeSet<&CurrencyCode> = self.positions.keys().map(|(_, c)| c).collect();
        set.into_iter().cloned().collect()
    }

    pub fn participants(&self) -> Vec<Participant> {
        let set: BTreeSet<&Participant> = self.positions.keys().map(|(p, _)| p).collect();
        set.into_iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Balances of every participant in one currency, ignoring all other currencies.
    pub fn balances_in(&self, currency: &CurrencyCode) -> Balances {
        self.positions
            .iter()
            .filter(|((_, c), _)| c == currency)
            .map(|((p, _), amount)| (p.clone(), *amount))
            .collect()
    }

    /// Per-currency sum of positions.
    pub fn currency_totals(&self) -> BTreeMap<CurrencyCode, Decimal> {
        let mut totals = BTreeMap::new();
        for ((_, currency), amount) in &self.positions {
            *totals.entry(currency.clone()).or_insert(Decimal::ZERO) += amount;
        }
        totals
    }

    /// True if the positions in every currency sum to within `tolerance` of zero.
    pub fn is_balanced(&self, tolerance: Decimal) -> bool {
        self.currency_totals()
            .values()
            .all(|sum| sum.abs() < tolerance)
    }
}
