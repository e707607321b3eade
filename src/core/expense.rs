use crate::core::config::DEFAULT_TOLERANCE;
use crate::core::currency::{CurrencyCode, MONEY_DP};
use crate::core::participant::Participant;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while building an expense.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpenseError {
    #[error("expense amount must be positive, got {0}")]
    InvalidAmount(Decimal),
    #[error("expense must be split among at least one participant")]
    NoSplits,
    #[error("share for {participant} must not be negative, got {share}")]
    NegativeShare { participant: Participant, share: Decimal },
    #[error("{0} appears more than once in the split")]
    DuplicateSplit(Participant),
    #[error("split shares sum to {total} but the expense amount is {amount}")]
    SplitMismatch { amount: Decimal, total: Decimal },
    #[error("split weights must be non-negative and sum to a positive value")]
    InvalidWeights,
    #[error("split shares overflow the decimal range")]
    Overflow,
}

/// One participant's share of an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub participant: Participant,
    pub share: Decimal,
}

impl Split {
    pub fn new(participant: Participant, share: Decimal) -> Self {
        Self { participant, share }
    }
}

/// Money one participant paid on behalf of some subset of the trip.
///
/// The splits must add up to the amount (within the settlement tolerance).
/// The payer does not have to appear among the splits: paying for someone
/// else's dinner is a plain transfer of debt.
///
/// Expenses are immutable once built.
///
/// # Examples
///
/// ```
/// use settlement_engine::core::currency::CurrencyCode;
/// use settlement_engine::core::expense::Expense;
/// use settlement_engine::core::participant::Participant;
/// use rust_decimal_macros::dec;
///
/// let dinner = Expense::split_equally(
///     Participant::new("Alice"),
///     dec!(100),
///     CurrencyCode::new("EUR"),
///     &[Participant::new("Alice"), Participant::new("Bob"), Participant::new("Carol")],
/// )
/// .unwrap();
///
/// let shares: Vec<_> = dinner.splits().iter().map(|s| s.share).collect();
/// assert_eq!(shares, vec![dec!(33.34), dec!(33.33), dec!(33.33)]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    id: Uuid,
    payer: Participant,
    amount: Decimal,
    currency: CurrencyCode,
    splits: Vec<Split>,
    description: Option<String>,
    date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}

impl Expense {
    /// Build an expense from explicit shares.
    pub fn new(
        payer: Participant,
        amount: Decimal,
        currency: CurrencyCode,
        splits: Vec<Split>,
    ) -> Result<Self, ExpenseError> {
        validate(amount, &splits)?;
        Ok(Self {
            id: Uuid::new_v4(),
            payer,
            amount,
            currency,
            splits,
            description: None,
            date: None,
            created_at: Utc::now(),
        })
    }

    /// Split `amount` evenly, cent-exact.
    ///
    /// Leftover cents go one each to the first participants in the order given.
    pub fn split_equally(
        payer: Participant,
        amount: Decimal,
        currency: CurrencyCode,
        participants: &[Participant],
    ) -> Result<Self, ExpenseError> {
        let weights: Vec<(Participant, Decimal)> = participants
            .iter()
            .map(|p| (p.clone(), Decimal::ONE))
            .collect();
        Self::split_by_weights(payer, amount, currency, &weights)
    }

    /// Split `amount` proportionally to each participant's weight.
    ///
    /// Shares are truncated to cents and the remainder is handed out one cent
    /// at a time, in list order, to participants with a positive weight, so
    /// the shares always sum to the amount and a zero weight always means a
    /// zero share.
    pub fn split_by_weights(
        payer: Participant,
        amount: Decimal,
        currency: CurrencyCode,
        weights: &[(Participant, Decimal)],
    ) -> Result<Self, ExpenseError> {
        if amount <= Decimal::ZERO {
            return Err(ExpenseError::InvalidAmount(amount));
        }
        if weights.is_empty() {
            return Err(ExpenseError::NoSplits);
        }
        if weights.iter().any(|(_, w)| *w < Decimal::ZERO) {
            return Err(ExpenseError::InvalidWeights);
        }
        let total_weight = weights
            .iter()
            .try_fold(Decimal::ZERO, |sum, (_, w)| sum.checked_add(*w))
            .filter(|total| *total > Decimal::ZERO)
            .ok_or(ExpenseError::InvalidWeights)?;

        let mut splits: Vec<Split> = weights
            .iter()
            .map(|(p, w)| {
                // Multiply first for precision; the weight ratio is at most one
                // and cannot overflow.
                let exact = amount
                    .checked_mul(*w)
                    .map(|scaled| scaled / total_weight)
                    .unwrap_or_else(|| *w / total_weight * amount);
                let share = exact.round_dp_with_strategy(MONEY_DP, RoundingStrategy::ToZero);
                Split::new(p.clone(), share)
            })
            .collect();

        let cent = Decimal::new(1, MONEY_DP);
        let mut remainder = amount - checked_total(&splits)?;
        let weighted: Vec<usize> = weights
            .iter()
            .enumerate()
            .filter(|(_, (_, w))| *w > Decimal::ZERO)
            .map(|(i, _)| i)
            .collect();
        for &index in &weighted {
            if remainder < cent {
                break;
            }
            splits[index].share += cent;
            remainder -= cent;
        }
        // Sub-cent leftovers only occur when the amount itself has more than two decimals.
        if remainder > Decimal::ZERO {
            if let Some(&first) = weighted.first() {
                splits[first].share += remainder;
            }
        }

        Self::new(payer, amount, currency, splits)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    // --- Accessors ---

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn payer(&self) -> &Participant {
        &self.payer
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Every participant the expense touches: the payer and all split members.
    pub fn participants(&self) -> Vec<&Participant> {
        let mut all: Vec<&Participant> = std::iter::once(&self.payer)
            .chain(self.splits.iter().map(|s| &s.participant))
            .collect();
        all.sort();
        all.dedup();
        all
    }
}

fn checked_total(splits: &[Split]) -> Result<Decimal, ExpenseError> {
    splits
        .iter()
        .try_fold(Decimal::ZERO, |sum, s| sum.checked_add(s.share))
        .ok_or(ExpenseError::Overflow)
}

fn validate(amount: Decimal, splits: &[Split]) -> Result<(), ExpenseError> {
    if amount <= Decimal::ZERO {
        return Err(ExpenseError::InvalidAmount(amount));
    }
    if splits.is_empty() {
        return Err(ExpenseError::NoSplits);
    }

    let mut seen = HashSet::new();
    for split in splits {
        if split.share < Decimal::ZERO {
            return Err(ExpenseError::NegativeShare {
                participant: split.participant.clone(),
                share: split.share,
            });
        }
        if !seen.insert(&split.participant) {
            return Err(ExpenseError::DuplicateSplit(split.participant.clone()));
        }
    }

    let total = checked_total(splits)?;
    if (total - amount).abs() >= DEFAULT_TOLERANCE {
        return Err(ExpenseError::SplitMismatch { amount, total });
    }
    Ok(())
}
