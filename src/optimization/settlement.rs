use crate::core::config::{EngineConfig, DEFAULT_TOLERANCE};
use crate::core::currency::round_money;
use crate::core::ledger::Balances;
use crate::core::participant::Participant;
use log::{debug, warn};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    /// The balances do not sum to zero, so some debt has no counterparty.
    #[error("balances do not sum to zero (residual {residual}); cannot settle")]
    UnbalancedLedger { residual: Decimal },
    #[error("settlement tolerance must be positive, got {0}")]
    InvalidTolerance(Decimal),
    #[error("balance arithmetic overflowed")]
    Overflow,
}

/// One instructed payment: `from` pays `to` the given amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub from: Participant,
    pub to: Participant,
    pub amount: Decimal,
}

impl Settlement {
    pub fn new(from: Participant, to: Participant, amount: Decimal) -> Self {
        Self { from, to, amount }
    }
}

impl std::fmt::Display for Settlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} pays {} {}", self.from, self.to, round_money(self.amount))
    }
}

/// An ordered list of settlements that together clear a set of balances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettlementPlan {
    settlements: Vec<Settlement>,
}

impl SettlementPlan {
    pub fn settlements(&self) -> &[Settlement] {
        &self.settlements
    }

    pub fn len(&self) -> usize {
        self.settlements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settlements.is_empty()
    }

    /// Sum of all settlement amounts.
    pub fn total_transferred(&self) -> Decimal {
        self.settlements.iter().map(|s| s.amount).sum()
    }

    /// Settlements in which `participant` pays or gets paid.
    pub fn for_participant<'a>(&'a self, participant: &'a Participant) -> impl Iterator<Item = &'a Settlement> + 'a {
        self.settlements
            .iter()
            .filter(move |s| &s.from == participant || &s.to == participant)
    }

    /// The balances that remain once every settlement in the plan is paid.
    pub fn apply_to(&self, balances: &Balances) -> Balances {
        let mut after = balances.clone();
        for settlement in &self.settlements {
            after.adjust(&settlement.from, settlement.amount);
            after.adjust(&settlement.to, -settlement.amount);
        }
        after
    }

    pub fn into_settlements(self) -> Vec<Settlement> {
        self.settlements
    }
}

impl<'a> IntoIterator for &'a SettlementPlan {
    type Item = &'a Settlement;
    type IntoIter = std::slice::Iter<'a, Settlement>;

    fn into_iter(self) -> Self::IntoIter {
        self.settlements.iter()
    }
}

impl std::fmt::Display for SettlementPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.settlements.is_empty() {
            return writeln!(f, "  Everyone is settled up.");
        }
        for (i, settlement) in self.settlements.iter().enumerate() {
            writeln!(f, "  {:>3}. {}", i + 1, settlement)?;
        }
        Ok(())
    }
}

/// Outstanding magnitude of one side of the matching.
#[derive(Debug, Clone)]
struct Position {
    participant: Participant,
    magnitude: Decimal,
}

impl Position {
    /// What is left after paying `amount`, or `None` once fully paid.
    fn reduced_by(self, amount: Decimal) -> Option<Position> {
        let magnitude = self.magnitude - amount;
        (magnitude > Decimal::ZERO).then_some(Position {
            participant: self.participant,
            magnitude,
        })
    }
}

/// Largest magnitude first; equal magnitudes ordered by participant name.
fn sorted_queue(mut positions: Vec<Position>) -> VecDeque<Position> {
    positions.sort_by(|a, b| {
        b.magnitude
            .cmp(&a.magnitude)
            .then_with(|| a.participant.cmp(&b.participant))
    });
    positions.into()
}

/// Snap every balance onto multiples of `quantum` so the snapped values sum
/// to exactly zero.
///
/// Each balance is floored to the grid, then the steps missing from a zero
/// total are handed out one `quantum` at a time to the largest floor
/// remainders (ties by name). Requires `|total| < quantum`; every snapped
/// value then lies strictly within `quantum` of its balance, keeps its sign,
/// and zero balances stay zero.
fn snap_to_grid(
    balances: &Balances,
    quantum: Decimal,
) -> Result<Vec<(Participant, Decimal)>, SettlementError> {
    let mut snapped = Vec::with_capacity(balances.len());
    let mut floor_total = Decimal::ZERO;
    for (participant, balance) in balances.iter() {
        let floor = balance
            .checked_div(quantum)
            .and_then(|steps| steps.floor().checked_mul(quantum))
            .ok_or(SettlementError::Overflow)?;
        floor_total = floor_total
            .checked_add(floor)
            .ok_or(SettlementError::Overflow)?;
        snapped.push((participant.clone(), floor, balance - floor));
    }

    let missing_steps = (-floor_total)
        .checked_div(quantum)
        .and_then(|steps| steps.to_usize())
        .unwrap_or_default();
    let mut by_remainder: Vec<usize> = (0..snapped.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        snapped[b]
            .2
            .cmp(&snapped[a].2)
            .then_with(|| snapped[a].0.cmp(&snapped[b].0))
    });
    for &index in by_remainder.iter().take(missing_steps) {
        snapped[index].1 = snapped[index]
            .1
            .checked_add(quantum)
            .ok_or(SettlementError::Overflow)?;
    }

    Ok(snapped
        .into_iter()
        .map(|(participant, value, _)| (participant, value))
        .collect())
}

/// Greedy debt-settlement optimizer.
///
/// Produces at most one settlement fewer than the number of participants with
/// a non-zero balance. The greedy pairing is not guaranteed to be the global
/// minimum for every set of balances (finding that is NP-hard), but in
/// practice it rarely does worse.
#[derive(Debug, Clone)]
pub struct SettlementOptimizer {
    tolerance: Decimal,
}

impl Default for SettlementOptimizer {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl SettlementOptimizer {
    pub fn new(tolerance: Decimal) -> Self {
        Self { tolerance }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.tolerance)
    }

    pub fn tolerance(&self) -> Decimal {
        self.tolerance
    }

    /// Derive the settlement plan for `balances`.
    ///
    /// # Algorithm
    ///
    /// 1. Reject balances whose sum is at least the tolerance away from zero,
    ///    and return an empty plan if every balance is already within it.
    /// 2. Snap the balances onto multiples of the tolerance so they sum to
    ///    exactly zero, each moving by less than the tolerance.
    /// 3. Split the non-zero values into debtors and creditors, each queue
    ///    sorted by magnitude descending, ties by name ascending.
    /// 4. Pop the front debtor and creditor, settle `min` of the two, and
    ///    push back whichever side still has something left. On equal
    ///    magnitudes both sides are exhausted in one step.
    /// 5. The snapped values close exactly, so both queues drain together.
    ///
    /// Paying the plan leaves every participant within the tolerance of zero.
    /// The result is fully determined by the input, including order.
    pub fn calculate_optimized_settlements(
        &self,
        balances: &Balances,
    ) -> Result<SettlementPlan, SettlementError> {
        if self.tolerance <= Decimal::ZERO {
            return Err(SettlementError::InvalidTolerance(self.tolerance));
        }
        let total = balances.checked_total().ok_or(SettlementError::Overflow)?;
        if total.abs() >= self.tolerance {
            warn!("refusing to settle: balances sum to {}", total);
            return Err(SettlementError::UnbalancedLedger { residual: total });
        }
        if balances.is_settled(self.tolerance) {
            return Ok(SettlementPlan::default());
        }

        let (debtors, creditors): (Vec<Position>, Vec<Position>) =
            snap_to_grid(balances, self.tolerance)?
                .into_iter()
                .filter(|(_, value)| !value.is_zero())
                .map(|(participant, value)| Position {
                    participant,
                    magnitude: value,
                })
                .partition(|position| position.magnitude < Decimal::ZERO);
        let debtors: Vec<Position> = debtors
            .into_iter()
            .map(|p| Position {
                magnitude: -p.magnitude,
                ..p
            })
            .collect();

        let mut debtors = sorted_queue(debtors);
        let mut creditors = sorted_queue(creditors);
        let mut settlements = Vec::with_capacity(debtors.len() + creditors.len());

        while let (Some(debtor), Some(creditor)) = (debtors.pop_front(), creditors.pop_front()) {
            let amount = debtor.magnitude.min(creditor.magnitude);
            settlements.push(Settlement::new(
                debtor.participant.clone(),
                creditor.participant.clone(),
                amount,
            ));

            if let Some(rest) = debtor.reduced_by(amount) {
                debtors.push_front(rest);
            }
            if let Some(rest) = creditor.reduced_by(amount) {
                creditors.push_front(rest);
            }
        }

        debug!("settled {} balances with {} payments", balances.len(), settlements.len());
        Ok(SettlementPlan { settlements })
    }
}

/// [`SettlementOptimizer::calculate_optimized_settlements`] with the default one-cent tolerance.
pub fn calculate_optimized_settlements(
    balances: &Balances,
) -> Result<SettlementPlan, SettlementError> {
    SettlementOptimizer::default().calculate_optimized_settlements(balances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn balances(entries: &[(&str, Decimal)]) -> Balances {
        entries
            .iter()
            .map(|(name, amount)| (Participant::new(*name), *amount))
            .collect()
    }

    fn s(from: &str, to: &str, amount: Decimal) -> Settlement {
        Settlement::new(Participant::new(from), Participant::new(to), amount)
    }

    #[test]
    fn test_four_party_scenario() {
        let input = balances(&[
            ("A", dec!(-30)),
            ("B", dec!(-10)),
            ("C", dec!(25)),
            ("D", dec!(15)),
        ]);
        let plan = calculate_optimized_settlements(&input).unwrap();

        assert_eq!(
            plan.settlements(),
            &[s("A", "C", dec!(25)), s("A", "D", dec!(5)), s("B", "D", dec!(10))]
        );
        assert!(plan.apply_to(&input).is_settled(dec!(0.01)));
        assert_eq!(plan.total_transferred(), dec!(40));
    }

    #[test]
    fn test_below_tolerance_is_empty() {
        let input = balances(&[("A", dec!(0.001)), ("B", dec!(-0.001))]);
        let plan = calculate_optimized_settlements(&input).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_empty_balances() {
        let plan = calculate_optimized_settlements(&Balances::new()).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_equal_magnitudes_settle_in_one_step() {
        let input = balances(&[("A", dec!(-50)), ("B", dec!(50))]);
        let plan = calculate_optimized_settlements(&input).unwrap();
        assert_eq!(plan.settlements(), &[s("A", "B", dec!(50))]);
    }

    #[test]
    fn test_ties_broken_by_name() {
        let input = balances(&[
            ("Zoe", dec!(-10)),
            ("Adam", dec!(-10)),
            ("Mia", dec!(20)),
        ]);
        let plan = calculate_optimized_settlements(&input).unwrap();
        assert_eq!(
            plan.settlements(),
            &[s("Adam", "Mia", dec!(10)), s("Zoe", "Mia", dec!(10))]
        );
    }

    #[test]
    fn test_unbalanced_input_is_an_error() {
        let input = balances(&[("A", dec!(-30)), ("B", dec!(20))]);
        assert_eq!(
            calculate_optimized_settlements(&input).unwrap_err(),
            SettlementError::UnbalancedLedger {
                residual: dec!(-10)
            }
        );
    }

    #[test]
    fn test_sub_cent_creditors_are_paid_together() {
        let input = balances(&[
            ("A", dec!(-0.018)),
            ("B", dec!(0.009)),
            ("C", dec!(0.009)),
        ]);
        let plan = calculate_optimized_settlements(&input).unwrap();
        assert_eq!(
            plan.settlements(),
            &[s("A", "B", dec!(0.01)), s("A", "C", dec!(0.01))]
        );
        assert!(plan.apply_to(&input).is_settled(dec!(0.01)));
    }

    #[test]
    fn test_sub_cent_remainders_do_not_strand_a_creditor() {
        let input = balances(&[
            ("D1", dec!(-1.009)),
            ("D2", dec!(-1.009)),
            ("C1", dec!(1)),
            ("C2", dec!(1)),
            ("C3", dec!(0.018)),
        ]);
        assert_eq!(input.total(), Decimal::ZERO);

        let plan = calculate_optimized_settlements(&input).unwrap();
        assert!(plan.len() <= 4);
        assert!(plan.apply_to(&input).is_settled(dec!(0.01)));
        assert!(plan.for_participant(&Participant::new("C3")).count() > 0);
    }

    #[test]
    fn test_settled_within_tolerance_needs_no_payment() {
        let input = balances(&[("A", dec!(0.006)), ("B", dec!(-0.006))]);
        assert!(calculate_optimized_settlements(&input).unwrap().is_empty());
    }

    #[test]
    fn test_non_positive_tolerance_is_rejected() {
        let input = balances(&[("A", dec!(-1)), ("B", dec!(1))]);
        assert_eq!(
            SettlementOptimizer::new(Decimal::ZERO).calculate_optimized_settlements(&input),
            Err(SettlementError::InvalidTolerance(Decimal::ZERO))
        );
    }

    #[test]
    fn test_overflowing_total_is_an_error() {
        let input = balances(&[("A", Decimal::MAX), ("B", Decimal::MAX), ("C", dec!(-1))]);
        assert_eq!(
            calculate_optimized_settlements(&input),
            Err(SettlementError::Overflow)
        );
    }

    #[test]
    fn test_sub_tolerance_drift_is_tolerated() {
        let input = balances(&[("A", dec!(-10)), ("B", dec!(5.003)), ("C", dec!(5))]);
        let plan = calculate_optimized_settlements(&input).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.apply_to(&input).is_settled(dec!(0.01)));
    }

    #[test]
    fn test_custom_tolerance() {
        let optimizer = SettlementOptimizer::new(dec!(1));
        let input = balances(&[("A", dec!(-0.5)), ("B", dec!(0.5))]);
        assert!(optimizer
            .calculate_optimized_settlements(&input)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_for_participant() {
        let input = balances(&[
            ("A", dec!(-30)),
            ("B", dec!(-10)),
            ("C", dec!(25)),
            ("D", dec!(15)),
        ]);
        let plan = calculate_optimized_settlements(&input).unwrap();
        let d = Participant::new("D");
        assert_eq!(plan.for_participant(&d).count(), 2);
    }

    #[test]
    fn test_settlement_display_rounds_half_up() {
        assert_eq!(s("A", "B", dec!(2.345)).to_string(), "A pays B 2.35");
        assert_eq!(s("A", "B", dec!(0.125)).to_string(), "A pays B 0.13");
    }
}
