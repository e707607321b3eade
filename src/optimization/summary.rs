use crate::core::currency::round_money;
use crate::core::ledger::Balances;
use crate::core::participant::Participant;
use crate::optimization::settlement::SettlementPlan;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Who pays and who receives what under a settlement plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementSummary {
    /// Total each debtor pays out.
    pub outflows: BTreeMap<Participant, Decimal>,
    /// Total each creditor receives.
    pub inflows: BTreeMap<Participant, Decimal>,
    /// Sum of all settlement amounts.
    pub total_transferred: Decimal,
    /// Number of payments in the plan.
    pub settlement_count: usize,
    /// Participants not yet settled before the plan runs.
    pub unsettled_participants: usize,
    /// Payments needed if every debtor paid every creditor pro rata.
    pub naive_settlement_count: usize,
}

impl SettlementSummary {
    /// Summarize `plan` as computed for `balances`.
    pub fn from_plan(plan: &SettlementPlan, balances: &Balances, tolerance: Decimal) -> Self {
        let mut outflows: BTreeMap<Participant, Decimal> = BTreeMap::new();
        let mut inflows: BTreeMap<Participant, Decimal> = BTreeMap::new();

        for settlement in plan {
            *outflows
                .entry(settlement.from.clone())
                .or_insert(Decimal::ZERO) += settlement.amount;
            *inflows
                .entry(settlement.to.clone())
                .or_insert(Decimal::ZERO) += settlement.amount;
        }

        let debtors = balances.iter().filter(|(_, b)| *b <= -tolerance).count();
        let creditors = balances.iter().filter(|(_, b)| *b >= tolerance).count();

        SettlementSummary {
            outflows,
            inflows,
            total_transferred: plan.total_transferred(),
            settlement_count: plan.len(),
            unsettled_participants: debtors + creditors,
            naive_settlement_count: debtors * creditors,
        }
    }

    /// Upper bound on payments a greedy plan can need: one fewer than the
    /// number of unsettled participants.
    pub fn settlement_bound(&self) -> usize {
        self.unsettled_participants.saturating_sub(1)
    }

    /// Payments saved relative to the naive plan.
    pub fn payments_saved(&self) -> usize {
        self.naive_settlement_count
            .saturating_sub(self.settlement_count)
    }
}

impl std::fmt::Display for SettlementSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Settlement Summary ===")?;
        writeln!(f, "Payments:          {}", self.settlement_count)?;
        writeln!(f, "Naive payments:    {}", self.naive_settlement_count)?;
        writeln!(f, "Total transferred: {}", round_money(self.total_transferred))?;

        writeln!(f, "\nPaying:")?;
        for (participant, amount) in &self.outflows {
            writeln!(f, "  {:<15} {:>12}", participant, round_money(*amount))?;
        }

        writeln!(f, "\nReceiving:")?;
        for (participant, amount) in &self.inflows {
            writeln!(f, "  {:<15} {:>12}", participant, round_money(*amount))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::settlement::calculate_optimized_settlements;
    use rust_decimal_macros::dec;

    #[test]
    fn test_summary_four_party() {
        let balances: Balances = vec![
            (Participant::new("A"), dec!(-30)),
            (Participant::new("B"), dec!(-10)),
            (Participant::new("C"), dec!(25)),
            (Participant::new("D"), dec!(15)),
        ]
        .into_iter()
        .collect();
        let plan = calculate_optimized_settlements(&balances).unwrap();
        let summary = SettlementSummary::from_plan(&plan, &balances, dec!(0.01));

        assert_eq!(summary.settlement_count, 3);
        assert_eq!(summary.settlement_bound(), 3);
        assert_eq!(summary.naive_settlement_count, 4);
        assert_eq!(summary.payments_saved(), 1);
        assert_eq!(summary.total_transferred, dec!(40));
        assert_eq!(summary.outflows[&Participant::new("A")], dec!(30));
        assert_eq!(summary.inflows[&Participant::new("D")], dec!(15));
    }

    #[test]
    fn test_summary_settled_trip() {
        let balances: Balances = vec![(Participant::new("A"), Decimal::ZERO)]
            .into_iter()
            .collect();
        let plan = calculate_optimized_settlements(&balances).unwrap();
        let summary = SettlementSummary::from_plan(&plan, &balances, dec!(0.01));

        assert_eq!(summary.settlement_count, 0);
        assert_eq!(summary.settlement_bound(), 0);
        assert!(summary.outflows.is_empty());
    }
}
