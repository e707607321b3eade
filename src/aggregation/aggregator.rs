use crate::core::currency::CurrencyCode;
use crate::core::expense::Expense;
use crate::core::ledger::{Balances, Ledger, LedgerError};
use crate::core::payment::SettlementPayment;
use log::debug;

/// Compute every participant's net position from expenses and recorded payments.
///
/// # Algorithm
///
/// 1. For each expense, the payer is credited the full amount and each split
///    member is debited their share.
/// 2. For each payment, `from` is credited (their debt shrinks) and `to` is
///    debited (they are owed less).
///
/// Nothing is rounded; positions keep full decimal precision. Positions stay
/// per currency; see [`crate::fx::normalizer::normalize_ledger`] to collapse
/// them into one trip currency.
///
/// This is the only way balances are derived. After a payment is recorded or
/// deleted, callers rerun this over the full payment list instead of patching
/// a previous result.
///
/// Fails only if a position overflows the decimal range.
pub fn compute_balances(
    expenses: &[Expense],
    payments: &[SettlementPayment],
) -> Result<Ledger, LedgerError> {
    let mut ledger = Ledger::new();
    for expense in expenses {
        ledger.apply_expense(expense)?;
    }
    for payment in payments {
        ledger.apply_payment(payment)?;
    }
    debug!(
        "aggregated {} expenses and {} payments into {} positions",
        expenses.len(),
        payments.len(),
        ledger.all_positions().len()
    );
    Ok(ledger)
}

/// Single-currency shortcut: balances in `currency`, ignoring other currencies.
pub fn compute_balances_in(
    expenses: &[Expense],
    payments: &[SettlementPayment],
    currency: &CurrencyCode,
) -> Result<Balances, LedgerError> {
    Ok(compute_balances(expenses, payments)?.balances_in(currency))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expense::Split;
    use crate::core::participant::Participant;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn p(name: &str) -> Participant {
        Participant::new(name)
    }

    fn eur() -> CurrencyCode {
        CurrencyCode::new("EUR")
    }

    #[test]
    fn test_payer_outside_split() {
        // Alice pays for Bob and Carol only.
        let ex = Expense::new(
            p("Alice"),
            dec!(40),
            eur(),
            vec![Split::new(p("Bob"), dec!(25)), Split::new(p("Carol"), dec!(15))],
        )
        .unwrap();

        let balances = compute_balances_in(&[ex], &[], &eur()).unwrap();
        assert_eq!(balances.get(&p("Alice")), dec!(40));
        assert_eq!(balances.get(&p("Bob")), dec!(-25));
        assert_eq!(balances.get(&p("Carol")), dec!(-15));
        assert_eq!(balances.total(), Decimal::ZERO);
    }

    #[test]
    fn test_multiple_expenses_accumulate() {
        let roster = [p("Alice"), p("Bob"), p("Carol")];
        let expenses = vec![
            Expense::split_equally(p("Alice"), dec!(90), eur(), &roster).unwrap(),
            Expense::split_equally(p("Bob"), dec!(30), eur(), &roster).unwrap(),
        ];

        let balances = compute_balances_in(&expenses, &[], &eur()).unwrap();
        assert_eq!(balances.get(&p("Alice")), dec!(50));
        assert_eq!(balances.get(&p("Bob")), dec!(-10));
        assert_eq!(balances.get(&p("Carol")), dec!(-40));
    }

    #[test]
    fn test_no_expenses_is_empty() {
        let ledger = compute_balances(&[], &[]).unwrap();
        assert!(ledger.is_empty());
        assert!(ledger.is_balanced(dec!(0.01)));
    }

    #[test]
    fn test_currencies_kept_apart() {
        let expenses = vec![
            Expense::split_equally(p("Alice"), dec!(20), eur(), &[p("Alice"), p("Bob")]).unwrap(),
            Expense::split_equally(
                p("Bob"),
                dec!(100),
                CurrencyCode::new("CHF"),
                &[p("Alice"), p("Bob")],
            )
            .unwrap(),
        ];

        let ledger = compute_balances(&expenses, &[]).unwrap();
        assert_eq!(ledger.position(&p("Alice"), &eur()), dec!(10));
        assert_eq!(ledger.position(&p("Alice"), &CurrencyCode::new("CHF")), dec!(-50));
        assert_eq!(ledger.currencies().len(), 2);
        assert!(ledger.is_balanced(dec!(0.01)));
    }

    #[test]
    fn test_overflow_is_reported() {
        let huge = || {
            Expense::new(p("Alice"), Decimal::MAX, eur(), vec![Split::new(p("Bob"), Decimal::MAX)])
                .unwrap()
        };
        let expenses = vec![huge(), huge()];

        assert!(matches!(
            compute_balances(&expenses, &[]),
            Err(LedgerError::Overflow { ref participant, .. }) if participant == &p("Alice")
        ));
    }
}
