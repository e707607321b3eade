use crate::core::currency::{round_money, CurrencyCode};
use crate::core::ledger::{Balances, Ledger};
use crate::core::participant::Participant;
use crate::fx::rates::{FxError, RateProvider};
use log::debug;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Convert `amount` from one currency to another.
///
/// Same-currency conversions return `amount` untouched and never reach the
/// provider, so they cannot fail. Everything else is multiplied by the
/// provider's rate and rounded once to cents, half-up.
///
/// # Examples
///
/// ```
/// use settlement_engine::core::currency::CurrencyCode;
/// use settlement_engine::fx::normalizer::normalize;
/// use settlement_engine::fx::rates::FxRateTable;
/// use rust_decimal_macros::dec;
///
/// let mut rates = FxRateTable::new();
/// rates.set_rate(CurrencyCode::new("GBP"), CurrencyCode::new("EUR"), dec!(1.17)).unwrap();
///
/// let eur = normalize(dec!(10.05), &CurrencyCode::new("GBP"), &CurrencyCode::new("EUR"), &rates);
/// assert_eq!(eur.unwrap(), dec!(11.76));
/// ```
pub fn normalize<P: RateProvider + ?Sized>(
    amount: Decimal,
    from: &CurrencyCode,
    to: &CurrencyCode,
    provider: &P,
) -> Result<Decimal, FxError> {
    if from == to {
        return Ok(amount);
    }
    let rate = provider.get_rate(from, to)?;
    convert(amount, rate, from, to)
}

fn convert(
    amount: Decimal,
    rate: Decimal,
    from: &CurrencyCode,
    to: &CurrencyCode,
) -> Result<Decimal, FxError> {
    amount
        .checked_mul(rate)
        .map(round_money)
        .ok_or_else(|| overflow(from, to))
}

fn overflow(from: &CurrencyCode, to: &CurrencyCode) -> FxError {
    FxError::Overflow {
        from: from.clone(),
        to: to.clone(),
    }
}

/// Collapse a multi-currency ledger into balances in `target`.
///
/// Each currency is converted with a single rate lookup. Rounding every
/// position to cents can leave the converted positions of a currency a few
/// cents off the converted currency total; that residual is moved onto the
/// largest position of the currency (first by name on ties), so a ledger that
/// closed before conversion still closes after it.
pub fn normalize_ledger<P: RateProvider + ?Sized>(
    ledger: &Ledger,
    target: &CurrencyCode,
    provider: &P,
) -> Result<Balances, FxError> {
    let mut by_currency: BTreeMap<&CurrencyCode, Vec<(&Participant, Decimal)>> = BTreeMap::new();
    for ((participant, currency), amount) in ledger.all_positions() {
        by_currency
            .entry(currency)
            .or_default()
            .push((participant, *amount));
    }

    let mut balances = Balances::new();
    for (currency, mut positions) in by_currency {
        positions.sort_by(|a, b| a.0.cmp(b.0));

        if currency == target {
            for (participant, amount) in positions {
                balances
                    .checked_adjust(participant, amount)
                    .ok_or_else(|| overflow(currency, target))?;
            }
            continue;
        }

        let rate = provider.get_rate(currency, target)?;
        let raw_total = positions
            .iter()
            .try_fold(Decimal::ZERO, |sum, (_, amount)| sum.checked_add(*amount))
            .ok_or_else(|| overflow(currency, target))?;
        let mut converted = positions
            .into_iter()
            .map(|(participant, amount)| {
                convert(amount, rate, currency, target).map(|value| (participant, value))
            })
            .collect::<Result<Vec<(&Participant, Decimal)>, FxError>>()?;

        let residual = converted
            .iter()
            .try_fold(Decimal::ZERO, |sum, (_, amount)| sum.checked_add(*amount))
            .zip(convert(raw_total, rate, currency, target).ok())
            .and_then(|(sum, expected)| sum.checked_sub(expected))
            .ok_or_else(|| overflow(currency, target))?;
        if residual != Decimal::ZERO {
            if let Some(largest) = converted
                .iter_mut()
                .reduce(|best, next| if next.1.abs() > best.1.abs() { next } else { best })
            {
                debug!(
                    "absorbing {} {} rounding residual into {}",
                    residual, target, largest.0
                );
                largest.1 -= residual;
            }
        }

        for (participant, amount) in converted {
            balances
                .checked_adjust(participant, amount)
                .ok_or_else(|| overflow(currency, target))?;
        }
    }
    Ok(balances)
}
