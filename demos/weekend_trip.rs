//! A weekend trip with expenses in two currencies.
//!
//! Walks through the full flow: expenses, balances in the trip currency,
//! the settlement plan, and recomputing after a payment is recorded.

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use settlement_engine::core::config::EngineConfig;
use settlement_engine::core::currency::CurrencyCode;
use settlement_engine::core::expense::Expense;
use settlement_engine::core::participant::Participant;
use settlement_engine::fx::cache::CachedRateProvider;
use settlement_engine::fx::rates::FxRateTable;
use settlement_engine::optimization::settlement::SettlementOptimizer;
use settlement_engine::optimization::summary::SettlementSummary;
use settlement_engine::recording::store::InMemoryPaymentStore;
use settlement_engine::trip::{EngineError, Trip};

fn main() -> Result<(), EngineError> {
    println!("╔══════════════════════════════════════════╗");
    println!("║  settlement-engine: Weekend Trip Example ║");
    println!("╚══════════════════════════════════════════╝\n");

    let eur = CurrencyCode::new("EUR");
    let chf = CurrencyCode::new("CHF");
    let ana = Participant::new("Ana");
    let ben = Participant::new("Ben");
    let cleo = Participant::new("Cleo");
    let dov = Participant::new("Dov");
    let everyone = [ana.clone(), ben.clone(), cleo.clone(), dov.clone()];

    let mut trip = Trip::new("Lake Geneva", eur.clone()).with_participants(everyone.clone());

    trip.add_expense(
        Expense::split_equally(ana.clone(), dec!(412.80), chf.clone(), &everyone)?
            .with_description("Chalet, two nights"),
    )?;
    trip.add_expense(
        Expense::split_equally(ben.clone(), dec!(96.40), eur.clone(), &everyone)?
            .with_description("Groceries"),
    )?;
    trip.add_expense(
        Expense::split_by_weights(
            cleo.clone(),
            dec!(150),
            chf.clone(),
            &[(cleo.clone(), dec!(1)), (dov.clone(), dec!(2))],
        )?
        .with_description("Paragliding"),
    )?;

    // --- Balances ---
    println!("━━━ Expenses ━━━\n");
    for expense in trip.expenses() {
        println!(
            "  {:<20} {:>8} {}  paid by {}",
            expense.description().unwrap_or("-"),
            expense.amount(),
            expense.currency(),
            expense.payer()
        );
    }
    println!();

    let mut rates = FxRateTable::new();
    rates.set_rate(chf.clone(), eur.clone(), dec!(1.0437))?;
    let config = EngineConfig::default();
    let provider = CachedRateProvider::from_config(rates, &config);
    let optimizer = SettlementOptimizer::from_config(&config);

    println!("━━━ Balances (EUR) ━━━\n");
    let balances = trip.balances(&[], &provider)?;
    print!("{}", balances);
    println!();

    // --- Settlement plan ---
    println!("━━━ Settlement Plan ━━━\n");
    let plan = optimizer.calculate_optimized_settlements(&balances)?;
    print!("{}", plan);
    println!();
    println!("{}", SettlementSummary::from_plan(&plan, &balances, optimizer.tolerance()));

    // --- Record the first payment and recompute ---
    println!("━━━ After the first payment ━━━\n");
    let mut recorder = trip.recorder(InMemoryPaymentStore::new());
    if let Some(first) = plan.settlements().first() {
        let date = NaiveDate::from_ymd_opt(2024, 9, 8).unwrap_or_default();
        let payment = recorder.record_settlement(first, date)?;
        println!("  Recorded: {}\n", payment);
    }

    let payments = recorder.payments()?;
    let balances = trip.balances(&payments, &provider)?;
    print!("{}", balances);
    println!();
    print!("{}", optimizer.calculate_optimized_settlements(&balances)?);

    Ok(())
}
