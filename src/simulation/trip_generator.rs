//! Random trip generation for benchmarks, property checks and the CLI.

use crate::core::currency::CurrencyCode;
use crate::core::expense::Expense;
use crate::core::participant::Participant;
use crate::trip::{EngineError, Trip};
use log::warn;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

/// Configuration for generating a random trip.
#[derive(Debug, Clone)]
pub struct TripConfig {
    /// Number of participants.
    pub participant_count: usize,
    /// Number of expenses to generate.
    pub expense_count: usize,
    /// Currencies expenses are drawn from. The first one is the trip currency.
    pub currencies: Vec<CurrencyCode>,
    /// Smallest expense, in cents.
    pub min_cents: i64,
    /// Largest expense, in cents.
    pub max_cents: i64,
    /// Fixed seed for reproducible trips; `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for TripConfig {
    fn default() -> Self {
        Self {
            participant_count: 6,
            expense_count: 20,
            currencies: vec![CurrencyCode::new("EUR")],
            min_cents: 100,
            max_cents: 50_000,
            seed: None,
        }
    }
}

/// Generate a trip whose expenses are split equally among random subsets.
pub fn generate_random_trip(config: &TripConfig) -> Trip {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let participants: Vec<Participant> = (0..config.participant_count)
        .map(|i| Participant::new(format!("P{:03}", i)))
        .collect();
    let trip_currency = config
        .currencies
        .first()
        .cloned()
        .unwrap_or_else(|| CurrencyCode::new("EUR"));
    let mut trip = Trip::new("generated", trip_currency.clone())
        .with_participants(participants.iter().cloned());

    if participants.is_empty() {
        return trip;
    }

    let min = config.min_cents.max(1);
    let max = config.max_cents.max(min);
    for _ in 0..config.expense_count {
        let payer = participants[rng.gen_range(0..participants.len())].clone();
        let share_count = rng.gen_range(1..=participants.len());
        let sharers: Vec<Participant> = participants
            .choose_multiple(&mut rng, share_count)
            .cloned()
            .collect();
        let currency = config
            .currencies
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| trip_currency.clone());
        let amount = Decimal::new(rng.gen_range(min..=max), 2);

        let added = Expense::split_equally(payer, amount, currency, &sharers)
            .map_err(EngineError::from)
            .and_then(|expense| trip.add_expense(expense));
        if let Err(err) = added {
            warn!("skipping generated expense: {}", err);
        }
    }

    trip
}
