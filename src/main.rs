//! settlement-engine CLI
//!
//! Compute balances and settlement plans for a trip from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Show each participant's balance
//! settlement-engine balances --input trip.json
//!
//! # Show who pays whom, as JSON
//! settlement-engine settle --input trip.json --format json
//!
//! # Generate a random trip for testing
//! settlement-engine generate --participants 8 --expenses 40
//! ```
//!
//! Set `RUST_LOG=debug` for pipeline logging.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use settlement_engine::core::config::EngineConfig;
use settlement_engine::core::currency::{round_money_dp, CurrencyCode};
use settlement_engine::core::expense::{Expense, Split};
use settlement_engine::core::ledger::Balances;
use settlement_engine::core::participant::Participant;
use settlement_engine::core::payment::SettlementPayment;
use settlement_engine::fx::cache::CachedRateProvider;
use settlement_engine::fx::rates::FxRateTable;
use settlement_engine::optimization::settlement::SettlementOptimizer;
use settlement_engine::optimization::summary::SettlementSummary;
use settlement_engine::recording::store::InMemoryPaymentStore;
use settlement_engine::simulation::trip_generator::{generate_random_trip, TripConfig};
use settlement_engine::trip::Trip;
use std::collections::BTreeMap;
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"settlement-engine: shared-expense balances and minimal settlement plans

USAGE:
    settlement-engine <COMMAND> [OPTIONS]

COMMANDS:
    balances    Show each participant's net balance
    settle      Compute the fewest payments that settle the trip
    generate    Generate a random trip (for testing)
    help        Show this message

OPTIONS (balances, settle):
    --input <FILE>      Path to JSON trip file
    --format <FORMAT>   Output format: text (default) or json
    --config <FILE>     Path to JSON engine config

OPTIONS (generate):
    --participants <N>  Number of participants (default: 6)
    --expenses <N>      Number of expenses (default: 20)
    --currency <CODE>   Trip currency (default: EUR)
    --seed <N>          Seed for a reproducible trip
    --output <FILE>     Write to file instead of stdout

EXAMPLES:
    settlement-engine balances --input trip.json
    settlement-engine settle --input trip.json --format json
    settlement-engine generate --participants 8 --expenses 40 --seed 7"#
    );
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// JSON schema for an input expense.
///
/// Either `shares` (explicit amounts) or `split_among` (equal split) is used;
/// with neither, the expense is split equally across the whole roster.
#[derive(serde::Deserialize, serde::Serialize)]
struct ExpenseInput {
    payer: String,
    amount: String,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    split_among: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shares: Option<BTreeMap<String, String>>,
}

#[derive(serde::Deserialize)]
struct PaymentInput {
    from: String,
    to: String,
    amount: String,
    date: NaiveDate,
}

#[derive(serde::Deserialize)]
struct RateInput {
    from: String,
    to: String,
    rate: String,
}

#[derive(serde::Deserialize)]
struct TripFile {
    #[serde(default = "default_trip_name")]
    name: String,
    #[serde(default = "default_currency")]
    currency: String,
    participants: Vec<String>,
    #[serde(default)]
    expenses: Vec<ExpenseInput>,
    #[serde(default)]
    payments: Vec<PaymentInput>,
    #[serde(default)]
    rates: Vec<RateInput>,
}

fn default_trip_name() -> String {
    "trip".to_string()
}

fn default_currency() -> String {
    "EUR".to_string()
}

/// JSON output schema for balances and plans.
#[derive(serde::Serialize)]
struct TripOutput {
    trip: String,
    currency: String,
    balances: Vec<BalanceOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    settlements: Option<Vec<SettlementOutput>>,
}

#[derive(serde::Serialize)]
struct BalanceOutput {
    participant: String,
    balance: String,
    status: String,
}

#[derive(serde::Serialize)]
struct SettlementOutput {
    from: String,
    to: String,
    amount: String,
}

fn parse_amount(raw: &str) -> Decimal {
    raw.parse()
        .unwrap_or_else(|e| fail(format!("invalid amount '{}': {}", raw, e)))
}

struct LoadedTrip {
    trip: Trip,
    payments: Vec<SettlementPayment>,
    rates: FxRateTable,
}

fn load_trip(path: &str) -> LoadedTrip {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("reading file '{}': {}", path, e)));

    let file: TripFile = serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "currency": "EUR",
  "participants": ["Ana", "Ben"],
  "expenses": [ {{ "payer": "Ana", "amount": "42.50", "split_among": ["Ana", "Ben"] }} ],
  "payments": [ {{ "from": "Ben", "to": "Ana", "amount": "10", "date": "2024-05-01" }} ],
  "rates": [ {{ "from": "CHF", "to": "EUR", "rate": "1.05" }} ]
}}"#
        );
        fail(format!("parsing JSON: {}", e))
    });

    let currency = CurrencyCode::new(&file.currency);
    let roster: Vec<Participant> = file.participants.iter().map(Participant::new).collect();
    let mut trip = Trip::new(&file.name, currency.clone()).with_participants(roster.iter().cloned());

    for input in file.expenses {
        let payer = Participant::new(&input.payer);
        let amount = parse_amount(&input.amount);
        let expense_currency = input
            .currency
            .as_deref()
            .map(CurrencyCode::new)
            .unwrap_or_else(|| currency.clone());

        let expense = match (input.shares, input.split_among) {
            (Some(shares), _) => {
                let splits = shares
                    .iter()
                    .map(|(name, share)| Split::new(Participant::new(name), parse_amount(share)))
                    .collect();
                Expense::new(payer, amount, expense_currency, splits)
            }
            (None, Some(names)) => {
                let sharers: Vec<Participant> = names.iter().map(Participant::new).collect();
                Expense::split_equally(payer, amount, expense_currency, &sharers)
            }
            (None, None) => Expense::split_equally(payer, amount, expense_currency, &roster),
        }
        .unwrap_or_else(|e| fail(format!("expense paid by {}: {}", input.payer, e)));

        let expense = match input.description {
            Some(description) => expense.with_description(description),
            None => expense,
        };
        trip.add_expense(expense).unwrap_or_else(|e| fail(e));
    }

    let mut rates = FxRateTable::new();
    for rate in file.rates {
        rates
            .set_rate(
                CurrencyCode::new(&rate.from),
                CurrencyCode::new(&rate.to),
                parse_amount(&rate.rate),
            )
            .unwrap_or_else(|e| fail(e));
    }

    let mut recorder = trip.recorder(InMemoryPaymentStore::new());
    for payment in file.payments {
        recorder
            .record_payment(
                &Participant::new(&payment.from),
                &Participant::new(&payment.to),
                parse_amount(&payment.amount),
                payment.date,
            )
            .unwrap_or_else(|e| fail(e));
    }
    let payments = recorder.payments().unwrap_or_else(|e| fail(e));

    LoadedTrip {
        trip,
        payments,
        rates,
    }
}

struct ReportArgs {
    input: String,
    json: bool,
    config: EngineConfig,
}

fn parse_report_args(args: &[String]) -> ReportArgs {
    let mut input_path = None;
    let mut format = "text".to_string();
    let mut config = EngineConfig::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(
                    args.get(i)
                        .cloned()
                        .unwrap_or_else(|| fail("--input requires a file path")),
                );
            }
            "--format" => {
                i += 1;
                format = args
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| fail("--format requires 'text' or 'json'"));
            }
            "--config" => {
                i += 1;
                let path = args
                    .get(i)
                    .unwrap_or_else(|| fail("--config requires a file path"));
                config = EngineConfig::from_json_file(path).unwrap_or_else(|e| fail(e));
            }
            other => fail(format!("unknown option: {}", other)),
        }
        i += 1;
    }

    ReportArgs {
        input: input_path.unwrap_or_else(|| fail("--input <FILE> is required")),
        json: parse_format(&format).unwrap_or_else(|e| fail(e)),
        config,
    }
}

/// Whether `--format` asks for JSON output. Anything but `text` or `json` is an error.
fn parse_format(format: &str) -> Result<bool, String> {
    match format {
        "text" => Ok(false),
        "json" => Ok(true),
        other => Err(format!("unknown format '{}': expected 'text' or 'json'", other)),
    }
}

fn balance_outputs(balances: &Balances, config: &EngineConfig) -> Vec<BalanceOutput> {
    balances
        .iter()
        .map(|(participant, balance)| BalanceOutput {
            participant: participant.to_string(),
            balance: round_money_dp(balance, config.display_dp).to_string(),
            status: if balance >= config.tolerance {
                "CREDITOR".to_string()
            } else if balance <= -config.tolerance {
                "DEBTOR".to_string()
            } else {
                "SETTLED".to_string()
            },
        })
        .collect()
}

fn print_json<T: serde::Serialize>(value: &T) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| fail(format!("serializing output: {}", e)));
    println!("{}", json);
}

fn cmd_balances(args: &[String]) {
    let args = parse_report_args(args);
    let loaded = load_trip(&args.input);
    let provider = CachedRateProvider::from_config(loaded.rates, &args.config);

    let balances = loaded
        .trip
        .balances(&loaded.payments, &provider)
        .unwrap_or_else(|e| fail(format!("cannot compute balances: {}", e)));

    if args.json {
        print_json(&TripOutput {
            trip: loaded.trip.name().to_string(),
            currency: loaded.trip.currency().to_string(),
            balances: balance_outputs(&balances, &args.config),
            settlements: None,
        });
    } else {
        println!(
            "=== Balances: {} ({}) ===",
            loaded.trip.name(),
            loaded.trip.currency()
        );
        print!("{}", balances);
    }
}

fn cmd_settle(args: &[String]) {
    let args = parse_report_args(args);
    let loaded = load_trip(&args.input);
    let provider = CachedRateProvider::from_config(loaded.rates, &args.config);
    let optimizer = SettlementOptimizer::from_config(&args.config);

    let balances = loaded
        .trip
        .balances(&loaded.payments, &provider)
        .unwrap_or_else(|e| fail(format!("cannot compute balances: {}", e)));
    let plan = optimizer
        .calculate_optimized_settlements(&balances)
        .unwrap_or_else(|e| fail(format!("can't settle: {}", e)));

    if args.json {
        print_json(&TripOutput {
            trip: loaded.trip.name().to_string(),
            currency: loaded.trip.currency().to_string(),
            balances: balance_outputs(&balances, &args.config),
            settlements: Some(
                plan.settlements()
                    .iter()
                    .map(|s| SettlementOutput {
                        from: s.from.to_string(),
                        to: s.to.to_string(),
                        amount: round_money_dp(s.amount, args.config.display_dp).to_string(),
                    })
                    .collect(),
            ),
        });
    } else {
        println!(
            "=== Settlement Plan: {} ({}) ===",
            loaded.trip.name(),
            loaded.trip.currency()
        );
        print!("{}", plan);
        println!();
        let summary = SettlementSummary::from_plan(&plan, &balances, optimizer.tolerance());
        println!("{}", summary);
    }
}

fn cmd_generate(args: &[String]) {
    let mut config = TripConfig::default();
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--participants" => {
                i += 1;
                config.participant_count = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| fail("--participants requires a number"));
            }
            "--expenses" => {
                i += 1;
                config.expense_count = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| fail("--expenses requires a number"));
            }
            "--currency" => {
                i += 1;
                let code = args
                    .get(i)
                    .unwrap_or_else(|| fail("--currency requires a currency code"));
                config.currencies = vec![CurrencyCode::new(code.trim())];
            }
            "--seed" => {
                i += 1;
                config.seed = Some(
                    args.get(i)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or_else(|| fail("--seed requires a number")),
                );
            }
            "--output" => {
                i += 1;
                output_path = Some(
                    args.get(i)
                        .cloned()
                        .unwrap_or_else(|| fail("--output requires a file path")),
                );
            }
            other => fail(format!("unknown option: {}", other)),
        }
        i += 1;
    }

    let trip = generate_random_trip(&config);

    #[derive(serde::Serialize)]
    struct OutputFile {
        name: String,
        currency: String,
        participants: Vec<String>,
        expenses: Vec<ExpenseInput>,
    }

    let output = OutputFile {
        name: trip.name().to_string(),
        currency: trip.currency().to_string(),
        participants: trip.participants().map(|p| p.to_string()).collect(),
        expenses: trip
            .expenses()
            .iter()
            .map(|ex| ExpenseInput {
                payer: ex.payer().to_string(),
                amount: ex.amount().to_string(),
                currency: Some(ex.currency().to_string()),
                description: None,
                split_among: None,
                shares: Some(
                    ex.splits()
                        .iter()
                        .map(|s| (s.participant.to_string(), s.share.to_string()))
                        .collect(),
                ),
            })
            .collect(),
    };

    let json = serde_json::to_string_pretty(&output)
        .unwrap_or_else(|e| fail(format!("serializing output: {}", e)));

    if let Some(path) = output_path {
        fs::write(&path, &json).unwrap_or_else(|e| fail(format!("writing '{}': {}", path, e)));
        eprintln!(
            "Generated {} expenses across {} participants → {}",
            trip.expenses().len(),
            config.participant_count,
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "balances" => cmd_balances(rest),
        "settle" => cmd_settle(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
