//! Sample Transaction Generator
//!
//! Writes synthetic raw transactions as JSON lines to stdout, ready for
//! `fraud-scoring ingest`.
//!
//! Usage: sample-transactions [count] [fraud_rate]

use anyhow::bail;
use fraud_scoring::{RawAmount, RawTransaction};
use rand::Rng;
use std::io::{BufWriter, Write};
use tracing::info;

/// Transaction generator for testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Generate a random legitimate transaction
    fn generate_legitimate(&mut self) -> RawTransaction {
        let amount: f64 = self.rng.gen_range(5.0..400.0);
        let (merchant, category) = self.random_choice(&[
            ("Corner Grocery", "groceries"),
            ("City Diner", "restaurants"),
            ("Fuel Stop", "gas"),
            ("Main St Pharmacy", "health"),
            ("Book Nook", "retail"),
        ]);

        RawTransaction {
            // Some clients send amounts as strings
            amount: Some(if self.rng.gen_bool(0.2) {
                RawAmount::Text(format!("{:.2}", amount))
            } else {
                RawAmount::Number((amount * 100.0).round() / 100.0)
            }),
            merchant: merchant.to_string(),
            category: category.to_string(),
            description: format!("Purchase at {}", merchant),
            location: self
                .random_choice(&["New York, US", "Austin, US", "Toronto, CA", "London, UK"])
                .to_string(),
            card_type: self.random_choice(&["visa", "mastercard", "debit"]).to_string(),
        }
    }

    /// Generate a suspicious transaction
    fn generate_suspicious(&mut self) -> RawTransaction {
        let amount: f64 = self.rng.gen_range(1000.0..10000.0);
        let (merchant, category) = self.random_choice(&[
            ("Lux Electronics", "electronics"),
            ("Gift Card Hub", "gift_cards"),
            ("Wire Express", "money_transfer"),
        ]);

        RawTransaction {
            amount: Some(RawAmount::Number((amount * 100.0).round() / 100.0)),
            merchant: merchant.to_string(),
            category: category.to_string(),
            description: "Online order".to_string(),
            location: self
                .random_choice(&["Foreign - Lagos", "Foreign - Minsk", "Miami, US"])
                .to_string(),
            card_type: self.random_choice(&["visa", "amex", "prepaid"]).to_string(),
        }
    }

    fn random_choice<T: Copy>(&mut self, choices: &[T]) -> T {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_transactions=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let count: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate: f64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(0.1);

    if !(0.0..=1.0).contains(&fraud_rate) {
        bail!("fraud_rate must be between 0 and 1, got {}", fraud_rate);
    }

    info!(count = count, fraud_rate = fraud_rate, "Generating transactions");

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();
    let mut out = BufWriter::new(std::io::stdout().lock());

    let mut legitimate_count = 0;
    let mut suspicious_count = 0;

    for _ in 0..count {
        let transaction = if rng.gen_bool(fraud_rate) {
            suspicious_count += 1;
            generator.generate_suspicious()
        } else {
            legitimate_count += 1;
            generator.generate_legitimate()
        };

        serde_json::to_writer(&mut out, &transaction)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    info!(
        "Completed! Wrote {} transactions ({} legitimate, {} suspicious)",
        count, legitimate_count, suspicious_count
    );

    Ok(())
}
