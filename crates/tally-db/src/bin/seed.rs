//! # Seed Data Generator
//!
//! Populates a database with demo products and drives their opening stock
//! through the ledger, so every unit on hand has a stock card row.
//!
//! ## Usage
//! ```bash
//! # Seed the configured database
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//!
//! # Use a config file
//! cargo run -p tally-db --bin seed -- --config ./tally.toml
//! ```
//!
//! ## What It Does
//! 1. Registers each demo product at zero stock
//! 2. Receives two purchase orders per product at different unit costs
//! 3. Prices and completes one sales order across all products
//! 4. Audits every product's stock card against its balance

use std::env;
use std::path::PathBuf;

use rust_decimal::Decimal;
use tally_core::{
    Money, OrderKind, OrderLineInput, Percentage, PricingRequest, ProductStock, StockMovement,
};
use tally_db::{Database, LedgerError, TallyConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// `(code, name, first cost, second cost, sell price)` in minor units.
const PRODUCTS: &[(&str, &str, i64, i64, i64)] = &[
    ("KOPI-250", "Kopi Bubuk 250g", 18_000, 21_000, 32_000),
    ("TEH-100", "Teh Celup 100s", 9_500, 9_900, 15_000),
    ("GULA-1K", "Gula Pasir 1kg", 14_200, 14_800, 18_500),
    ("SUSU-1L", "Susu UHT 1L", 16_000, 17_250, 21_000),
    ("MIE-GRG", "Mie Goreng", 2_650, 2_700, 3_500),
];

/// Units received per purchase order.
const RECEIVED: &[i64] = &[40, 25];

/// Units sold per product on the demo sales order.
const SOLD: i64 = 12;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (overrides config)");
                println!("  -c, --config <PATH>    Config file (default: platform config dir)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = TallyConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    println!("Tally Seed Data Generator");
    println!("=========================");
    println!("Database: {}", config.database.path.display());
    println!();

    let db = Database::new(config.db_config()).await?;
    let ledger = db.ledger().with_retry_policy(config.retry_policy());
    let calculator = config.pricing_calculator();

    // Already seeded?
    let (first_code, ..) = PRODUCTS[0];
    match ledger.get_stock(&product_id(first_code)).await {
        Ok(level) => {
            println!("Database already seeded ({} has {} units).", level.code, level.stock);
            println!("Delete the database file to regenerate.");
            return Ok(());
        }
        Err(LedgerError::NotFound { .. }) => {}
        Err(e) => return Err(e.into()),
    }

    // 1. Register
    for (code, name, ..) in PRODUCTS {
        ledger
            .register_product(ProductStock::new(product_id(code), *code, *name))
            .await?;
    }
    println!("Registered {} products", PRODUCTS.len());

    // 2. Receive purchase orders
    for (po, quantity) in RECEIVED.iter().enumerate() {
        let ref_code = format!("PO-{:04}", po + 1);
        let movements: Vec<StockMovement> = PRODUCTS
            .iter()
            .map(|(code, _, first, second, _)| {
                let cost = if po == 0 { *first } else { *second };
                StockMovement::inbound(
                    product_id(code),
                    *quantity,
                    Some(Money::from_minor(cost, 0)),
                    ref_code.clone(),
                )
                .by("seed")
            })
            .collect();

        let results = ledger.apply_movements(&movements).await?;
        info!(ref_code = %ref_code, movements = results.len(), "Received purchase order");
    }

    // 3. Price and complete a sales order
    let mut lines = Vec::with_capacity(PRODUCTS.len());
    for (code, _, _, _, price) in PRODUCTS {
        let level = ledger.get_stock(&product_id(code)).await?;
        lines.push(
            OrderLineInput::new(Decimal::from(SOLD), Money::from_minor(*price, 0))
                .with_cost_price(level.cost_price),
        );
    }

    let mut request = PricingRequest::new(OrderKind::Sales, lines);
    request.vat_rate = Percentage::from_decimal(Decimal::from(11));
    let priced = calculator.calculate(&request)?;

    println!();
    println!("Sales order SO-0001");
    println!("  Subtotal:  {}", priced.totals.subtotal);
    println!("  VAT:       {}", priced.totals.vat_amount);
    println!("  Total:     {}", priced.totals.final_amount);
    if let Some(profit) = priced.totals.total_profit {
        println!("  Profit:    {}", profit);
    }

    let sale: Vec<StockMovement> = PRODUCTS
        .iter()
        .map(|(code, ..)| StockMovement::outbound(product_id(code), SOLD, "SO-0001").by("seed"))
        .collect();
    ledger.apply_movements(&sale).await?;

    // 4. Audit
    println!();
    println!("{:<10} {:>6} {:>14} {:>8}", "Code", "Stock", "Avg Cost", "Audit");
    let mut failures = 0;
    for (code, ..) in PRODUCTS {
        let id = product_id(code);
        let level = ledger.get_stock(&id).await?;
        let report = ledger.audit(&id).await?;
        if !report.consistent {
            failures += 1;
        }
        println!(
            "{:<10} {:>6} {:>14} {:>8}",
            level.code,
            level.stock,
            level.cost_price.to_string(),
            if report.consistent { "ok" } else { "FAILED" }
        );
    }

    println!();
    if failures == 0 {
        println!("Seed complete!");
    } else {
        println!("Seed complete with {} audit failure(s)", failures);
    }

    db.close().await;
    Ok(())
}

/// Deterministic id so reruns detect an existing seed.
fn product_id(code: &str) -> String {
    format!("seed-{}", code.to_lowercase())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tally=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
