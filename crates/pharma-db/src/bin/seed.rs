//! # Seed Data Generator
//!
//! Populates a development database with a pharmacy catalogue and two
//! accounts.
//!
//! ## Usage
//! ```bash
//! # Default database, default admin password
//! cargo run -p pharma-db --bin seed
//!
//! # Specify database path and admin password
//! cargo run -p pharma-db --bin seed -- --db ./data/backoffice.db --password s3cret-pass
//! ```
//!
//! ## Generated Data
//! - `admin@pharmacy.local` (admin) and `pharmacist@pharmacy.local`
//!   (pharmacist), both with the given password
//! - Every catalogue entry below in each listed dosage, SKU
//!   `{CODE}-{DOSAGE}`, price and stock derived from the index

use chrono::{SubsecRound, Utc};
use pharma_core::password::hash_password;
use pharma_core::{Product, Role, User};
use pharma_db::{Database, DbConfig};
use std::env;
use uuid::Uuid;

/// (SKU code, name, dosages, prescription required)
const CATALOGUE: &[(&str, &str, &[&str], bool)] = &[
    ("PARA", "Paracetamol", &["500 mg", "1 g"], false),
    ("IBUP", "Ibuprofen", &["200 mg", "400 mg"], false),
    ("ASPI", "Aspirin", &["100 mg", "500 mg"], false),
    ("AMOX", "Amoxicillin", &["500 mg", "1 g"], true),
    ("AZIT", "Azithromycin", &["250 mg", "500 mg"], true),
    ("OMEP", "Omeprazole", &["20 mg", "40 mg"], true),
    ("METF", "Metformin", &["500 mg", "850 mg", "1000 mg"], true),
    ("AMLO", "Amlodipine", &["5 mg", "10 mg"], true),
    ("CETI", "Cetirizine", &["10 mg"], false),
    ("LORA", "Loratadine", &["10 mg"], false),
    ("SALB", "Salbutamol inhaler", &["100 mcg"], true),
    ("VITC", "Vitamin C", &["500 mg", "1 g"], false),
    ("VITD", "Vitamin D3", &["1000 IU"], false),
    ("ORS", "Oral rehydration salts", &["sachet"], false),
    ("DEXT", "Dextromethorphan syrup", &["15 mg/5 ml"], false),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./backoffice_dev.db");
    let mut password = String::from("pharmacy-dev");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--password" | "-p" => {
                if i + 1 < args.len() {
                    password = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Pharmacy Back-Office Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>         Database file (default: ./backoffice_dev.db)");
                println!("  -p, --password <PASS>   Password for the seeded accounts");
                println!("  -h, --help              Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    pharma_core::validation::validate_password(&password)?;

    println!("🌱 Pharmacy Back-Office Seed Data Generator");
    println!("===========================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Accounts
    if db.users().count().await? == 0 {
        let hash = hash_password(&password)?;
        for (name, email, role) in [
            ("Administrator", "admin@pharmacy.local", Role::Admin),
            ("Pharmacist", "pharmacist@pharmacy.local", Role::Pharmacist),
        ] {
            db.users()
                .insert(&make_user(name, email, role, &hash))
                .await?;
            println!("✓ Created {:?} account {}", role, email);
        }
    } else {
        println!("⚠ Users already present, skipping accounts");
    }

    // Products
    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping catalogue to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let mut generated = 0usize;
    for (code, name, dosages, prescription) in CATALOGUE {
        for dosage in dosages.iter() {
            let product = make_product(code, name, dosage, *prescription, generated);

            if let Err(e) = db.products().insert(&product).await {
                eprintln!("Failed to insert {}: {}", product.sku, e);
                continue;
            }
            generated += 1;
        }
    }

    println!("✓ Generated {} products", generated);
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn make_user(name: &str, email: &str, role: Role, password_hash: &str) -> User {
    let now = Utc::now().trunc_subsecs(0);
    User {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        role,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// Builds one catalogue entry; price and stock vary with `seed`.
fn make_product(code: &str, name: &str, dosage: &str, prescription: bool, seed: usize) -> Product {
    let now = Utc::now().trunc_subsecs(0);

    let dosage_key: String = dosage
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase();
    let sku = format!("{}-{}", code, dosage_key);

    // 1.50 - 19.49
    let selling_price_cents = 150 + ((seed * 137) % 1800) as i64;
    // 0 - 120 units
    let stock_quantity = ((seed * 29) % 121) as i64;

    Product {
        id: Uuid::new_v4().to_string(),
        sku,
        name: name.to_string(),
        dosage: Some(dosage.to_string()),
        selling_price_cents,
        stock_quantity,
        prescription_required: prescription,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
