//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `cmd_init` - Initialize the database
//! - `cmd_seed` - Seed a user's ledger from CSV

use std::path::Path;

use anyhow::{Context, Result};
use finch_core::db::Database;
use finch_core::import::parse_csv;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path.to_string_lossy();
    if no_encrypt {
        Database::new_unencrypted(&path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(&path_str).context("Failed to open database")
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let _db = open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Seed a ledger: finch seed --file transactions.csv --user alice");
    println!("  2. Ask a question: finch ask --user alice \"How much did I spend last month?\"");
    println!("  3. Start the API: finch serve");

    Ok(())
}

pub fn cmd_seed(db_path: &Path, file: &Path, user: &str, no_encrypt: bool) -> Result<()> {
    println!("📥 Seeding ledger for {} from {}...", user, file.display());

    let db = open_db(db_path, no_encrypt)?;
    db.ensure_user(user, None).context("Failed to create user")?;

    let data = std::fs::read(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let transactions = parse_csv(&data).context("Failed to parse CSV")?;

    let count = db
        .insert_transactions(user, &transactions)
        .context("Failed to insert transactions")?;

    println!("✅ Imported {} transactions", count);
    let categories = db.known_categories(user)?;
    if !categories.is_empty() {
        println!("   Categories: {}", categories.join(", "));
    }

    Ok(())
}
