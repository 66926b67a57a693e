//! Ledger seeding from CSV
//!
//! Accepts a simple neutral format with headers:
//!
//! ```csv
//! date,amount,category,description
//! 2024-03-01,2000.00,Salary,March salary
//! 2024-03-02,-50.00,Groceries,Weekly shop
//! ```
//!
//! Amounts are major units with an optional sign; they are parsed exactly
//! into signed minor units (no float round-trip).

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::NewTransaction;

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    amount: String,
    category: String,
    #[serde(default)]
    description: String,
}

/// Parse a seed CSV into new transactions
pub fn parse_csv(data: &[u8]) -> Result<Vec<NewTransaction>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut transactions = Vec::new();
    for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        let line = index + 2; // header is line 1

        let date = row
            .date
            .parse::<NaiveDate>()
            .map_err(|_| Error::InvalidData(format!("line {}: bad date \"{}\"", line, row.date)))?;
        let amount_minor = parse_amount(&row.amount)
            .ok_or_else(|| Error::InvalidData(format!("line {}: bad amount \"{}\"", line, row.amount)))?;
        if row.category.is_empty() {
            return Err(Error::InvalidData(format!("line {}: empty category", line)));
        }

        transactions.push(NewTransaction {
            date,
            amount_minor,
            category: row.category,
            description: row.description,
        });
    }

    Ok(transactions)
}

/// Parse a major-unit decimal amount ("-50.00", "$2,000", "12.5") into
/// signed minor units
pub fn parse_amount(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ','))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };

    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || frac.len() > 2 {
        return None;
    }
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let dollars: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let cents: i64 = if frac.is_empty() {
        0
    } else {
        // "5" means 50 cents
        let padded = format!("{:0<2}", frac);
        padded.parse().ok()?
    };

    let minor = dollars.checked_mul(100)?.checked_add(cents)?;
    Some(if negative { -minor } else { minor })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("-50.00"), Some(-5_000));
        assert_eq!(parse_amount("2000"), Some(200_000));
        assert_eq!(parse_amount("$2,000.00"), Some(200_000));
        assert_eq!(parse_amount("12.5"), Some(1_250));
        assert_eq!(parse_amount("+3.07"), Some(307));
        assert_eq!(parse_amount("0.05"), Some(5));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("1.234"), None);
    }

    #[test]
    fn test_parse_csv() {
        let data = b"date,amount,category,description\n\
                     2024-03-01,2000.00,Salary,March salary\n\
                     2024-03-02,-50.00,Groceries,Weekly shop\n";
        let transactions = parse_csv(data).unwrap();

        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0].amount_minor, 200_000);
        assert_eq!(transactions[1].amount_minor, -5_000);
        assert_eq!(transactions[1].category, "Groceries");
    }

    #[test]
    fn test_parse_csv_rejects_bad_rows() {
        let data = b"date,amount,category,description\n\
                     not-a-date,1.00,Misc,x\n";
        assert!(parse_csv(data).is_err());

        let data = b"date,amount,category,description\n\
                     2024-03-01,lots,Misc,x\n";
        assert!(parse_csv(data).is_err());
    }
}
