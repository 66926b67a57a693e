//! Transaction aggregation
//!
//! Executes a structured query against the ledger store, producing a
//! deterministic result: the same ledger state and query always yield a
//! bit-identical `AggregationResult`. Results are cached per query
//! fingerprint; the fingerprint includes the user's ledger version, so a
//! cached entry can never outlive a ledger write.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{Datelike, Duration, NaiveDate};
use tracing::debug;

use crate::error::Result;
use crate::ledger::LedgerStore;
use crate::models::{
    AggregationKind, AggregationResult, AggregationValue, CategoryTotal, StructuredQuery,
    TimeRange, Transaction, TrendBucket, TrendPoint,
};

/// Keep the session cache from growing without bound
const MAX_CACHE_ENTRIES: usize = 256;

/// Aggregator over a ledger store, with a session-scoped result cache
pub struct Aggregator<L: LedgerStore> {
    ledger: L,
    cache: RwLock<HashMap<String, AggregationResult>>,
}

impl<L: LedgerStore> Aggregator<L> {
    pub fn new(ledger: L) -> Self {
        Self {
            ledger,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Execute a query, consulting the cache first
    pub fn aggregate(&self, query: &StructuredQuery) -> Result<AggregationResult> {
        let version = self.ledger.ledger_version(&query.user_id)?;
        let key = query.fingerprint(version);

        if let Ok(cache) = self.cache.read() {
            if let Some(hit) = cache.get(&key) {
                debug!(fingerprint = %&key[..12], "Aggregation cache hit");
                return Ok(hit.clone());
            }
        }

        let result = self.compute(query)?;

        if let Ok(mut cache) = self.cache.write() {
            if cache.len() >= MAX_CACHE_ENTRIES {
                cache.clear();
            }
            cache.insert(key, result.clone());
        }

        Ok(result)
    }

    fn compute(&self, query: &StructuredQuery) -> Result<AggregationResult> {
        let transactions = self.ledger.query_transactions(
            &query.user_id,
            &query.range,
            query.categories.as_deref(),
        )?;

        let value = if transactions.is_empty() {
            AggregationValue::NoData
        } else {
            match query.kind {
                AggregationKind::Sum => AggregationValue::Sum {
                    total_minor: transactions.iter().map(|t| t.amount_minor).sum(),
                },
                AggregationKind::Count => AggregationValue::Count {
                    count: transactions.len() as i64,
                },
                AggregationKind::Average => {
                    let total: i64 = transactions.iter().map(|t| t.amount_minor).sum();
                    AggregationValue::Average {
                        mean_minor: (total as f64 / transactions.len() as f64).round() as i64,
                    }
                }
                AggregationKind::Trend => trend_value(&query.range, &transactions),
            }
        };

        Ok(AggregationResult {
            user_id: query.user_id.clone(),
            range: query.range,
            categories: query.categories.clone(),
            kind: query.kind,
            unit: "USD-minor".to_string(),
            value,
            by_category: category_breakdown(&transactions),
            transaction_count: transactions.len() as i64,
        })
    }
}

/// Per-category totals, ordered by magnitude (largest first), ties by name
fn category_breakdown(transactions: &[Transaction]) -> Vec<CategoryTotal> {
    let mut totals: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
    for tx in transactions {
        let entry = totals.entry(tx.category.as_str()).or_insert((0, 0));
        entry.0 += tx.amount_minor;
        entry.1 += 1;
    }

    let mut breakdown: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, (total_minor, count))| CategoryTotal {
            category: category.to_string(),
            total_minor,
            count,
        })
        .collect();

    breakdown.sort_by(|a, b| {
        b.total_minor
            .abs()
            .cmp(&a.total_minor.abs())
            .then_with(|| a.category.cmp(&b.category))
    });
    breakdown
}

/// Bucketed sums over the range; every bucket in the range is emitted, empty
/// ones as zero
fn trend_value(range: &TimeRange, transactions: &[Transaction]) -> AggregationValue {
    let bucket = TrendBucket::for_range(range);

    let mut sums: BTreeMap<String, i64> = BTreeMap::new();
    for label in bucket_labels(range, bucket) {
        sums.insert(label, 0);
    }
    for tx in transactions {
        if let Some(total) = sums.get_mut(&bucket_label(tx.date, bucket)) {
            *total += tx.amount_minor;
        }
    }

    // Labels sort lexicographically in chronological order for all widths
    let points = sums
        .into_iter()
        .map(|(label, total_minor)| TrendPoint { label, total_minor })
        .collect();

    AggregationValue::Trend { bucket, points }
}

fn bucket_label(date: NaiveDate, bucket: TrendBucket) -> String {
    match bucket {
        TrendBucket::Daily => date.to_string(),
        TrendBucket::Monthly => format!("{:04}-{:02}", date.year(), date.month()),
        TrendBucket::Yearly => format!("{:04}", date.year()),
    }
}

fn bucket_labels(range: &TimeRange, bucket: TrendBucket) -> Vec<String> {
    let mut labels = Vec::new();
    match bucket {
        TrendBucket::Daily => {
            let mut day = range.start;
            while day <= range.end {
                labels.push(day.to_string());
                day += Duration::days(1);
            }
        }
        TrendBucket::Monthly => {
            let (mut year, mut month) = (range.start.year(), range.start.month());
            let (end_year, end_month) = (range.end.year(), range.end.month());
            while (year, month) <= (end_year, end_month) {
                labels.push(format!("{:04}-{:02}", year, month));
                if month == 12 {
                    year += 1;
                    month = 1;
                } else {
                    month += 1;
                }
            }
        }
        TrendBucket::Yearly => {
            for year in range.start.year()..=range.end.year() {
                labels.push(format!("{:04}", year));
            }
        }
    }
    labels
}
