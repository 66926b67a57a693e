//! Prompt composition
//!
//! Builds the grounded prompt for the LLM from a structured query and its
//! computed aggregation. The prompt embeds the exact verified figures with
//! their provenance (range, filters, transaction count) and nothing else:
//! raw transaction rows never reach the model. Pure function, no I/O.

use std::fmt::Write;

use crate::models::{
    format_minor, AggregationKind, AggregationResult, AggregationValue, StructuredQuery,
};

/// Breakdown entries included in the prompt before truncation
const MAX_CATEGORY_LINES: usize = 8;

/// Trend points included in the prompt before truncation
const MAX_TREND_LINES: usize = 24;

/// A composed system + user prompt pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub system: String,
    pub user: String,
}

/// Compose a grounded prompt from a query and its aggregation result
pub fn compose(query: &StructuredQuery, result: &AggregationResult) -> ComposedPrompt {
    let system = "You are a personal finance assistant. Answer the user's question in one \
                  or two friendly sentences using ONLY the verified figures provided. \
                  Repeat the figures exactly as given; never invent, estimate, or adjust \
                  any number."
        .to_string();

    let mut user = String::new();
    let _ = writeln!(user, "Question: {}", sanitize(&query.user_question_hint()));
    let _ = writeln!(user);
    let _ = writeln!(user, "Verified figures (computed from the ledger):");
    let _ = writeln!(user, "- period: {}", result.range);
    match &result.categories {
        Some(cats) => {
            let _ = writeln!(user, "- categories: {}", cats.join(", "));
        }
        None => {
            let _ = writeln!(user, "- categories: all");
        }
    }
    let _ = writeln!(user, "- transactions considered: {}", result.transaction_count);

    match &result.value {
        AggregationValue::Sum { total_minor } => {
            let direction = if *total_minor < 0 { "spent" } else { "net income" };
            let _ = writeln!(
                user,
                "- total ({}): {} (exact)",
                direction,
                format_minor(total_minor.abs())
            );
        }
        AggregationValue::Count { count } => {
            let _ = writeln!(user, "- transaction count: {} (exact)", count);
        }
        AggregationValue::Average { mean_minor } => {
            let direction = if *mean_minor < 0 { "spent" } else { "received" };
            let _ = writeln!(
                user,
                "- average per transaction ({}): {} (exact)",
                direction,
                format_minor(mean_minor.abs())
            );
        }
        AggregationValue::Trend { bucket, points } => {
            let _ = writeln!(user, "- trend ({} buckets):", bucket.as_str());
            for point in points.iter().take(MAX_TREND_LINES) {
                let _ = writeln!(user, "    {}: {}", point.label, format_minor(point.total_minor));
            }
            if points.len() > MAX_TREND_LINES {
                let _ = writeln!(user, "    ({} more buckets omitted)", points.len() - MAX_TREND_LINES);
            }
        }
        AggregationValue::NoData => {
            let _ = writeln!(user, "- no transactions found in this period");
        }
    }

    if !result.by_category.is_empty() && result.categories.is_none() {
        let _ = writeln!(user, "- by category:");
        for entry in result.by_category.iter().take(MAX_CATEGORY_LINES) {
            let _ = writeln!(
                user,
                "    {}: {} ({} transactions)",
                entry.category,
                format_minor(entry.total_minor),
                entry.count
            );
        }
    }

    let _ = writeln!(user);
    let _ = write!(
        user,
        "Answer the question using only these figures. If no transactions were found, \
         say so plainly."
    );

    ComposedPrompt { system, user }
}

/// Keep the question single-line and bounded
fn sanitize(question: &str) -> String {
    let single_line = question.replace(['\n', '\r'], " ");
    let trimmed = single_line.trim();
    if trimmed.len() > 300 {
        format!("{}...", &trimmed[..300])
    } else {
        trimmed.to_string()
    }
}

impl StructuredQuery {
    /// Rendered restatement of the query for the prompt, used instead of the
    /// raw question so prompt size stays bounded and predictable
    pub fn user_question_hint(&self) -> String {
        let what = match self.kind {
            AggregationKind::Sum => "total",
            AggregationKind::Count => "number of transactions",
            AggregationKind::Average => "average per transaction",
            AggregationKind::Trend => "trend over time",
        };
        match &self.categories {
            Some(cats) => format!("{} for {} between {}", what, cats.join(", "), self.range),
            None => format!("{} across all categories between {}", what, self.range),
        }
    }
}
