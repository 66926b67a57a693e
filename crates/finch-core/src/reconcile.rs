//! Response reconciliation
//!
//! Cross-checks LLM prose against the aggregation it was grounded on. The
//! reply is parsed into a tagged segment list (text vs numeric claims) via a
//! fixed grammar, and every claim is compared against the known-correct
//! values. A claim that matches nothing is overridden in place with the
//! verified figure - the ledger always beats the model. Mismatches are
//! logged, never surfaced as errors.

use chrono::Datelike;
use regex::Regex;
use tracing::warn;

use crate::error::Result;
use crate::models::{format_minor, AggregationResult, AggregationValue};

/// A parsed piece of an LLM reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplySegment {
    Text(String),
    NumericClaim {
        raw: String,
        /// Claim interpreted as minor units (dollars * 100)
        value_minor: i64,
        /// True when the claim is a bare integer (no $ or decimal point),
        /// which may also be a count rather than an amount
        bare_integer: bool,
    },
}

/// A corrected numeric claim
#[derive(Debug, Clone)]
pub struct Mismatch {
    pub claimed: String,
    pub corrected: String,
}

/// Reconciliation outcome
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub answer: String,
    /// True when at least one claim was overridden
    pub reconciled: bool,
    pub mismatches: Vec<Mismatch>,
}

/// Reconciles LLM replies against computed aggregations
pub struct Reconciler {
    grammar: Regex,
}

impl Reconciler {
    pub fn new() -> Result<Self> {
        // Date-like tokens are matched first so "2024-03-01" never parses as
        // the claims 2024 and -3
        Ok(Self {
            grammar: Regex::new(
                r"(?P<date>\d{4}-\d{2}(?:-\d{2})?)|(?P<num>-?\$\s?-?\d[\d,]*(?:\.\d+)?|-?\d[\d,]*(?:\.\d+)?)",
            )?,
        })
    }

    /// Tokenize a reply into text and numeric-claim segments
    pub fn parse_reply(&self, reply: &str) -> Vec<ReplySegment> {
        let mut segments = Vec::new();
        let mut cursor = 0;

        for caps in self.grammar.captures_iter(reply) {
            let Some(m) = caps.get(0) else { continue };
            if m.start() > cursor {
                segments.push(ReplySegment::Text(reply[cursor..m.start()].to_string()));
            }
            cursor = m.end();

            if caps.name("date").is_some() {
                segments.push(ReplySegment::Text(m.as_str().to_string()));
                continue;
            }

            let raw = m.as_str().to_string();
            match parse_claim(&raw) {
                Some((value_minor, bare_integer)) => segments.push(ReplySegment::NumericClaim {
                    raw,
                    value_minor,
                    bare_integer,
                }),
                None => segments.push(ReplySegment::Text(raw)),
            }
        }

        if cursor < reply.len() {
            segments.push(ReplySegment::Text(reply[cursor..].to_string()));
        }
        segments
    }

    /// Compare a reply against the aggregation and override contradictions
    pub fn reconcile(&self, reply: &str, result: &AggregationResult) -> Reconciled {
        let segments = self.parse_reply(reply);
        let has_claims = segments
            .iter()
            .any(|s| matches!(s, ReplySegment::NumericClaim { .. }));

        if !has_claims {
            // Nothing numeric to verify; the reply passes through unchanged
            return Reconciled {
                answer: reply.to_string(),
                reconciled: false,
                mismatches: Vec::new(),
            };
        }

        if result.is_no_data() {
            // The model produced figures for an empty period; none can be
            // trusted
            warn!(user_id = %result.user_id, "Reply claimed figures for a period with no data");
            return Reconciled {
                answer: "I found no transactions for that period.".to_string(),
                reconciled: true,
                mismatches: Vec::new(),
            };
        }

        let expected = Expected::from_result(result);
        let mut answer = String::new();
        let mut mismatches = Vec::new();

        for segment in segments {
            match segment {
                ReplySegment::Text(text) => answer.push_str(&text),
                ReplySegment::NumericClaim {
                    raw,
                    value_minor,
                    bare_integer,
                } => {
                    if expected.matches(value_minor, bare_integer) {
                        answer.push_str(&raw);
                    } else {
                        let corrected = expected.corrected_display(&raw);
                        warn!(
                            user_id = %result.user_id,
                            claimed = %raw,
                            corrected = %corrected,
                            "Reconciliation mismatch: overriding LLM numeric claim"
                        );
                        answer.push_str(&corrected);
                        mismatches.push(Mismatch {
                            claimed: raw,
                            corrected,
                        });
                    }
                }
            }
        }

        Reconciled {
            reconciled: !mismatches.is_empty(),
            answer,
            mismatches,
        }
    }
}

/// Verified values a reply is allowed to state
struct Expected {
    /// Acceptable amounts in minor units (signed and absolute forms)
    minor: Vec<i64>,
    /// Acceptable bare integers (counts, range years)
    integers: Vec<i64>,
    /// Canonical display string for overriding bad claims
    primary: String,
}

impl Expected {
    fn from_result(result: &AggregationResult) -> Self {
        let mut minor = Vec::new();
        let mut integers = vec![
            result.transaction_count,
            i64::from(result.range.start.year()),
            i64::from(result.range.end.year()),
        ];

        match &result.value {
            AggregationValue::Sum { total_minor } => {
                minor.push(*total_minor);
                minor.push(total_minor.abs());
            }
            AggregationValue::Count { count } => integers.push(*count),
            AggregationValue::Average { mean_minor } => {
                minor.push(*mean_minor);
                minor.push(mean_minor.abs());
            }
            AggregationValue::Trend { points, .. } => {
                let mut grand_total = 0;
                for point in points {
                    minor.push(point.total_minor);
                    minor.push(point.total_minor.abs());
                    grand_total += point.total_minor;
                }
                minor.push(grand_total);
                minor.push(grand_total.abs());
            }
            AggregationValue::NoData => {}
        }

        for entry in &result.by_category {
            minor.push(entry.total_minor);
            minor.push(entry.total_minor.abs());
            integers.push(entry.count);
        }

        Self {
            minor,
            integers,
            primary: result.display_value().unwrap_or_default(),
        }
    }

    fn matches(&self, value_minor: i64, bare_integer: bool) -> bool {
        if self.minor.contains(&value_minor) {
            return true;
        }
        // A bare integer may be a count or a year rather than an amount
        bare_integer && value_minor % 100 == 0 && self.integers.contains(&(value_minor / 100))
    }

    /// Replace a bad claim, preserving its dollar-sign prefix if present
    fn corrected_display(&self, raw: &str) -> String {
        if raw.trim_start().starts_with('$') || raw.starts_with("-$") {
            format!("${}", self.primary)
        } else {
            self.primary.clone()
        }
    }
}

/// Parse one claim token: strip $ and commas, scale to minor units
fn parse_claim(raw: &str) -> Option<(i64, bool)> {
    let bare_integer = !raw.contains('$') && !raw.contains('.');
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    // "-$-5" style double negatives are not a claim we can interpret
    if cleaned.matches('-').count() > 1 {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    Some(((value * 100.0).round() as i64, bare_integer))
}
