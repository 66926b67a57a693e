//! Domain models for Finch

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Format a signed minor-unit amount as a decimal string ("-80.00")
pub fn format_minor(amount_minor: i64) -> String {
    let sign = if amount_minor < 0 { "-" } else { "" };
    let abs = amount_minor.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// A financial transaction as read from the ledger store
///
/// Immutable once recorded. Amounts are signed minor units (cents):
/// negative = expense, positive = income.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: String,
    pub date: NaiveDate,
    /// Signed minor units: negative = expense, positive = income
    pub amount_minor: i64,
    pub category: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A new transaction before insertion into the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub amount_minor: i64,
    pub category: String,
    pub description: String,
}

/// An inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Number of days covered, inclusive of both endpoints
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Supported aggregation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationKind {
    Sum,
    Count,
    Average,
    Trend,
}

impl AggregationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Average => "average",
            Self::Trend => "trend",
        }
    }
}

impl std::str::FromStr for AggregationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "count" => Ok(Self::Count),
            "average" | "avg" => Ok(Self::Average),
            "trend" => Ok(Self::Trend),
            _ => Err(format!("Unknown aggregation kind: {}", s)),
        }
    }
}

impl std::fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized, machine-checkable representation of a financial question
///
/// Created per question, discarded after use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredQuery {
    pub user_id: String,
    pub range: TimeRange,
    /// Category filter; None aggregates the whole ledger
    pub categories: Option<Vec<String>>,
    pub kind: AggregationKind,
}

impl StructuredQuery {
    /// Cache fingerprint over the normalized query and the user's ledger
    /// version, so cached results go stale the moment new transactions land
    pub fn fingerprint(&self, ledger_version: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.user_id.as_bytes());
        hasher.update(self.range.start.to_string().as_bytes());
        hasher.update(self.range.end.to_string().as_bytes());
        if let Some(cats) = &self.categories {
            let mut sorted = cats.clone();
            sorted.sort();
            for cat in sorted {
                hasher.update(cat.to_lowercase().as_bytes());
            }
        }
        hasher.update(self.kind.as_str().as_bytes());
        hasher.update(ledger_version.to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Bucket width for trend aggregations, chosen from the range length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendBucket {
    Daily,
    Monthly,
    Yearly,
}

impl TrendBucket {
    /// Fixed bucket table: up to 31 days daily, up to 365 monthly, else yearly
    pub fn for_range(range: &TimeRange) -> Self {
        let days = range.days();
        if days <= 31 {
            Self::Daily
        } else if days <= 365 {
            Self::Monthly
        } else {
            Self::Yearly
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

/// A single point in a trend aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Bucket label: "2024-03-01" (daily), "2024-03" (monthly), "2024" (yearly)
    pub label: String,
    pub total_minor: i64,
}

/// Per-category totals within an aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total_minor: i64,
    pub count: i64,
}

/// The computed value of an aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregationValue {
    Sum { total_minor: i64 },
    Count { count: i64 },
    Average { mean_minor: i64 },
    Trend { bucket: TrendBucket, points: Vec<TrendPoint> },
    /// Empty result set for kinds that need at least one transaction
    NoData,
}

/// Deterministic aggregation over the ledger for one structured query
///
/// Immutable; derived losslessly from the ledger snapshot at query time.
/// The LLM is never involved in these numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub user_id: String,
    pub range: TimeRange,
    pub categories: Option<Vec<String>>,
    pub kind: AggregationKind,
    /// Currency unit of all amounts ("USD-minor")
    pub unit: String,
    pub value: AggregationValue,
    pub by_category: Vec<CategoryTotal>,
    pub transaction_count: i64,
}

impl AggregationResult {
    pub fn is_no_data(&self) -> bool {
        matches!(self.value, AggregationValue::NoData)
    }

    /// The primary verified figure as a display string (absolute major
    /// units for amounts, plain integer for counts)
    pub fn display_value(&self) -> Option<String> {
        match &self.value {
            AggregationValue::Sum { total_minor } => Some(format_minor(total_minor.abs())),
            AggregationValue::Count { count } => Some(count.to_string()),
            AggregationValue::Average { mean_minor } => Some(format_minor(mean_minor.abs())),
            AggregationValue::Trend { points, .. } => {
                let total: i64 = points.iter().map(|p| p.total_minor).sum();
                Some(format_minor(total.abs()))
            }
            AggregationValue::NoData => None,
        }
    }
}

/// Where the final answer text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    /// Reconciled LLM prose
    Llm,
    /// Templated rendering of the aggregation (gateway unavailable)
    Fallback,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Fallback => "fallback",
        }
    }
}

impl std::str::FromStr for AnswerSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "llm" => Ok(Self::Llm),
            "fallback" => Ok(Self::Fallback),
            _ => Err(format!("Unknown answer source: {}", s)),
        }
    }
}

/// One question/answer round, as persisted in the append-only chat log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatExchange {
    pub id: i64,
    pub user_id: String,
    pub question: String,
    /// StructuredQuery as JSON
    pub structured_query: Option<String>,
    /// AggregationResult as JSON
    pub aggregation: Option<String>,
    /// Raw LLM reply before reconciliation
    pub llm_reply: Option<String>,
    /// Final answer returned to the caller
    pub answer: String,
    /// Whether the reconciler corrected a numeric claim
    pub reconciled: bool,
    pub source: AnswerSource,
    pub created_at: DateTime<Utc>,
}

// ========== Gamification Models ==========

/// The user action an XP event rewards (or penalizes)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ExpenseLogged,
    GoalReached,
    StreakKept,
    BudgetBlown,
    #[serde(untagged)]
    Custom(String),
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ExpenseLogged => "expense_logged",
            Self::GoalReached => "goal_reached",
            Self::StreakKept => "streak_kept",
            Self::BudgetBlown => "budget_blown",
            Self::Custom(s) => s.as_str(),
        }
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "expense_logged" => Self::ExpenseLogged,
            "goal_reached" => Self::GoalReached,
            "streak_kept" => Self::StreakKept,
            "budget_blown" => Self::BudgetBlown,
            other => Self::Custom(other.to_string()),
        })
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An XP event to ingest
///
/// `event_id` is the idempotency key: replaying the same id never
/// double-counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XPEvent {
    pub event_id: String,
    pub user_id: String,
    pub action: ActionKind,
    /// Signed; negative deltas are penalties
    pub xp_delta: i64,
}

/// An XP event after application, as stored in the append-only log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedXPEvent {
    pub event_id: String,
    pub user_id: String,
    pub action: ActionKind,
    /// The delta as requested
    pub xp_delta: i64,
    /// The delta actually applied after clamping total_xp at zero
    pub effective_delta: i64,
    pub created_at: DateTime<Utc>,
}

/// Derived gamification state for one user
///
/// Recomputable by folding the XP event log; the persisted snapshot is a
/// cache, not the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamificationState {
    pub user_id: String,
    pub total_xp: i64,
    pub level: u32,
    pub unlocked: BTreeSet<String>,
}

impl GamificationState {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            total_xp: 0,
            level: 0,
            unlocked: BTreeSet::new(),
        }
    }
}

/// Notification emitted after each successful ingestion
///
/// Ordering is guaranteed within a user (single writer), not across users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChanged {
    pub user_id: String,
    pub state: GamificationState,
}

/// A failed ingestion queued for asynchronous retry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingXPEvent {
    pub id: i64,
    pub event: XPEvent,
    pub error: String,
    pub attempts: i64,
    pub queued_at: DateTime<Utc>,
}

// ========== Gateway Metrics Models ==========

/// A single LLM gateway call record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayMetric {
    pub id: i64,
    pub model: String,
    pub latency_ms: i64,
    pub success: bool,
    pub error_message: Option<String>,
    /// Attempts made, including the successful one
    pub attempts: i64,
    pub created_at: DateTime<Utc>,
}

/// New metric for creation (before DB insertion)
#[derive(Debug, Clone)]
pub struct NewGatewayMetric {
    pub model: String,
    pub latency_ms: i64,
    pub success: bool,
    pub error_message: Option<String>,
    pub attempts: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_minor() {
        assert_eq!(format_minor(8000), "80.00");
        assert_eq!(format_minor(-8000), "-80.00");
        assert_eq!(format_minor(12345), "123.45");
        assert_eq!(format_minor(5), "0.05");
        assert_eq!(format_minor(0), "0.00");
    }

    #[test]
    fn test_time_range_days() {
        let march = TimeRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        );
        assert_eq!(march.days(), 31);
        assert_eq!(TrendBucket::for_range(&march), TrendBucket::Daily);

        let quarter = TimeRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        );
        assert_eq!(TrendBucket::for_range(&quarter), TrendBucket::Monthly);

        let two_years = TimeRange::new(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        );
        assert_eq!(TrendBucket::for_range(&two_years), TrendBucket::Yearly);
    }

    #[test]
    fn test_fingerprint_changes_with_ledger_version() {
        let query = StructuredQuery {
            user_id: "u1".into(),
            range: TimeRange::new(
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            ),
            categories: Some(vec!["Groceries".into()]),
            kind: AggregationKind::Sum,
        };
        assert_eq!(query.fingerprint(1), query.fingerprint(1));
        assert_ne!(query.fingerprint(1), query.fingerprint(2));
    }

    #[test]
    fn test_fingerprint_category_order_insensitive() {
        let base = StructuredQuery {
            user_id: "u1".into(),
            range: TimeRange::new(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            ),
            categories: Some(vec!["A".into(), "B".into()]),
            kind: AggregationKind::Count,
        };
        let flipped = StructuredQuery {
            categories: Some(vec!["B".into(), "A".into()]),
            ..base.clone()
        };
        assert_eq!(base.fingerprint(7), flipped.fingerprint(7));
    }

    #[test]
    fn test_action_kind_round_trip() {
        for s in ["expense_logged", "goal_reached", "streak_kept", "budget_blown"] {
            let kind: ActionKind = s.parse().unwrap();
            assert_eq!(kind.as_str(), s);
        }
        let custom: ActionKind = "referral_bonus".parse().unwrap();
        assert_eq!(custom, ActionKind::Custom("referral_bonus".into()));
    }
}
