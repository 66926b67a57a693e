//! Intent resolution - free-text questions to structured queries
//!
//! Turns a question like "How much did I spend on groceries in March 2024?"
//! into a `StructuredQuery`. Resolution is pure: relative time expressions
//! are normalized against a caller-supplied reference date (never the wall
//! clock), and category matching fails closed - an unmatched category
//! phrase yields `Unresolvable`, never a guess.

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;

use crate::error::{Error, Result, UnresolvableReason};
use crate::models::{AggregationKind, StructuredQuery, TimeRange};

/// Synonym table mapping question phrases to candidate ledger categories.
/// A synonym only resolves to categories actually present in the user's
/// ledger; a hit with no present target is an unknown category.
const CATEGORY_SYNONYMS: &[(&str, &[&str])] = &[
    ("groceries", &["Groceries"]),
    ("grocery", &["Groceries"]),
    ("supermarket", &["Groceries"]),
    ("food", &["Groceries", "Restaurants", "Dining"]),
    ("dining", &["Dining", "Restaurants"]),
    ("eating out", &["Restaurants", "Dining"]),
    ("restaurant", &["Restaurants", "Dining"]),
    ("restaurants", &["Restaurants", "Dining"]),
    ("rent", &["Rent", "Housing"]),
    ("housing", &["Housing", "Rent"]),
    ("utilities", &["Utilities"]),
    ("bills", &["Utilities"]),
    ("transport", &["Transport", "Transportation"]),
    ("transportation", &["Transportation", "Transport"]),
    ("commute", &["Transport", "Transportation"]),
    ("gas", &["Gas", "Transport", "Transportation"]),
    ("fuel", &["Gas", "Transport", "Transportation"]),
    ("entertainment", &["Entertainment"]),
    ("fun", &["Entertainment"]),
    ("subscription", &["Subscriptions"]),
    ("subscriptions", &["Subscriptions"]),
    ("streaming", &["Subscriptions", "Entertainment"]),
    ("salary", &["Salary", "Income"]),
    ("paycheck", &["Salary", "Income"]),
    ("income", &["Salary", "Income"]),
    ("shopping", &["Shopping"]),
    ("clothes", &["Clothing", "Shopping"]),
    ("clothing", &["Clothing", "Shopping"]),
    ("travel", &["Travel"]),
    ("health", &["Health", "Healthcare"]),
    ("medical", &["Health", "Healthcare"]),
];

/// Words that look like the object of "on ..."/"for ..." but are part of an
/// aggregation or time phrase, not a category mention
const CATEGORY_STOPWORDS: &[&str] = &[
    "average", "time", "total", "month", "week", "year", "day", "days",
];

/// Resolves free-text questions into structured queries
pub struct IntentResolver {
    month_year: Regex,
    bare_year: Regex,
    last_n_days: Regex,
    preposition_object: Regex,
}

impl IntentResolver {
    pub fn new() -> Result<Self> {
        Ok(Self {
            month_year: Regex::new(
                r"\b(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)\s+(\d{4})\b",
            )?,
            bare_year: Regex::new(r"\b((?:19|20)\d{2})\b")?,
            last_n_days: Regex::new(r"\b(?:last|past)\s+(\d{1,3})\s+days\b")?,
            preposition_object: Regex::new(
                r"\b(?:on|for)\s+([a-z][a-z ]{0,30}?)(?:\s+(?:in|during|over|between|since|last|this|per)\b|$)",
            )?,
        })
    }

    /// Resolve a question into a structured query
    ///
    /// `now` is the caller's current-time reference for relative expressions.
    /// `known_categories` are the categories present in the user's ledger.
    pub fn resolve(
        &self,
        question: &str,
        user_id: &str,
        now: NaiveDate,
        known_categories: &[String],
    ) -> Result<StructuredQuery> {
        let normalized = normalize(question);

        let kind = self.detect_aggregation(&normalized)?;
        let range = self.detect_time_range(&normalized, now)?;
        let categories = self.detect_categories(&normalized, known_categories)?;

        Ok(StructuredQuery {
            user_id: user_id.to_string(),
            range,
            categories,
            kind,
        })
    }

    fn detect_aggregation(&self, normalized: &str) -> Result<AggregationKind> {
        // Trend before average ("spending over time"), count before sum
        // ("how many times did I spend")
        if contains_any(normalized, &["trend", "over time", "by month", "by week", "month over month"]) {
            return Ok(AggregationKind::Trend);
        }
        if contains_any(normalized, &["average", "typically", "typical", "avg"]) {
            return Ok(AggregationKind::Average);
        }
        if contains_any(normalized, &["how many", "how often", "number of", "count"]) {
            return Ok(AggregationKind::Count);
        }
        if contains_any(
            normalized,
            &[
                "how much", "total", "spend", "spent", "spending", "cost", "costs", "earn",
                "earned", "income", "paid", "pay",
            ],
        ) {
            return Ok(AggregationKind::Sum);
        }

        Err(Error::unresolvable(
            UnresolvableReason::UnsupportedAggregation,
            "I can total, count, average, or trend your transactions - try asking \
             e.g. \"how much did I spend last month?\"",
        ))
    }

    fn detect_time_range(&self, normalized: &str, now: NaiveDate) -> Result<TimeRange> {
        if normalized.contains("last month") {
            let (year, month) = previous_month(now.year(), now.month());
            return month_range(year, month);
        }
        if normalized.contains("this month") || normalized.contains("current month") {
            return month_range(now.year(), now.month());
        }
        if normalized.contains("last week") {
            return Ok(week_range(now - Duration::days(7)));
        }
        if normalized.contains("this week") {
            return Ok(week_range(now));
        }
        if normalized.contains("last year") {
            return year_range(now.year() - 1);
        }
        if normalized.contains("this year") {
            return year_range(now.year());
        }
        if normalized.contains("yesterday") {
            let day = now - Duration::days(1);
            return Ok(TimeRange::new(day, day));
        }
        if normalized.contains("today") {
            return Ok(TimeRange::new(now, now));
        }
        if let Some(caps) = self.last_n_days.captures(normalized) {
            let n: i64 = caps[1]
                .parse()
                .map_err(|_| Error::InvalidData("day count out of range".into()))?;
            if n == 0 {
                return Err(Error::unresolvable(
                    UnresolvableReason::AmbiguousTimeRange,
                    "\"last 0 days\" is an empty period",
                ));
            }
            return Ok(TimeRange::new(now - Duration::days(n - 1), now));
        }
        if let Some(caps) = self.month_year.captures(normalized) {
            let month = month_number(&caps[1]);
            let year: i32 = caps[2]
                .parse()
                .map_err(|_| Error::InvalidData("year out of range".into()))?;
            return month_range(year, month);
        }
        if let Some(caps) = self.bare_year.captures(normalized) {
            let year: i32 = caps[1]
                .parse()
                .map_err(|_| Error::InvalidData("year out of range".into()))?;
            return year_range(year);
        }

        Err(Error::unresolvable(
            UnresolvableReason::AmbiguousTimeRange,
            "I couldn't tell which time period you mean - try \"last month\", \
             \"this year\", or a month like \"March 2024\"",
        ))
    }

    /// Find category filters. Fail closed: a phrase that looks like a
    /// category but matches nothing in the ledger is an error, never a guess.
    fn detect_categories(
        &self,
        normalized: &str,
        known_categories: &[String],
    ) -> Result<Option<Vec<String>>> {
        let mut matched: Vec<String> = Vec::new();
        let mut unmatched_mention: Option<String> = None;

        // Direct mentions of ledger categories
        for category in known_categories {
            if contains_phrase(normalized, &normalize(category)) {
                push_unique(&mut matched, category);
            }
        }

        // Synonyms, resolved against the ledger only
        for (synonym, targets) in CATEGORY_SYNONYMS {
            if !contains_phrase(normalized, synonym) {
                continue;
            }
            let mut hit = false;
            for target in *targets {
                if let Some(known) = known_categories
                    .iter()
                    .find(|k| k.eq_ignore_ascii_case(target))
                {
                    push_unique(&mut matched, known);
                    hit = true;
                }
            }
            // The synonym itself may name a ledger category directly
            if !hit && !known_categories.iter().any(|k| normalize(k) == *synonym) {
                unmatched_mention.get_or_insert_with(|| synonym.to_string());
            }
        }

        if !matched.is_empty() {
            matched.sort();
            return Ok(Some(matched));
        }

        if let Some(phrase) = unmatched_mention {
            return Err(Error::unresolvable(
                UnresolvableReason::UnknownCategory,
                format!("no spending category in your ledger matches \"{}\"", phrase),
            ));
        }

        // "spent on <something>" where <something> matched nothing at all
        if let Some(caps) = self.preposition_object.captures(normalized) {
            let phrase = caps[1].trim().to_string();
            if !phrase.is_empty() && !CATEGORY_STOPWORDS.contains(&phrase.as_str()) {
                return Err(Error::unresolvable(
                    UnresolvableReason::UnknownCategory,
                    format!("no spending category in your ledger matches \"{}\"", phrase),
                ));
            }
        }

        // No category filter: aggregate the whole ledger
        Ok(None)
    }
}

/// Lowercase, strip punctuation, collapse whitespace
fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Word-boundary phrase containment over normalized text
fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    let padded = format!(" {} ", normalized);
    padded.contains(&format!(" {} ", phrase))
}

fn contains_any(normalized: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| contains_phrase(normalized, p))
}

fn push_unique(matched: &mut Vec<String>, category: &str) {
    if !matched.iter().any(|m| m == category) {
        matched.push(category.to_string());
    }
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn month_range(year: i32, month: u32) -> Result<TimeRange> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::InvalidData(format!("invalid month {}-{}", year, month)))?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .ok_or_else(|| Error::InvalidData(format!("invalid month {}-{}", year, month)))?
        - Duration::days(1);
    Ok(TimeRange::new(start, end))
}

fn year_range(year: i32) -> Result<TimeRange> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| Error::InvalidData(format!("invalid year {}", year)))?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31)
        .ok_or_else(|| Error::InvalidData(format!("invalid year {}", year)))?;
    Ok(TimeRange::new(start, end))
}

/// Monday-to-Sunday week containing `date`
fn week_range(date: NaiveDate) -> TimeRange {
    let start = date - Duration::days(date.weekday().num_days_from_monday() as i64);
    TimeRange::new(start, start + Duration::days(6))
}

fn month_number(name: &str) -> u32 {
    match name {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sept" | "sep" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => 0,
    }
}
