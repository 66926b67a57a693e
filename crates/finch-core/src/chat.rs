//! Chat pipeline - question in, grounded answer out
//!
//! Orchestrates the query path: resolve intent, aggregate the ledger,
//! compose a grounded prompt, call the LLM gateway, reconcile the reply.
//! Stateless and request-parallel; the gateway call is the only suspension
//! point, and the path never mutates ledger or gamification state, so
//! cancellation is always clean.
//!
//! When the gateway fails (unreachable, retries exhausted) the pipeline
//! falls back to a templated rendering of the aggregation instead of
//! failing the request.

use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::aggregate::Aggregator;
use crate::ai::Gateway;
use crate::db::{Database, NewChatExchange};
use crate::error::{Error, Result};
use crate::intent::IntentResolver;
use crate::ledger::{LedgerStore, SqliteLedger};
use crate::models::{
    format_minor, AggregationResult, AggregationValue, AnswerSource, NewGatewayMetric,
    StructuredQuery,
};
use crate::prompt::compose;
use crate::reconcile::Reconciler;

/// Trend points listed in a templated fallback answer
const FALLBACK_TREND_LINES: usize = 6;

/// The final product of the query pipeline
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub answer: String,
    pub aggregation: AggregationResult,
    pub reconciled: bool,
    pub source: AnswerSource,
}

/// End-to-end question answering over one database
pub struct ChatPipeline {
    db: Database,
    resolver: IntentResolver,
    aggregator: Aggregator<SqliteLedger>,
    reconciler: Reconciler,
    gateway: Option<Gateway>,
}

impl ChatPipeline {
    pub fn new(db: Database, gateway: Option<Gateway>) -> Result<Self> {
        let aggregator = Aggregator::new(SqliteLedger::new(db.clone()));
        Ok(Self {
            db,
            resolver: IntentResolver::new()?,
            aggregator,
            reconciler: Reconciler::new()?,
            gateway,
        })
    }

    pub fn gateway(&self) -> Option<&Gateway> {
        self.gateway.as_ref()
    }

    /// Answer a question for a user
    ///
    /// `now` is the reference date for relative time expressions; callers
    /// pass the request's current_time or the server clock.
    pub async fn answer(
        &self,
        user_id: &str,
        question: &str,
        now: NaiveDate,
    ) -> Result<ChatOutcome> {
        if !self.aggregator.ledger().user_exists(user_id)? {
            return Err(Error::UnknownUser(user_id.to_string()));
        }

        let known_categories = self.aggregator.ledger().known_categories(user_id)?;
        let query = self
            .resolver
            .resolve(question, user_id, now, &known_categories)?;
        debug!(?query, "Resolved question");

        let result = self.aggregator.aggregate(&query)?;
        let prompt = compose(&query, &result);

        let (answer, reconciled, source, llm_reply) = match &self.gateway {
            Some(gateway) => {
                let started = Instant::now();
                match gateway.ask(&prompt).await {
                    Ok(reply) => {
                        self.record_metric(NewGatewayMetric {
                            model: reply.model.clone(),
                            latency_ms: started.elapsed().as_millis() as i64,
                            success: true,
                            error_message: None,
                            attempts: i64::from(reply.attempts),
                        });
                        let outcome = self.reconciler.reconcile(&reply.text, &result);
                        (
                            outcome.answer,
                            outcome.reconciled,
                            AnswerSource::Llm,
                            Some(reply.text),
                        )
                    }
                    Err(err) => {
                        warn!(error = %err, "Gateway failed; falling back to templated answer");
                        self.record_metric(NewGatewayMetric {
                            model: gateway.model().to_string(),
                            latency_ms: started.elapsed().as_millis() as i64,
                            success: false,
                            error_message: Some(err.to_string()),
                            attempts: i64::from(gateway.max_attempts()),
                        });
                        (fallback_answer(&query, &result), false, AnswerSource::Fallback, None)
                    }
                }
            }
            None => (fallback_answer(&query, &result), false, AnswerSource::Fallback, None),
        };

        self.append_exchange(user_id, question, &query, &result, llm_reply, &answer, reconciled, source);

        Ok(ChatOutcome {
            answer,
            aggregation: result,
            reconciled,
            source,
        })
    }

    /// A failed metric write is logged, never fatal to the request
    fn record_metric(&self, metric: NewGatewayMetric) {
        if let Err(err) = self.db.record_gateway_metric(&metric) {
            warn!(error = %err, "Failed to record gateway metric");
        }
    }

    /// A failed log append is logged, never fatal to the request
    #[allow(clippy::too_many_arguments)]
    fn append_exchange(
        &self,
        user_id: &str,
        question: &str,
        query: &StructuredQuery,
        result: &AggregationResult,
        llm_reply: Option<String>,
        answer: &str,
        reconciled: bool,
        source: AnswerSource,
    ) {
        let exchange = NewChatExchange {
            user_id: user_id.to_string(),
            question: question.to_string(),
            structured_query: serde_json::to_string(query).ok(),
            aggregation: serde_json::to_string(result).ok(),
            llm_reply,
            answer: answer.to_string(),
            reconciled,
            source,
        };
        if let Err(err) = self.db.append_chat_exchange(&exchange) {
            warn!(error = %err, "Failed to append chat exchange");
        }
    }
}

/// Templated, non-LLM rendering of an aggregation result
pub fn fallback_answer(query: &StructuredQuery, result: &AggregationResult) -> String {
    let scope = match &query.categories {
        Some(cats) => format!(" on {}", cats.join(", ")),
        None => String::new(),
    };
    let period = format!("between {} and {}", query.range.start, query.range.end);

    match &result.value {
        AggregationValue::NoData => {
            format!("I found no transactions{} {}.", scope, period)
        }
        AggregationValue::Sum { total_minor } => {
            if *total_minor < 0 {
                format!(
                    "You spent ${}{} {} across {} transactions.",
                    format_minor(total_minor.abs()),
                    scope,
                    period,
                    result.transaction_count
                )
            } else {
                format!(
                    "You took in ${}{} {} across {} transactions.",
                    format_minor(*total_minor),
                    scope,
                    period,
                    result.transaction_count
                )
            }
        }
        AggregationValue::Count { count } => {
            format!("You made {} transactions{} {}.", count, scope, period)
        }
        AggregationValue::Average { mean_minor } => {
            format!(
                "Your average transaction{} {} was ${} across {} transactions.",
                scope,
                period,
                format_minor(mean_minor.abs()),
                result.transaction_count
            )
        }
        AggregationValue::Trend { bucket, points } => {
            let total: i64 = points.iter().map(|p| p.total_minor).sum();
            let mut answer = format!(
                "Your {} totals{} {} (net ${}):",
                bucket.as_str(),
                scope,
                period,
                format_minor(total)
            );
            for point in points.iter().take(FALLBACK_TREND_LINES) {
                answer.push_str(&format!(" {}: ${};", point.label, format_minor(point.total_minor)));
            }
            if points.len() > FALLBACK_TREND_LINES {
                answer.push_str(&format!(" ({} more)", points.len() - FALLBACK_TREND_LINES));
            }
            answer
        }
    }
}
