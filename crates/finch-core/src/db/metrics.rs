//! LLM gateway call tracking

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{GatewayMetric, NewGatewayMetric};

impl Database {
    /// Record a gateway call
    pub fn record_gateway_metric(&self, metric: &NewGatewayMetric) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO gateway_metrics (model, latency_ms, success, error_message, attempts)
             VALUES (?, ?, ?, ?, ?)",
            params![
                metric.model,
                metric.latency_ms,
                metric.success,
                metric.error_message,
                metric.attempts,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent gateway calls, newest first
    pub fn list_gateway_metrics(&self, limit: i64) -> Result<Vec<GatewayMetric>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, model, latency_ms, success, error_message, attempts, created_at
             FROM gateway_metrics
             ORDER BY id DESC
             LIMIT ?",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            Ok(GatewayMetric {
                id: row.get(0)?,
                model: row.get(1)?,
                latency_ms: row.get(2)?,
                success: row.get(3)?,
                error_message: row.get(4)?,
                attempts: row.get(5)?,
                created_at: parse_datetime(&row.get::<_, String>(6)?),
            })
        })?;

        let mut metrics = Vec::new();
        for row in rows {
            metrics.push(row?);
        }
        Ok(metrics)
    }
}
