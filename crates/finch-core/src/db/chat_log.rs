//! Append-only chat exchange log

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{AnswerSource, ChatExchange};

/// A new chat exchange to append (before DB insertion)
#[derive(Debug, Clone)]
pub struct NewChatExchange {
    pub user_id: String,
    pub question: String,
    pub structured_query: Option<String>,
    pub aggregation: Option<String>,
    pub llm_reply: Option<String>,
    pub answer: String,
    pub reconciled: bool,
    pub source: AnswerSource,
}

impl Database {
    /// Append an exchange to the chat log
    pub fn append_chat_exchange(&self, exchange: &NewChatExchange) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO chat_exchanges
             (user_id, question, structured_query, aggregation, llm_reply, answer, reconciled, source)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                exchange.user_id,
                exchange.question,
                exchange.structured_query,
                exchange.aggregation,
                exchange.llm_reply,
                exchange.answer,
                exchange.reconciled,
                exchange.source.as_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent exchanges for a user, newest first
    pub fn list_chat_exchanges(&self, user_id: &str, limit: i64) -> Result<Vec<ChatExchange>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, question, structured_query, aggregation, llm_reply,
                    answer, reconciled, source, created_at
             FROM chat_exchanges
             WHERE user_id = ?
             ORDER BY id DESC
             LIMIT ?",
        )?;

        let rows = stmt.query_map(params![user_id, limit], |row| {
            Ok(ChatExchange {
                id: row.get(0)?,
                user_id: row.get(1)?,
                question: row.get(2)?,
                structured_query: row.get(3)?,
                aggregation: row.get(4)?,
                llm_reply: row.get(5)?,
                answer: row.get(6)?,
                reconciled: row.get(7)?,
                source: row
                    .get::<_, String>(8)?
                    .parse()
                    .unwrap_or(AnswerSource::Fallback),
                created_at: parse_datetime(&row.get::<_, String>(9)?),
            })
        })?;

        let mut exchanges = Vec::new();
        for row in rows {
            exchanges.push(row?);
        }
        Ok(exchanges)
    }
}
