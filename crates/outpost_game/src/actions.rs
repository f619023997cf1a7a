//! Append-only audit of agent actions, independent of the scene engine.
//!
//! Every logged action upserts the agent, appends an event row, and, when
//! the caller supplies one, replaces the agent's current action set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::GameError;

const DEFAULT_EVENT_LIMIT: i64 = 20;

#[derive(Clone)]
pub struct ActionLog {
    pool: PgPool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActionEvent {
    pub id: i64,
    pub agent_id: String,
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentActionState {
    pub agent_id: String,
    pub actions: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct LogActionInput {
    pub agent_id: String,
    pub label: Option<String>,
    pub action_type: String,
    pub payload: Option<serde_json::Value>,
    pub issued_by: Option<String>,
    pub source: Option<String>,
    pub correlation_id: Option<String>,
    pub result_status: Option<String>,
    pub result_message: Option<String>,
    /// When present, replaces the agent's current action set.
    pub actions: Option<Vec<String>>,
}

impl ActionLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn log_action(&self, input: LogActionInput) -> Result<(), GameError> {
        if input.agent_id.trim().is_empty() {
            return Err(GameError::InvalidSceneEntity(
                "agent_id is required".to_string(),
            ));
        }
        if input.action_type.trim().is_empty() {
            return Err(GameError::InvalidSceneEntity(
                "action_type is required".to_string(),
            ));
        }

        let label = input
            .label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| input.agent_id.clone());

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO agents (id, label) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET label = EXCLUDED.label
            ",
        )
        .bind(&input.agent_id)
        .bind(&label)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO agent_action_events
                (agent_id, action_type, payload, issued_by, source, correlation_id,
                 result_status, result_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(&input.agent_id)
        .bind(&input.action_type)
        .bind(&input.payload)
        .bind(&input.issued_by)
        .bind(&input.source)
        .bind(&input.correlation_id)
        .bind(&input.result_status)
        .bind(&input.result_message)
        .execute(&mut *tx)
        .await?;

        if let Some(actions) = &input.actions {
            sqlx::query(
                r"
                INSERT INTO agent_action_state (agent_id, actions, updated_at)
                VALUES ($1, $2, now())
                ON CONFLICT (agent_id)
                DO UPDATE SET actions = EXCLUDED.actions, updated_at = EXCLUDED.updated_at
                ",
            )
            .bind(&input.agent_id)
            .bind(actions)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Most recent events first. A non-positive limit falls back to 20.
    pub async fn list_events(
        &self,
        agent_id: &str,
        limit: i64,
    ) -> Result<Vec<ActionEvent>, GameError> {
        let limit = if limit <= 0 { DEFAULT_EVENT_LIMIT } else { limit };
        let events = sqlx::query_as::<_, ActionEvent>(
            r"
            SELECT id, agent_id, action_type, payload, issued_by, source,
                   correlation_id, result_status, result_message, created_at
              FROM agent_action_events
             WHERE agent_id = $1
             ORDER BY created_at DESC
             LIMIT $2
            ",
        )
        .bind(agent_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    /// Current action set; an agent with no state row reads as empty.
    pub async fn state(&self, agent_id: &str) -> Result<AgentActionState, GameError> {
        let row = sqlx::query_as::<_, (String, Vec<String>, DateTime<Utc>)>(
            "SELECT agent_id, actions, updated_at FROM agent_action_state WHERE agent_id = $1",
        )
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some((agent_id, actions, updated_at)) => AgentActionState {
                agent_id,
                actions,
                updated_at: Some(updated_at),
            },
            None => AgentActionState {
                agent_id: agent_id.to_string(),
                actions: Vec::new(),
                updated_at: None,
            },
        })
    }
}
