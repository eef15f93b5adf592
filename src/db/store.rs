use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::timestamps::parse_storage;
use crate::models::{MasteryLevel, MemoryNode, NodeReviewUpdate, ReviewLogEntry, ReviewState};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("{0}")]
    Custom(String),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown mastery level {0:?}")]
    UnknownMastery(String),
    #[error("invalid timestamp in {field}: {value:?}")]
    Timestamp { field: &'static str, value: String },
    #[error("malformed review_stats: {0}")]
    ReviewStats(String),
}

/// A `memory_nodes` row as persisted, before any validation.
#[derive(Debug, Clone, Default)]
pub struct NodeRow {
    pub id: String,
    pub user_id: String,
    pub graph_id: String,
    pub title: String,
    pub node_type: String,
    pub mastery_level: String,
    pub last_review_at: Option<String>,
    pub next_review_at: Option<String>,
    pub review_stats: Option<String>,
    pub created_at: String,
}

impl NodeRow {
    pub fn decode(self) -> Result<MemoryNode, DecodeError> {
        let mastery_level = MasteryLevel::parse(&self.mastery_level)
            .ok_or_else(|| DecodeError::UnknownMastery(self.mastery_level.clone()))?;
        let last_review_at = decode_optional_time("last_review_at", self.last_review_at.as_deref())?;
        let next_review_at = decode_optional_time("next_review_at", self.next_review_at.as_deref())?;
        let created_at = parse_storage(&self.created_at).ok_or_else(|| DecodeError::Timestamp {
            field: "created_at",
            value: self.created_at.clone(),
        })?;
        let review_state = decode_review_stats(self.review_stats.as_deref())?;

        Ok(MemoryNode {
            id: self.id,
            user_id: self.user_id,
            graph_id: self.graph_id,
            title: self.title,
            node_type: self.node_type,
            mastery_level,
            last_review_at,
            next_review_at,
            review_state,
            created_at,
        })
    }
}

fn decode_optional_time(
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<DateTime<Utc>>, DecodeError> {
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => parse_storage(value).map(Some).ok_or_else(|| DecodeError::Timestamp {
            field,
            value: value.to_string(),
        }),
    }
}

/// `NULL`, empty text and `{}` all mean "never reviewed".
fn decode_review_stats(raw: Option<&str>) -> Result<Option<ReviewState>, DecodeError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|err| DecodeError::ReviewStats(err.to_string()))?;
    match &value {
        serde_json::Value::Null => return Ok(None),
        serde_json::Value::Object(map) if map.is_empty() => return Ok(None),
        serde_json::Value::Object(_) => {}
        _ => return Err(DecodeError::ReviewStats("expected a JSON object".to_string())),
    }
    let state: ReviewState =
        serde_json::from_value(value).map_err(|err| DecodeError::ReviewStats(err.to_string()))?;
    state.validate().map_err(DecodeError::ReviewStats)?;
    Ok(Some(state))
}

/// Node selection for a listing. `None` fields do not restrict.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub user_id: String,
    pub graph_id: Option<String>,
    /// Due at or before this instant, or never scheduled. Stored text may
    /// carry an offset, so this is checked on parsed values, not in SQL.
    pub due_at_or_before: Option<DateTime<Utc>>,
    pub mastery_in: Option<Vec<MasteryLevel>>,
    /// Only honored when the listing order (`created_at`, `id`) is final.
    pub limit: Option<i64>,
}

impl NodeFilter {
    pub fn for_user(user_id: impl Into<String>, graph_id: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            graph_id,
            ..Default::default()
        }
    }

    /// Unparseable text passes so that decoding reports the row as corrupt.
    pub fn is_due(&self, next_review_at: Option<&str>) -> bool {
        let Some(cutoff) = self.due_at_or_before else {
            return true;
        };
        match next_review_at.map(str::trim).filter(|raw| !raw.is_empty()) {
            None => true,
            Some(raw) => parse_storage(raw).map_or(true, |next| next <= cutoff),
        }
    }

    /// Row-level evaluation of the whole predicate, limit aside.
    pub fn matches(&self, row: &NodeRow) -> bool {
        if row.user_id != self.user_id {
            return false;
        }
        if let Some(graph_id) = &self.graph_id {
            if &row.graph_id != graph_id {
                return false;
            }
        }
        if !self.is_due(row.next_review_at.as_deref()) {
            return false;
        }
        if let Some(levels) = &self.mastery_in {
            if !levels.iter().any(|level| level.as_str() == row.mastery_level) {
                return false;
            }
        }
        true
    }
}

/// Outbound persistence contract of the review engine.
pub trait NodeStore: Send + Sync + 'static {
    fn fetch_node(
        &self,
        node_id: &str,
    ) -> impl Future<Output = Result<Option<NodeRow>, StoreError>> + Send;

    fn list_nodes(
        &self,
        filter: &NodeFilter,
    ) -> impl Future<Output = Result<Vec<NodeRow>, StoreError>> + Send;

    /// Writes the node update and appends the log entry as one unit; either
    /// both land or neither does.
    fn commit_review(
        &self,
        update: &NodeReviewUpdate,
        entry: &ReviewLogEntry,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Most recent first.
    fn list_review_logs(
        &self,
        node_id: &str,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<ReviewLogEntry>, StoreError>> + Send;
}
