use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::db::store::{NodeFilter, NodeStore};
use crate::db::timestamps::serialize_iso_opt;
use crate::models::{MasteryLevel, MemoryNode, ReviewState};
use crate::services::forgetting::{effective_forgetting_index, forgetting_color};
use crate::services::review::{validate_limit, ReviewError, ReviewService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewMode {
    Spaced,
    Focused,
    Random,
    GraphTraversal,
}

impl ReviewMode {
    pub const ALL: [ReviewMode; 4] = [
        ReviewMode::Spaced,
        ReviewMode::Focused,
        ReviewMode::Random,
        ReviewMode::GraphTraversal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spaced => "spaced",
            Self::Focused => "focused",
            Self::Random => "random",
            Self::GraphTraversal => "graph_traversal",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ReviewError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "spaced" => Ok(Self::Spaced),
            "focused" => Ok(Self::Focused),
            "random" => Ok(Self::Random),
            "graph_traversal" => Ok(Self::GraphTraversal),
            other => Err(ReviewError::InvalidMode(format!(
                "unknown review mode {other:?}, expected one of spaced, focused, random, graph_traversal"
            ))),
        }
    }

    /// Storage-side selection for this mode on top of the owner/graph filter.
    /// Only graph traversal shares the storage order, so only it takes a limit.
    fn filter(&self, base: NodeFilter, now: DateTime<Utc>, limit: i64) -> NodeFilter {
        match self {
            Self::Spaced => NodeFilter {
                due_at_or_before: Some(now),
                ..base
            },
            Self::Focused => NodeFilter {
                mastery_in: Some(MasteryLevel::WEAK.to_vec()),
                ..base
            },
            Self::GraphTraversal => NodeFilter {
                limit: Some(limit),
                ..base
            },
            Self::Random => base,
        }
    }

    fn order(&self, nodes: &mut [MemoryNode]) {
        match self {
            // Never-scheduled nodes count as the most overdue.
            Self::Spaced => nodes.sort_by(|a, b| {
                match (a.next_review_at, b.next_review_at) {
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (Some(x), Some(y)) => x.cmp(&y),
                }
                .then_with(|| a.created_at.cmp(&b.created_at))
            }),
            Self::Focused => nodes.sort_by(|a, b| {
                a.mastery_level
                    .cmp(&b.mastery_level)
                    .then_with(|| a.created_at.cmp(&b.created_at))
            }),
            Self::Random => nodes.shuffle(&mut rand::rng()),
            Self::GraphTraversal => {
                nodes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
            }
        }
    }
}

impl std::fmt::Display for ReviewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueItem {
    pub node_id: String,
    pub title: String,
    pub node_type: String,
    pub mastery_level: MasteryLevel,
    #[serde(serialize_with = "serialize_iso_opt")]
    pub last_review_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_iso_opt")]
    pub next_review_at: Option<DateTime<Utc>>,
    pub forgetting_index: f64,
    pub forgetting_color: &'static str,
    #[serde(serialize_with = "serialize_review_stats")]
    pub review_stats: Option<ReviewState>,
}

fn serialize_review_stats<S>(value: &Option<ReviewState>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(state) => state.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

impl QueueItem {
    fn annotate(node: MemoryNode, now: DateTime<Utc>) -> Self {
        let index = effective_forgetting_index(&node, now);
        Self {
            forgetting_index: index,
            forgetting_color: forgetting_color(index),
            node_id: node.id,
            title: node.title,
            node_type: node.node_type,
            mastery_level: node.mastery_level,
            last_review_at: node.last_review_at,
            next_review_at: node.next_review_at,
            review_stats: node.review_state,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewQueue {
    pub total: usize,
    pub mode: ReviewMode,
    pub nodes: Vec<QueueItem>,
}

impl<S: NodeStore> ReviewService<S> {
    pub async fn build_queue(
        &self,
        user_id: &str,
        graph_id: Option<&str>,
        mode: Option<&str>,
        limit: Option<i64>,
    ) -> Result<ReviewQueue, ReviewError> {
        self.build_queue_at(user_id, graph_id, mode, limit, Utc::now())
            .await
    }

    pub async fn build_queue_at(
        &self,
        user_id: &str,
        graph_id: Option<&str>,
        mode: Option<&str>,
        limit: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<ReviewQueue, ReviewError> {
        let mode = match mode.map(str::trim).filter(|m| !m.is_empty()) {
            Some(raw) => ReviewMode::parse(raw)?,
            None => ReviewMode::Spaced,
        };
        let limit = validate_limit(limit)?;

        let base = NodeFilter::for_user(user_id, graph_id.map(str::to_string));
        let rows = self.store().list_nodes(&mode.filter(base, now, limit)).await?;

        let mut nodes: Vec<MemoryNode> = rows
            .into_iter()
            .filter_map(|row| {
                let node_id = row.id.clone();
                match row.decode() {
                    Ok(node) => Some(node),
                    Err(err) => {
                        tracing::warn!(node_id = %node_id, error = %err, "skipping corrupt node in review queue");
                        None
                    }
                }
            })
            .collect();

        mode.order(&mut nodes);
        nodes.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

        let nodes: Vec<QueueItem> = nodes
            .into_iter()
            .map(|node| QueueItem::annotate(node, now))
            .collect();

        Ok(ReviewQueue {
            total: nodes.len(),
            mode,
            nodes,
        })
    }
}
