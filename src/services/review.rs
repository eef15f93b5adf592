use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::store::{DecodeError, NodeRow, NodeStore, StoreError};
use crate::db::timestamps::{serialize_iso_opt, to_iso};
use crate::models::{
    MasteryFeedback, MasteryLevel, MemoryNode, NodeReviewUpdate, ReviewLogEntry, ReviewSnapshot,
    ReviewState, DEFAULT_QUEUE_LIMIT, MANUAL_REVIEW_MODE, MAX_QUALITY, MAX_QUEUE_LIMIT,
    MIN_QUALITY, MIN_QUEUE_LIMIT, UNREVIEWED_FORGETTING_INDEX,
};
use crate::services::forgetting::{node_forgetting_index, ForgettingBand};
use crate::services::node_locks::NodeLocks;
use crate::services::review_queue::ReviewMode;
use crate::services::sm2::{classify_mastery, sm2_step};

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid mode: {0}")]
    InvalidMode(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("corrupt review state for node {node_id}: {source}")]
    CorruptState {
        node_id: String,
        #[source]
        source: DecodeError,
    },
    #[error("schedule overflow for node {0}")]
    ScheduleOverflow(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewResult {
    pub node_id: String,
    pub mastery_level: MasteryLevel,
    pub next_review_at: String,
    pub interval_days: u32,
    pub easiness: f64,
    pub repetitions: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForgettingOutcome {
    Scored(f64),
    NotReviewedYet,
}

#[derive(Debug, Clone)]
pub struct ForgettingLookup {
    pub node: MemoryNode,
    pub outcome: ForgettingOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForgettingReport {
    pub node_id: String,
    pub forgetting_index: f64,
    pub forgetting_color: &'static str,
    pub forgetting_label: &'static str,
    pub reviewed: bool,
    #[serde(serialize_with = "serialize_iso_opt")]
    pub last_review_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_iso_opt")]
    pub next_review_at: Option<DateTime<Utc>>,
    pub mastery_level: MasteryLevel,
}

impl ForgettingLookup {
    /// Unreviewed nodes are reported with the fixed default index.
    pub fn report(&self) -> ForgettingReport {
        let (index, reviewed) = match self.outcome {
            ForgettingOutcome::Scored(index) => (index, true),
            ForgettingOutcome::NotReviewedYet => (UNREVIEWED_FORGETTING_INDEX, false),
        };
        let band = ForgettingBand::from_index(index);
        ForgettingReport {
            node_id: self.node.id.clone(),
            forgetting_index: index,
            forgetting_color: band.color(),
            forgetting_label: band.label(),
            reviewed,
            last_review_at: self.node.last_review_at,
            next_review_at: self.node.next_review_at,
            mastery_level: self.node.mastery_level,
        }
    }
}

pub fn validate_quality(quality: i64) -> Result<u8, ReviewError> {
    if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
        return Err(ReviewError::Validation(format!(
            "quality must be between {MIN_QUALITY} and {MAX_QUALITY}, got {quality}"
        )));
    }
    u8::try_from(quality).map_err(|_| ReviewError::Validation(format!("invalid quality {quality}")))
}

pub fn validate_duration(duration: i64) -> Result<u32, ReviewError> {
    if duration < 0 {
        return Err(ReviewError::Validation(format!(
            "review_duration must not be negative, got {duration}"
        )));
    }
    u32::try_from(duration)
        .map_err(|_| ReviewError::Validation(format!("review_duration {duration} is too large")))
}

pub fn validate_limit(limit: Option<i64>) -> Result<i64, ReviewError> {
    let limit = limit.unwrap_or(DEFAULT_QUEUE_LIMIT);
    if !(MIN_QUEUE_LIMIT..=MAX_QUEUE_LIMIT).contains(&limit) {
        return Err(ReviewError::Validation(format!(
            "limit must be between {MIN_QUEUE_LIMIT} and {MAX_QUEUE_LIMIT}, got {limit}"
        )));
    }
    Ok(limit)
}

/// Submissions come either from one of the queue modes or from a manual review.
fn submission_mode(mode: Option<&str>) -> Result<String, ReviewError> {
    match mode.map(str::trim).filter(|m| !m.is_empty()) {
        None => Ok(MANUAL_REVIEW_MODE.to_string()),
        Some(m) if m.eq_ignore_ascii_case(MANUAL_REVIEW_MODE) => Ok(MANUAL_REVIEW_MODE.to_string()),
        Some(m) => Ok(ReviewMode::parse(m)?.as_str().to_string()),
    }
}

pub struct ReviewService<S> {
    store: Arc<S>,
    locks: NodeLocks,
}

impl<S: NodeStore> ReviewService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: NodeLocks::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn record_review(
        &self,
        user_id: &str,
        node_id: &str,
        quality: i64,
        duration_seconds: i64,
        mode: Option<&str>,
    ) -> Result<ReviewResult, ReviewError> {
        self.record_review_at(user_id, node_id, quality, duration_seconds, mode, Utc::now())
            .await
    }

    pub async fn record_review_at(
        &self,
        user_id: &str,
        node_id: &str,
        quality: i64,
        duration_seconds: i64,
        mode: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ReviewResult, ReviewError> {
        let quality = validate_quality(quality)?;
        let duration = validate_duration(duration_seconds)?;
        let review_mode = submission_mode(mode)?;

        let _guard = self.locks.acquire(node_id).await;

        let node = self.load_owned_node(user_id, node_id).await?;
        let state = node.review_state.unwrap_or_default();

        let step = sm2_step(quality, state.repetitions, state.easiness, state.interval);
        let mastery_after = classify_mastery(quality, step.repetitions);
        let next_review_at = now
            .checked_add_signed(Duration::days(i64::from(step.interval)))
            .ok_or_else(|| ReviewError::ScheduleOverflow(node.id.clone()))?;

        let update = NodeReviewUpdate {
            node_id: node.id.clone(),
            mastery_level: mastery_after,
            last_review_at: now,
            next_review_at,
            review_state: ReviewState {
                repetitions: step.repetitions,
                easiness: step.easiness,
                interval: step.interval,
                total_reviews: state.total_reviews.saturating_add(1),
                last_quality: Some(quality),
                last_duration: Some(duration),
            },
        };
        let entry = ReviewLogEntry {
            id: Uuid::new_v4().to_string(),
            node_id: node.id.clone(),
            user_id: node.user_id.clone(),
            review_mode,
            mastery_feedback: MasteryFeedback::from_quality(quality),
            time_spent_seconds: duration,
            node_state_snapshot: ReviewSnapshot {
                mastery_before: node.mastery_level,
                mastery_after,
                quality,
            },
            created_at: now,
        };

        self.store.commit_review(&update, &entry).await?;

        tracing::debug!(
            node_id = %node.id,
            user_id,
            quality,
            mastery = %mastery_after,
            interval_days = step.interval,
            "review recorded"
        );

        Ok(ReviewResult {
            node_id: node.id,
            mastery_level: mastery_after,
            next_review_at: to_iso(next_review_at),
            interval_days: step.interval,
            easiness: step.easiness,
            repetitions: step.repetitions,
        })
    }

    pub async fn forgetting_index(
        &self,
        user_id: &str,
        node_id: &str,
    ) -> Result<ForgettingLookup, ReviewError> {
        self.forgetting_index_at(user_id, node_id, Utc::now()).await
    }

    pub async fn forgetting_index_at(
        &self,
        user_id: &str,
        node_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ForgettingLookup, ReviewError> {
        let node = self.load_owned_node(user_id, node_id).await?;
        let outcome = match node_forgetting_index(&node, now) {
            Some(index) => ForgettingOutcome::Scored(index),
            None => ForgettingOutcome::NotReviewedYet,
        };
        Ok(ForgettingLookup { node, outcome })
    }

    pub async fn review_history(
        &self,
        user_id: &str,
        node_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ReviewLogEntry>, ReviewError> {
        let limit = validate_limit(limit)?;
        let node = self.load_owned_node(user_id, node_id).await?;
        Ok(self.store.list_review_logs(&node.id, limit).await?)
    }

    /// Nodes owned by someone else are indistinguishable from missing ones.
    async fn load_owned_node(&self, user_id: &str, node_id: &str) -> Result<MemoryNode, ReviewError> {
        let row: NodeRow = self
            .store
            .fetch_node(node_id)
            .await?
            .filter(|row| row.user_id == user_id)
            .ok_or_else(|| ReviewError::NotFound(format!("memory node {node_id}")))?;
        let id = row.id.clone();
        row.decode()
            .map_err(|source| ReviewError::CorruptState { node_id: id, source })
    }
}
