use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EASINESS: f64 = 2.5;
pub const MIN_EASINESS: f64 = 1.3;
pub const DEFAULT_INTERVAL_DAYS: u32 = 1;

pub const MIN_QUALITY: i64 = 0;
pub const MAX_QUALITY: i64 = 5;
/// Quality below this is a lapse.
pub const PASSING_QUALITY: u8 = 3;
pub const STRONG_RECALL_QUALITY: u8 = 4;
pub const PROFICIENT_REPETITIONS: u32 = 3;
pub const MASTERED_REPETITIONS: u32 = 5;

/// Forgetting index assumed for nodes that have never been reviewed.
pub const UNREVIEWED_FORGETTING_INDEX: f64 = 0.8;

pub const MIN_QUEUE_LIMIT: i64 = 1;
pub const MAX_QUEUE_LIMIT: i64 = 100;
pub const DEFAULT_QUEUE_LIMIT: i64 = 20;

pub const MANUAL_REVIEW_MODE: &str = "manual";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryLevel {
    NotStarted,
    Learning,
    Familiar,
    Proficient,
    Mastered,
}

impl MasteryLevel {
    pub const ALL: [MasteryLevel; 5] = [
        MasteryLevel::NotStarted,
        MasteryLevel::Learning,
        MasteryLevel::Familiar,
        MasteryLevel::Proficient,
        MasteryLevel::Mastered,
    ];

    /// Levels that FOCUSED mode drills, weakest first.
    pub const WEAK: [MasteryLevel; 3] = [
        MasteryLevel::NotStarted,
        MasteryLevel::Learning,
        MasteryLevel::Familiar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Learning => "learning",
            Self::Familiar => "familiar",
            Self::Proficient => "proficient",
            Self::Mastered => "mastered",
        }
    }

    /// Exact parse of the persisted value. Anything other than the canonical
    /// lowercase name is rejected rather than mapped to a level, matching the
    /// literals storage filters compare against.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "not_started" => Some(Self::NotStarted),
            "learning" => Some(Self::Learning),
            "familiar" => Some(Self::Familiar),
            "proficient" => Some(Self::Proficient),
            "mastered" => Some(Self::Mastered),
            _ => None,
        }
    }

    /// Multiplier applied to overdue days; stronger memories decay slower.
    pub fn forgetting_factor(&self) -> f64 {
        match self {
            Self::NotStarted => 1.5,
            Self::Learning => 1.2,
            Self::Familiar => 1.0,
            Self::Proficient => 0.8,
            Self::Mastered => 0.5,
        }
    }

    pub fn is_weak(&self) -> bool {
        Self::WEAK.contains(self)
    }

    pub fn is_mastered_bucket(&self) -> bool {
        matches!(self, Self::Proficient | Self::Mastered)
    }
}

impl std::fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_easiness() -> f64 {
    DEFAULT_EASINESS
}

fn default_interval() -> u32 {
    DEFAULT_INTERVAL_DAYS
}

/// SM-2 bookkeeping persisted with each node as `review_stats`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewState {
    #[serde(default)]
    pub repetitions: u32,
    #[serde(default = "default_easiness")]
    pub easiness: f64,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub total_reviews: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_quality: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_duration: Option<u32>,
}

impl Default for ReviewState {
    fn default() -> Self {
        Self {
            repetitions: 0,
            easiness: DEFAULT_EASINESS,
            interval: DEFAULT_INTERVAL_DAYS,
            total_reviews: 0,
            last_quality: None,
            last_duration: None,
        }
    }
}

impl ReviewState {
    pub fn validate(&self) -> Result<(), String> {
        if !self.easiness.is_finite() || self.easiness < MIN_EASINESS {
            return Err(format!("easiness {} below floor {MIN_EASINESS}", self.easiness));
        }
        if self.interval < 1 {
            return Err("interval must be at least one day".to_string());
        }
        if let Some(quality) = self.last_quality {
            if i64::from(quality) > MAX_QUALITY {
                return Err(format!("last_quality {quality} out of range"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryNode {
    pub id: String,
    pub user_id: String,
    pub graph_id: String,
    pub title: String,
    pub node_type: String,
    pub mastery_level: MasteryLevel,
    pub last_review_at: Option<DateTime<Utc>>,
    pub next_review_at: Option<DateTime<Utc>>,
    /// `None` until the first review is recorded.
    pub review_state: Option<ReviewState>,
    pub created_at: DateTime<Utc>,
}

impl MemoryNode {
    pub fn has_been_reviewed(&self) -> bool {
        self.last_review_at.is_some() && self.next_review_at.is_some()
    }

    pub fn total_reviews(&self) -> u32 {
        self.review_state.map(|s| s.total_reviews).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteryFeedback {
    Remembered,
    Forgot,
}

impl MasteryFeedback {
    pub fn from_quality(quality: u8) -> Self {
        if quality >= PASSING_QUALITY {
            Self::Remembered
        } else {
            Self::Forgot
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remembered => "remembered",
            Self::Forgot => "forgot",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "remembered" => Some(Self::Remembered),
            "forgot" => Some(Self::Forgot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSnapshot {
    pub mastery_before: MasteryLevel,
    pub mastery_after: MasteryLevel,
    pub quality: u8,
}

/// Append-only audit record written with every review submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewLogEntry {
    pub id: String,
    pub node_id: String,
    pub user_id: String,
    pub review_mode: String,
    pub mastery_feedback: MasteryFeedback,
    pub time_spent_seconds: u32,
    pub node_state_snapshot: ReviewSnapshot,
    #[serde(serialize_with = "crate::db::timestamps::serialize_iso")]
    pub created_at: DateTime<Utc>,
}

/// Fields the recorder writes back to a node after a review.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeReviewUpdate {
    pub node_id: String,
    pub mastery_level: MasteryLevel,
    pub last_review_at: DateTime<Utc>,
    pub next_review_at: DateTime<Utc>,
    pub review_state: ReviewState,
}
