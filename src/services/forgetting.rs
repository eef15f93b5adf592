use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{MasteryLevel, MemoryNode, UNREVIEWED_FORGETTING_INDEX};

const DUE_CAP: f64 = 0.5;
const OVERDUE_RATE_PER_DAY: f64 = 0.1;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// How forgotten an item is likely to be at `now`, in `[0, 1]`.
///
/// Before the scheduled review the index ramps linearly from 0 to 0.5 across
/// the review interval. Once due it keeps climbing from 0.5 at a rate scaled
/// by the mastery level, capped at 1.
pub fn forgetting_index(
    last_review: DateTime<Utc>,
    next_review: DateTime<Utc>,
    mastery: MasteryLevel,
    now: DateTime<Utc>,
) -> f64 {
    let index = if now < next_review {
        let total = seconds_between(last_review, next_review);
        if total <= 0.0 {
            return 0.0;
        }
        let elapsed = seconds_between(last_review, now).max(0.0);
        (elapsed / total * DUE_CAP).min(DUE_CAP)
    } else {
        let overdue_days = seconds_between(next_review, now) / SECONDS_PER_DAY;
        (DUE_CAP + overdue_days * OVERDUE_RATE_PER_DAY * mastery.forgetting_factor()).min(1.0)
    };

    if index.is_finite() {
        index.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// `None` when the node has never been reviewed.
pub fn node_forgetting_index(node: &MemoryNode, now: DateTime<Utc>) -> Option<f64> {
    match (node.last_review_at, node.next_review_at) {
        (Some(last), Some(next)) => Some(forgetting_index(last, next, node.mastery_level, now)),
        _ => None,
    }
}

pub fn effective_forgetting_index(node: &MemoryNode, now: DateTime<Utc>) -> f64 {
    node_forgetting_index(node, now).unwrap_or(UNREVIEWED_FORGETTING_INDEX)
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForgettingBand {
    Solid,
    Good,
    NeedsReview,
    Urgent,
    AboutToForget,
}

impl ForgettingBand {
    /// Each band owns its lower bound.
    pub fn from_index(index: f64) -> Self {
        if index < 0.2 {
            Self::Solid
        } else if index < 0.4 {
            Self::Good
        } else if index < 0.6 {
            Self::NeedsReview
        } else if index < 0.8 {
            Self::Urgent
        } else {
            Self::AboutToForget
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Solid => "#4CAF50",
            Self::Good => "#8BC34A",
            Self::NeedsReview => "#FFC107",
            Self::Urgent => "#FF9800",
            Self::AboutToForget => "#F44336",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Solid => "记忆牢固",
            Self::Good => "记忆良好",
            Self::NeedsReview => "需要复习",
            Self::Urgent => "急需复习",
            Self::AboutToForget => "即将遗忘",
        }
    }
}

pub fn forgetting_color(index: f64) -> &'static str {
    ForgettingBand::from_index(index).color()
}
