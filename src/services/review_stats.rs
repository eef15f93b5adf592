use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::store::{NodeFilter, NodeRow, NodeStore};
use crate::models::{MasteryLevel, MemoryNode};
use crate::services::review::{ReviewError, ReviewService};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsReport {
    pub total_nodes: u64,
    pub mastery_distribution: BTreeMap<MasteryLevel, u64>,
    /// Share of proficient and mastered nodes, percent with two decimals.
    pub mastery_rate: f64,
    pub due_today: u64,
    pub overdue: u64,
    pub total_reviews: u64,
}

#[derive(Debug)]
struct StatsAccumulator {
    today: chrono::NaiveDate,
    total_nodes: u64,
    distribution: BTreeMap<MasteryLevel, u64>,
    due_today: u64,
    overdue: u64,
    total_reviews: u64,
}

impl StatsAccumulator {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            today: now.date_naive(),
            total_nodes: 0,
            distribution: MasteryLevel::ALL.iter().map(|level| (*level, 0)).collect(),
            due_today: 0,
            overdue: 0,
            total_reviews: 0,
        }
    }

    fn add(&mut self, node: &MemoryNode) {
        self.total_nodes += 1;
        *self.distribution.entry(node.mastery_level).or_insert(0) += 1;
        self.total_reviews += u64::from(node.total_reviews());

        if let Some(next) = node.next_review_at {
            let day = next.date_naive();
            if day == self.today {
                self.due_today += 1;
            } else if day < self.today {
                self.overdue += 1;
            }
        }
    }

    fn finish(self) -> StatisticsReport {
        let mastered: u64 = self
            .distribution
            .iter()
            .filter(|(level, _)| level.is_mastered_bucket())
            .map(|(_, count)| *count)
            .sum();
        let mastery_rate = if self.total_nodes == 0 {
            0.0
        } else {
            round2(mastered as f64 / self.total_nodes as f64 * 100.0)
        };

        StatisticsReport {
            total_nodes: self.total_nodes,
            mastery_distribution: self.distribution,
            mastery_rate,
            due_today: self.due_today,
            overdue: self.overdue,
            total_reviews: self.total_reviews,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rows that fail to decode are logged and left out entirely.
pub fn aggregate_rows(rows: Vec<NodeRow>, now: DateTime<Utc>) -> StatisticsReport {
    let mut acc = StatsAccumulator::new(now);
    for row in rows {
        let node_id = row.id.clone();
        match row.decode() {
            Ok(node) => acc.add(&node),
            Err(err) => {
                tracing::warn!(node_id = %node_id, error = %err, "skipping corrupt node in statistics");
            }
        }
    }
    acc.finish()
}

impl<S: NodeStore> ReviewService<S> {
    pub async fn statistics(
        &self,
        user_id: &str,
        graph_id: Option<&str>,
    ) -> Result<StatisticsReport, ReviewError> {
        self.statistics_at(user_id, graph_id, Utc::now()).await
    }

    pub async fn statistics_at(
        &self,
        user_id: &str,
        graph_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<StatisticsReport, ReviewError> {
        let filter = NodeFilter::for_user(user_id, graph_id.map(str::to_string));
        let rows = self.store().list_nodes(&filter).await?;
        Ok(aggregate_rows(rows, now))
    }
}
