use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::db::Database;
use crate::models::DEFAULT_QUEUE_LIMIT;
use crate::services::ReviewService;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    db: Database,
    reviews: Arc<ReviewService<Database>>,
    default_queue_limit: i64,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        let reviews = Arc::new(ReviewService::new(Arc::new(db.clone())));
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            db,
            reviews,
            default_queue_limit: DEFAULT_QUEUE_LIMIT,
        }
    }

    pub fn with_default_queue_limit(mut self, limit: i64) -> Self {
        self.default_queue_limit = limit;
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn reviews(&self) -> Arc<ReviewService<Database>> {
        Arc::clone(&self.reviews)
    }

    pub fn default_queue_limit(&self) -> i64 {
        self.default_queue_limit
    }
}
