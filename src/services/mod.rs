pub mod forgetting;
pub mod node_locks;
pub mod review;
pub mod review_queue;
pub mod review_stats;
pub mod sm2;

pub use review::{ReviewError, ReviewService};
