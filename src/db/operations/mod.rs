pub mod memory_nodes;
pub mod review_logs;

use crate::db::store::{NodeFilter, NodeRow, NodeStore, StoreError};
use crate::db::Database;
use crate::models::{NodeReviewUpdate, ReviewLogEntry};

impl NodeStore for Database {
    async fn fetch_node(&self, node_id: &str) -> Result<Option<NodeRow>, StoreError> {
        Ok(memory_nodes::fetch_node(self.pool(), node_id).await?)
    }

    async fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<NodeRow>, StoreError> {
        Ok(memory_nodes::list_nodes(self.pool(), filter).await?)
    }

    async fn commit_review(
        &self,
        update: &NodeReviewUpdate,
        entry: &ReviewLogEntry,
    ) -> Result<(), StoreError> {
        // Dropping `tx` before commit (error or cancellation) rolls back both writes.
        let mut tx = self.pool().begin().await?;
        memory_nodes::apply_review_update(&mut tx, update).await?;
        review_logs::insert_review_log(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_review_logs(&self, node_id: &str, limit: i64) -> Result<Vec<ReviewLogEntry>, StoreError> {
        Ok(review_logs::list_review_logs(self.pool(), node_id, limit).await?)
    }
}
