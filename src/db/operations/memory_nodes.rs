use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};

use crate::db::store::{NodeFilter, NodeRow, StoreError};
use crate::db::timestamps::format_storage;
use crate::models::NodeReviewUpdate;

const NODE_COLUMNS: &str = r#""id","user_id","graph_id","title","node_type","mastery_level",
  "last_review_at","next_review_at","review_stats","created_at""#;

pub async fn fetch_node(pool: &SqlitePool, node_id: &str) -> Result<Option<NodeRow>, sqlx::Error> {
    let sql = format!(
        r#"SELECT {NODE_COLUMNS} FROM "memory_nodes" WHERE "id" = ?1 AND "deleted_at" IS NULL LIMIT 1"#
    );
    let row = sqlx::query(&sql).bind(node_id).fetch_optional(pool).await?;
    row.as_ref().map(map_node_row).transpose()
}

pub async fn list_nodes(pool: &SqlitePool, filter: &NodeFilter) -> Result<Vec<NodeRow>, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
    qb.push(NODE_COLUMNS);
    qb.push(r#" FROM "memory_nodes" WHERE "deleted_at" IS NULL AND "user_id" = "#);
    qb.push_bind(filter.user_id.as_str());

    if let Some(graph_id) = filter.graph_id.as_deref() {
        qb.push(r#" AND "graph_id" = "#);
        qb.push_bind(graph_id);
    }

    if let Some(levels) = filter.mastery_in.as_deref() {
        if levels.is_empty() {
            return Ok(Vec::new());
        }
        qb.push(r#" AND "mastery_level" IN ("#);
        {
            let mut sep = qb.separated(", ");
            for level in levels {
                sep.push_bind(level.as_str());
            }
        }
        qb.push(")");
    }

    qb.push(r#" ORDER BY "created_at" ASC, "id" ASC"#);

    // A due cutoff is applied after the fetch, so a SQL limit would cut the
    // candidate set before it.
    if let (Some(limit), None) = (filter.limit, filter.due_at_or_before) {
        qb.push(" LIMIT ");
        qb.push_bind(limit);
    }

    let rows = qb.build().fetch_all(pool).await?;
    let mut nodes = Vec::with_capacity(rows.len());
    for row in &rows {
        let node = map_node_row(row)?;
        if filter.is_due(node.next_review_at.as_deref()) {
            nodes.push(node);
        }
    }
    Ok(nodes)
}

/// Runs inside the caller's transaction.
pub async fn apply_review_update(
    conn: &mut SqliteConnection,
    update: &NodeReviewUpdate,
) -> Result<(), StoreError> {
    let review_stats = serde_json::to_string(&update.review_state)?;
    let result = sqlx::query(
        r#"
        UPDATE "memory_nodes"
        SET "mastery_level" = ?1,
            "last_review_at" = ?2,
            "next_review_at" = ?3,
            "review_stats" = ?4,
            "updated_at" = ?5
        WHERE "id" = ?6
          AND "deleted_at" IS NULL
        "#,
    )
    .bind(update.mastery_level.as_str())
    .bind(format_storage(update.last_review_at))
    .bind(format_storage(update.next_review_at))
    .bind(review_stats)
    .bind(format_storage(Utc::now()))
    .bind(&update.node_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() != 1 {
        return Err(StoreError::Custom(format!(
            "memory node {} disappeared during review",
            update.node_id
        )));
    }
    Ok(())
}

fn map_node_row(row: &SqliteRow) -> Result<NodeRow, sqlx::Error> {
    Ok(NodeRow {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        graph_id: row.try_get("graph_id")?,
        title: row.try_get("title")?,
        node_type: row.try_get("node_type")?,
        mastery_level: row.try_get("mastery_level")?,
        last_review_at: row.try_get("last_review_at")?,
        next_review_at: row.try_get("next_review_at")?,
        review_stats: row.try_get("review_stats")?,
        created_at: row.try_get("created_at")?,
    })
}
