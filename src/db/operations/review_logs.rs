use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::db::store::StoreError;
use crate::db::timestamps::{format_storage, parse_storage};
use crate::models::{MasteryFeedback, ReviewLogEntry, ReviewSnapshot};

pub async fn insert_review_log(
    conn: &mut SqliteConnection,
    entry: &ReviewLogEntry,
) -> Result<(), StoreError> {
    let snapshot = serde_json::to_string(&entry.node_state_snapshot)?;
    sqlx::query(
        r#"
        INSERT INTO "review_logs"
          ("id","node_id","user_id","review_mode","mastery_feedback",
           "time_spent_seconds","node_state_snapshot","created_at")
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.node_id)
    .bind(&entry.user_id)
    .bind(&entry.review_mode)
    .bind(entry.mastery_feedback.as_str())
    .bind(i64::from(entry.time_spent_seconds))
    .bind(snapshot)
    .bind(format_storage(entry.created_at))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn list_review_logs(
    pool: &SqlitePool,
    node_id: &str,
    limit: i64,
) -> Result<Vec<ReviewLogEntry>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "id","node_id","user_id","review_mode","mastery_feedback",
               "time_spent_seconds","node_state_snapshot","created_at"
        FROM "review_logs"
        WHERE "node_id" = ?1
        ORDER BY "created_at" DESC, "id" DESC
        LIMIT ?2
        "#,
    )
    .bind(node_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .filter_map(|row| match map_log_row(row) {
            Some(entry) => Some(entry),
            None => {
                tracing::warn!(node_id, "skipping malformed review log row");
                None
            }
        })
        .collect())
}

fn map_log_row(row: &SqliteRow) -> Option<ReviewLogEntry> {
    let snapshot_raw: Option<String> = row.try_get("node_state_snapshot").ok()?;
    let node_state_snapshot: ReviewSnapshot = serde_json::from_str(snapshot_raw.as_deref()?).ok()?;
    let feedback_raw: String = row.try_get("mastery_feedback").ok()?;
    let created_raw: String = row.try_get("created_at").ok()?;
    let time_spent: Option<i64> = row.try_get("time_spent_seconds").ok()?;

    Some(ReviewLogEntry {
        id: row.try_get("id").ok()?,
        node_id: row.try_get("node_id").ok()?,
        user_id: row.try_get("user_id").ok()?,
        review_mode: row.try_get("review_mode").ok()?,
        mastery_feedback: MasteryFeedback::parse(&feedback_raw)?,
        time_spent_seconds: time_spent
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0),
        node_state_snapshot,
        created_at: parse_storage(&created_raw)?,
    })
}
