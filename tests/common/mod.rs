#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

use memory_review_backend::auth::hash_token;
use memory_review_backend::db::timestamps::format_storage;
use memory_review_backend::db::Database;
use memory_review_backend::state::AppState;

pub const ALICE: &str = "user-alice";
pub const ALICE_TOKEN: &str = "alice-session-token";
pub const BOB: &str = "user-bob";
pub const BOB_TOKEN: &str = "bob-session-token";
pub const GRAPH: &str = "graph-rust";
pub const OTHER_GRAPH: &str = "graph-sql";

pub struct TestContext {
    _dir: TempDir,
    pub db: Database,
}

impl TestContext {
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let db = Database::open_path(&dir.path().join("review.db"))
            .await
            .expect("failed to open database");

        seed_user(db.pool(), ALICE, "alice", ALICE_TOKEN).await;
        seed_user(db.pool(), BOB, "bob", BOB_TOKEN).await;
        seed_graph(db.pool(), GRAPH, ALICE).await;
        seed_graph(db.pool(), OTHER_GRAPH, ALICE).await;
        seed_graph(db.pool(), "graph-bob", BOB).await;

        Self { _dir: dir, db }
    }

    pub fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }

    pub fn app(&self) -> Router {
        memory_review_backend::create_app(AppState::new(self.db.clone()))
    }
}

pub async fn seed_user(pool: &SqlitePool, id: &str, username: &str, token: &str) {
    sqlx::query(r#"INSERT INTO "users" ("id", "username") VALUES (?1, ?2)"#)
        .bind(id)
        .bind(username)
        .execute(pool)
        .await
        .expect("insert user");
    seed_session(pool, id, token, Some(Utc::now() + Duration::days(1))).await;
}

pub async fn seed_session(
    pool: &SqlitePool,
    user_id: &str,
    token: &str,
    expires_at: Option<DateTime<Utc>>,
) {
    sqlx::query(r#"INSERT INTO "sessions" ("token", "user_id", "expires_at") VALUES (?1, ?2, ?3)"#)
        .bind(hash_token(token))
        .bind(user_id)
        .bind(expires_at.map(format_storage))
        .execute(pool)
        .await
        .expect("insert session");
}

pub async fn seed_graph(pool: &SqlitePool, id: &str, user_id: &str) {
    sqlx::query(r#"INSERT INTO "knowledge_graphs" ("id", "user_id", "name") VALUES (?1, ?2, ?1)"#)
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .expect("insert graph");
}

#[derive(Debug, Clone)]
pub struct NodeSeed {
    pub id: String,
    pub user_id: String,
    pub graph_id: String,
    pub mastery_level: String,
    pub last_review_at: Option<String>,
    pub next_review_at: Option<String>,
    pub review_stats: String,
    pub created_at: String,
    pub deleted: bool,
}

impl NodeSeed {
    pub fn new(id: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            user_id: ALICE.to_string(),
            graph_id: GRAPH.to_string(),
            mastery_level: "not_started".to_string(),
            last_review_at: None,
            next_review_at: None,
            review_stats: "{}".to_string(),
            created_at: format_storage(created_at),
            deleted: false,
        }
    }

    pub fn owner(mut self, user_id: &str, graph_id: &str) -> Self {
        self.user_id = user_id.to_string();
        self.graph_id = graph_id.to_string();
        self
    }

    pub fn graph(mut self, graph_id: &str) -> Self {
        self.graph_id = graph_id.to_string();
        self
    }

    pub fn mastery(mut self, level: &str) -> Self {
        self.mastery_level = level.to_string();
        self
    }

    pub fn reviewed(mut self, last: DateTime<Utc>, next: DateTime<Utc>) -> Self {
        self.last_review_at = Some(format_storage(last));
        self.next_review_at = Some(format_storage(next));
        self
    }

    pub fn raw_schedule(mut self, last: Option<&str>, next: Option<&str>) -> Self {
        self.last_review_at = last.map(str::to_string);
        self.next_review_at = next.map(str::to_string);
        self
    }

    pub fn stats(mut self, json: &str) -> Self {
        self.review_stats = json.to_string();
        self
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    pub async fn insert(self, pool: &SqlitePool) {
        sqlx::query(
            r#"
            INSERT INTO "memory_nodes"
              ("id","graph_id","user_id","node_type","title","mastery_level",
               "last_review_at","next_review_at","review_stats","created_at","deleted_at")
            VALUES (?1, ?2, ?3, 'CONCEPT', ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&self.id)
        .bind(&self.graph_id)
        .bind(&self.user_id)
        .bind(format!("Node {}", self.id))
        .bind(&self.mastery_level)
        .bind(&self.last_review_at)
        .bind(&self.next_review_at)
        .bind(&self.review_stats)
        .bind(&self.created_at)
        .bind(self.deleted.then(|| self.created_at.clone()))
        .execute(pool)
        .await
        .expect("insert node");
    }
}

pub async fn review_log_count(pool: &SqlitePool, node_id: &str) -> i64 {
    sqlx::query_scalar(r#"SELECT COUNT(*) FROM "review_logs" WHERE "node_id" = ?1"#)
        .bind(node_id)
        .fetch_one(pool)
        .await
        .expect("count review logs")
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response: Response<Body> = app.oneshot(request).await.expect("request failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
