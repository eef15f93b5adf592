use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

mod common;

use common::{
    get, post_json, review_log_count, seed_session, send, NodeSeed, TestContext, ALICE,
    ALICE_TOKEN, BOB, BOB_TOKEN, GRAPH, OTHER_GRAPH,
};

#[tokio::test]
async fn health_endpoints_report_database() {
    let ctx = TestContext::new().await;

    let (status, body) = send(ctx.app(), get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");

    let (status, body) = send(ctx.app(), get("/health/ready", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _) = send(ctx.app(), get("/health/live", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let ctx = TestContext::new().await;
    let (status, body) = send(ctx.app(), get("/api/v1/nope", Some(ALICE_TOKEN))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn requests_without_valid_session_are_rejected() {
    let ctx = TestContext::new().await;

    let (status, body) = send(ctx.app(), get("/api/v1/reviews/queue", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = send(ctx.app(), get("/api/v1/reviews/queue", Some("forged"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    seed_session(ctx.pool(), ALICE, "stale", Some(Utc::now() - Duration::hours(1))).await;
    let (status, _) = send(ctx.app(), get("/api/v1/reviews/queue", Some("stale"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cookie_session_is_accepted() {
    let ctx = TestContext::new().await;
    let request = axum::http::Request::builder()
        .uri("/api/v1/reviews/statistics")
        .header("Cookie", format!("auth_token={ALICE_TOKEN}"))
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, body) = send(ctx.app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_nodes"], 0);
}

#[tokio::test]
async fn submit_first_perfect_review() {
    let ctx = TestContext::new().await;
    NodeSeed::new("n1", Utc::now() - Duration::days(3))
        .insert(ctx.pool())
        .await;

    let (status, body) = send(
        ctx.app(),
        post_json(
            "/api/v1/reviews/n1",
            Some(ALICE_TOKEN),
            json!({"quality": 5, "review_duration": 42}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["node_id"], "n1");
    assert_eq!(body["mastery_level"], "familiar");
    assert_eq!(body["interval_days"], 1);
    assert_eq!(body["repetitions"], 1);
    assert!((body["easiness"].as_f64().unwrap() - 2.6).abs() < 1e-9);
    assert!(body["next_review_at"].as_str().unwrap().ends_with('Z'));
    assert_eq!(review_log_count(ctx.pool(), "n1").await, 1);

    let (status, history) = send(
        ctx.app(),
        get("/api/v1/reviews/history/n1", Some(ALICE_TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["total"], 1);
    let log = &history["logs"][0];
    assert_eq!(log["review_mode"], "manual");
    assert_eq!(log["mastery_feedback"], "remembered");
    assert_eq!(log["time_spent_seconds"], 42);
    assert_eq!(log["node_state_snapshot"]["mastery_before"], "not_started");
    assert_eq!(log["node_state_snapshot"]["mastery_after"], "familiar");
}

#[tokio::test]
async fn submit_validates_input() {
    let ctx = TestContext::new().await;
    NodeSeed::new("n1", Utc::now()).insert(ctx.pool()).await;

    for body in [
        json!({"quality": 6, "review_duration": 1}),
        json!({"quality": -1, "review_duration": 1}),
        json!({"quality": 3, "review_duration": -5}),
    ] {
        let (status, resp) = send(
            ctx.app(),
            post_json("/api/v1/reviews/n1", Some(ALICE_TOKEN), body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["code"], "VALIDATION_ERROR");
    }

    let (status, resp) = send(
        ctx.app(),
        post_json(
            "/api/v1/reviews/n1",
            Some(ALICE_TOKEN),
            json!({"quality": 3, "review_duration": 1, "mode": "cram"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["code"], "INVALID_MODE");
    assert_eq!(review_log_count(ctx.pool(), "n1").await, 0);
}

#[tokio::test]
async fn malformed_submission_body_is_a_validation_error() {
    let ctx = TestContext::new().await;
    NodeSeed::new("n1", Utc::now()).insert(ctx.pool()).await;

    for body in [
        json!({"quality": "high", "review_duration": 1}),
        json!({"quality": 2.5}),
        json!({"review_duration": 10}),
    ] {
        let (status, resp) = send(
            ctx.app(),
            post_json("/api/v1/reviews/n1", Some(ALICE_TOKEN), body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["success"], false);
        assert_eq!(resp["code"], "VALIDATION_ERROR");
    }

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/v1/reviews/n1")
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {ALICE_TOKEN}"))
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, resp) = send(ctx.app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["code"], "VALIDATION_ERROR");
    assert_eq!(review_log_count(ctx.pool(), "n1").await, 0);

    let (status, _) = send(
        ctx.app(),
        post_json("/api/v1/reviews/n1", None, json!({"quality": "high"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn other_users_nodes_look_missing() {
    let ctx = TestContext::new().await;
    NodeSeed::new("bobs", Utc::now())
        .owner(BOB, "graph-bob")
        .insert(ctx.pool())
        .await;

    let (status, body) = send(
        ctx.app(),
        post_json(
            "/api/v1/reviews/bobs",
            Some(ALICE_TOKEN),
            json!({"quality": 4, "review_duration": 10}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send(
        ctx.app(),
        get("/api/v1/reviews/forgetting-index/bobs", Some(ALICE_TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        ctx.app(),
        get("/api/v1/reviews/forgetting-index/bobs", Some(BOB_TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        ctx.app(),
        get("/api/v1/reviews/forgetting-index/missing", Some(ALICE_TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn forgetting_index_for_reviewed_and_fresh_nodes() {
    let ctx = TestContext::new().await;
    let now = Utc::now();
    NodeSeed::new("overdue", now - Duration::days(30))
        .mastery("learning")
        .reviewed(now - Duration::days(20), now - Duration::days(10))
        .stats(r#"{"repetitions":1,"easiness":2.5,"interval":10,"total_reviews":1}"#)
        .insert(ctx.pool())
        .await;
    NodeSeed::new("fresh", now).insert(ctx.pool()).await;

    let (status, body) = send(
        ctx.app(),
        get("/api/v1/reviews/forgetting-index/overdue", Some(ALICE_TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reviewed"], true);
    assert_eq!(body["forgetting_index"], 1.0);
    assert_eq!(body["forgetting_color"], "#F44336");
    assert_eq!(body["mastery_level"], "learning");

    let (status, body) = send(
        ctx.app(),
        get("/api/v1/reviews/forgetting-index/fresh", Some(ALICE_TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reviewed"], false);
    assert_eq!(body["forgetting_index"], 0.8);
    assert!(body["last_review_at"].is_null());
}

#[tokio::test]
async fn queue_defaults_to_spaced_and_rejects_unknown_mode() {
    let ctx = TestContext::new().await;
    let now = Utc::now();
    NodeSeed::new("due", now - Duration::days(5))
        .mastery("learning")
        .reviewed(now - Duration::days(3), now - Duration::hours(2))
        .insert(ctx.pool())
        .await;
    NodeSeed::new("later", now - Duration::days(5))
        .mastery("familiar")
        .reviewed(now - Duration::days(1), now + Duration::days(4))
        .insert(ctx.pool())
        .await;
    NodeSeed::new("new", now - Duration::days(1))
        .insert(ctx.pool())
        .await;

    let (status, body) = send(ctx.app(), get("/api/v1/reviews/queue", Some(ALICE_TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "spaced");
    assert_eq!(body["total"], 2);
    let ids: Vec<&str> = body["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["node_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["new", "due"]);
    assert_eq!(body["nodes"][0]["forgetting_index"], 0.8);
    assert_eq!(body["nodes"][0]["title"], "Node new");

    let (status, body) = send(
        ctx.app(),
        get("/api/v1/reviews/queue?mode=sideways", Some(ALICE_TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_MODE");

    for limit in ["0", "101"] {
        let (status, body) = send(
            ctx.app(),
            get(&format!("/api/v1/reviews/queue?limit={limit}"), Some(ALICE_TOKEN)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn queue_and_statistics_respect_graph_filter() {
    let ctx = TestContext::new().await;
    let now = Utc::now();
    NodeSeed::new("a", now - Duration::days(2)).insert(ctx.pool()).await;
    NodeSeed::new("b", now - Duration::days(1))
        .graph(OTHER_GRAPH)
        .mastery("mastered")
        .insert(ctx.pool())
        .await;

    let (_, body) = send(
        ctx.app(),
        get(
            &format!("/api/v1/reviews/queue?mode=graph_traversal&graph_id={OTHER_GRAPH}"),
            Some(ALICE_TOKEN),
        ),
    )
    .await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["nodes"][0]["node_id"], "b");

    let (status, body) = send(
        ctx.app(),
        get(&format!("/api/v1/reviews/statistics?graph_id={GRAPH}"), Some(ALICE_TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_nodes"], 1);
    assert_eq!(body["mastery_distribution"]["not_started"], 1);
    assert_eq!(body["mastery_rate"], 0.0);

    let (_, body) = send(ctx.app(), get("/api/v1/reviews/statistics", Some(ALICE_TOKEN))).await;
    assert_eq!(body["total_nodes"], 2);
    assert_eq!(body["mastery_rate"], 50.0);
}

#[tokio::test]
async fn soft_deleted_nodes_are_invisible() {
    let ctx = TestContext::new().await;
    NodeSeed::new("gone", Utc::now()).deleted().insert(ctx.pool()).await;

    let (status, _) = send(
        ctx.app(),
        post_json(
            "/api/v1/reviews/gone",
            Some(ALICE_TOKEN),
            json!({"quality": 4, "review_duration": 3}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(
        ctx.app(),
        get("/api/v1/reviews/queue?mode=random", Some(ALICE_TOKEN)),
    )
    .await;
    assert_eq!(body["total"], 0);

    let (_, body) = send(ctx.app(), get("/api/v1/reviews/statistics", Some(ALICE_TOKEN))).await;
    assert_eq!(body["total_nodes"], 0);
}
