//! Integration tests for the assessment REST surface.
//!
//! Each test spins up an Axum server on a random port backed by a real
//! libSQL database and drives the HTTP contract with reqwest.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use focus_protocol::assessment::AssessmentManager;
use focus_protocol::assessment::routes::{USER_ID_HEADER, assessment_routes};
use focus_protocol::store::{Database, LibSqlBackend};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Start an Axum server on a random port over `db`.
async fn start_server(db: Arc<dyn Database>) -> u16 {
    let manager = Arc::new(AssessmentManager::new(db, Some(42)));
    let app = assessment_routes(manager);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    port
}

async fn memory_server() -> u16 {
    start_server(Arc::new(LibSqlBackend::new_memory().await.unwrap())).await
}

struct Client {
    http: reqwest::Client,
    base: String,
    user: String,
}

impl Client {
    fn new(port: u16, user: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: format!("http://127.0.0.1:{port}"),
            user: user.to_string(),
        }
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self
            .http
            .get(format!("{}{path}", self.base))
            .header(USER_ID_HEADER, &self.user)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .http
            .post(format!("{}{path}", self.base))
            .header(USER_ID_HEADER, &self.user)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }
}

/// Stage submissions for the full end-to-end scenario.
fn scenario() -> Vec<Value> {
    vec![
        json!({ "baseline_anxiety": 9 }),
        json!({ "procrastination_frequency": "I've lost count" }),
        json!({ "accomplishments": ["Ran a marathon", "Built a shed", "Passed the bar"] }),
        json!({ "dopamine_response": 9 }),
        json!({ "trigger_type": "Projects that seem too complex" }),
        json!({ "avoidance_pattern": "Endless research" }),
        json!({ "work_environment": "Library" }),
        json!({ "motivation_style": "Deadlines" }),
        json!({ "reward_preferences": {
            "Checking items off a list": 5,
            "Beating a personal record": 4,
            "External recognition/praise": 2,
            "Learning something new": 4,
            "Helping others": 3,
            "Financial rewards": 1,
            "Completing challenges": 5
        }}),
        json!({ "session_length": "15-25 minutes" }),
        json!({ "biggest_project": "Launch the podcast" }),
        json!({ "current_frustration": "Editing never ends" }),
        json!({ "biggest_success": "Ran a marathon", "success_factors": "Training plan" }),
        json!({
            "first_action": "Record intro",
            "second_action": "Pick hosting",
            "third_action": "Draft episode list",
            "completion_attempted": true,
            "resistance_level": 9
        }),
    ]
}

// ── Health ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn rest_health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let port = memory_server().await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "focus-protocol");
    })
    .await
    .expect("test timed out");
}

// ── Assessment flow ─────────────────────────────────────────────────────

#[tokio::test]
async fn rest_full_assessment_flow() {
    timeout(TEST_TIMEOUT, async {
        let port = memory_server().await;
        let client = Client::new(port, "alice");

        let (status, body) = client.get("/api/assessment/status").await;
        assert_eq!(status, 200);
        assert_eq!(body["current_stage"], 1);
        assert_eq!(body["completed"], false);

        for (i, stage) in scenario().into_iter().enumerate() {
            if i == 2 {
                let (status, body) = client
                    .post("/api/assessment/input", json!({ "text": "R" }))
                    .await;
                assert_eq!(status, 200);
                assert_eq!(body["capture_running"], true);
            }
            let (status, body) = client.post("/api/assessment/advance", stage).await;
            assert_eq!(status, 200, "stage {} rejected: {body}", i + 1);
        }

        let (_, body) = client.get("/api/assessment/status").await;
        assert_eq!(body["current_stage"], 14);
        assert!(body["answers"]["accomplishment_capture_millis"].is_u64());

        let (status, outcome) = client.post("/api/assessment/complete", json!({})).await;
        assert_eq!(status, 201);
        assert_eq!(outcome["profile"]["primary_type"], "Complexity Overwhelm");
        assert_eq!(outcome["profile"]["procrastination_level"], "HIGH");
        assert_eq!(outcome["profile"]["dopamine_sensitivity"], "RESPONSIVE");
        assert_eq!(outcome["profile"]["complexity_tolerance"], "LOW");
        assert_eq!(outcome["profile"]["motivation_sustainability"], "SPRINT");
        assert_eq!(outcome["profile"]["success_probability"], 50);
        assert_eq!(outcome["program"]["work_duration"], 25);
        assert_eq!(outcome["program"]["break_duration"], 5);
        assert_eq!(outcome["stats"]["total_points"], 100);
        assert_eq!(outcome["point_rewards"].as_array().unwrap().len(), 5);

        let (status, profile) = client.get("/api/assessment/profile").await;
        assert_eq!(status, 200);
        assert_eq!(profile, outcome["profile"]);

        // Completed sessions are frozen.
        let (status, _) = client.post("/api/assessment/complete", json!({})).await;
        assert_eq!(status, 409);
        let (status, _) = client
            .post("/api/assessment/advance", json!({ "baseline_anxiety": 1 }))
            .await;
        assert_eq!(status, 422);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_missing_field_keeps_stage() {
    timeout(TEST_TIMEOUT, async {
        let port = memory_server().await;
        let client = Client::new(port, "bob");

        let (status, body) = client
            .post("/api/assessment/advance", json!({ "dopamine_response": 4 }))
            .await;
        assert_eq!(status, 422);
        assert!(body["error"].as_str().unwrap().contains("baseline_anxiety"));

        let (_, body) = client.get("/api/assessment/status").await;
        assert_eq!(body["current_stage"], 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_profile_404_until_complete() {
    timeout(TEST_TIMEOUT, async {
        let port = memory_server().await;
        let client = Client::new(port, "carol");

        let (status, _) = client.get("/api/assessment/profile").await;
        assert_eq!(status, 404);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_session_survives_restart() {
    timeout(TEST_TIMEOUT, async {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("focus.db");

        let port = start_server(Arc::new(LibSqlBackend::new_local(&path).await.unwrap())).await;
        let client = Client::new(port, "dana");
        for stage in scenario().into_iter().take(3) {
            let (status, _) = client.post("/api/assessment/advance", stage).await;
            assert_eq!(status, 200);
        }

        // Fresh server, same file.
        let port = start_server(Arc::new(LibSqlBackend::new_local(&path).await.unwrap())).await;
        let client = Client::new(port, "dana");
        let (_, body) = client.get("/api/assessment/status").await;
        assert_eq!(body["current_stage"], 4);
        assert_eq!(body["answers"]["baseline_anxiety"], 9);
        assert_eq!(
            body["answers"]["accomplishments"].as_array().unwrap().len(),
            3
        );
    })
    .await
    .expect("test timed out");
}

// ── Reward schedules ────────────────────────────────────────────────────

#[tokio::test]
async fn rest_reward_schedule_lifecycle() {
    timeout(TEST_TIMEOUT, async {
        let port = memory_server().await;
        let client = Client::new(port, "erin");

        let (status, _) = client.post("/api/rewards/schedule/regenerate", json!({})).await;
        assert_eq!(status, 404);

        let (status, created) = client
            .post(
                "/api/rewards/schedule",
                json!({
                    "enjoyable_activities": ["Surfing", "Baking"],
                    "mood_boosters": ["Karaoke"],
                    "stress_level": 6
                }),
            )
            .await;
        assert_eq!(status, 201);
        let slots = created["schedule"]["rewards"].as_array().unwrap();
        assert_eq!(slots.len(), 14);

        let (status, regenerated) = client
            .post("/api/rewards/schedule/regenerate", json!({}))
            .await;
        assert_eq!(status, 200);
        let before: Vec<(Value, Value)> = slots
            .iter()
            .map(|s| (s["id"].clone(), s["trigger_value"].clone()))
            .collect();
        let after: Vec<(Value, Value)> = regenerated["schedule"]["rewards"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| (s["id"].clone(), s["trigger_value"].clone()))
            .collect();
        assert_eq!(before, after);

        let (status, view) = client.get("/api/rewards/schedule?completed=0").await;
        assert_eq!(status, 200);
        assert!(view["eligible"].as_array().unwrap().is_empty());

        let (_, view) = client.get("/api/rewards/schedule?completed=12").await;
        assert_eq!(view["eligible"].as_array().unwrap().len(), 14);
    })
    .await
    .expect("test timed out");
}
