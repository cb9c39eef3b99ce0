// tests/api_tests.rs

use exam_backend::{config::Config, routes, state::AppState};
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    // Note: For Postgres, you must have a running database.
    // We'll read from DATABASE_URL environment variable.
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    // 1. Create a pool
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    // 2. Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    // 3. Create test configuration and state
    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState { pool, config };

    // 4. Create the router with the app state
    let app = routes::create_router(state);

    // 5. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 6. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

/// Registers a user with the given role and returns a login token.
async fn register_and_login(
    client: &reqwest::Client,
    address: &str,
    role: &str,
) -> (String, String) {
    let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";

    let resp = client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "password": password,
            "role": role
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(resp.status().as_u16(), 201);

    let login_resp = client
        .post(&format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": username,
            "password": password
        }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");

    let token = login_resp["token"]
        .as_str()
        .expect("Token not found")
        .to_string();

    (username, token)
}

/// Creates one question and returns its id.
async fn create_question(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    category: &str,
    content: &str,
    options: &[(&str, bool)],
) -> i64 {
    let options: Vec<serde_json::Value> = options
        .iter()
        .map(|(text, is_correct)| serde_json::json!({"text": text, "is_correct": is_correct}))
        .collect();

    let resp = client
        .post(&format!("{}/api/questions", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "category": category,
            "content": content,
            "options": options
        }))
        .send()
        .await
        .expect("Create question failed");
    assert_eq!(resp.status().as_u16(), 201);

    let body: serde_json::Value = resp.json().await.unwrap();
    body["id"].as_i64().expect("Question id not found")
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(&format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let unique_name = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);

    // Act
    let response = client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": unique_name,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn register_fails_validation() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act: Send a username that is too short
    let response = client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "yo",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn question_routes_require_teacher_role() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let (_, student_token) = register_and_login(&client, &address, "student").await;

    let resp = client
        .post(&format!("{}/api/questions", address))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&serde_json::json!({
            "category": "math",
            "content": "What is 2 + 2?",
            "options": [
                {"text": "3", "is_correct": false},
                {"text": "4", "is_correct": true}
            ]
        }))
        .send()
        .await
        .expect("Request failed");

    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn question_update_rejects_two_correct_options() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, teacher_token) = register_and_login(&client, &address, "teacher").await;

    let marker = &uuid::Uuid::new_v4().to_string()[..8];
    let content = format!("Original prompt {}", marker);
    let question_id = create_question(
        &client,
        &address,
        &teacher_token,
        "validation",
        &content,
        &[("A", true), ("B", false)],
    )
    .await;

    // Act: update with two options both flagged correct
    let resp = client
        .put(&format!("{}/api/questions/{}", address, question_id))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .json(&serde_json::json!({
            "category": "validation",
            "content": "Changed prompt",
            "options": [
                {"text": "A", "is_correct": true},
                {"text": "B", "is_correct": true}
            ]
        }))
        .send()
        .await
        .expect("Request failed");

    assert_eq!(resp.status().as_u16(), 400);

    // Assert: the stored document is unchanged
    let listed: serde_json::Value = client
        .get(&format!("{}/api/questions?q={}", address, marker))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .send()
        .await
        .expect("List failed")
        .json()
        .await
        .unwrap();

    let found = listed
        .as_array()
        .unwrap()
        .iter()
        .find(|q| q["id"].as_i64() == Some(question_id))
        .expect("Question disappeared");
    assert_eq!(found["content"], content.as_str());
}

#[tokio::test]
async fn bulk_import_is_partial_success() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, teacher_token) = register_and_login(&client, &address, "teacher").await;

    let marker = &uuid::Uuid::new_v4().to_string()[..8];
    let valid_row = |n: u32| {
        serde_json::json!({
            "category": "imported",
            "content": format!("Imported question {} {}", n, marker),
            "options": ["A", "B", "C"],
            "correct_index": 1
        })
    };

    let resp = client
        .post(&format!("{}/api/questions/bulk", address))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .json(&serde_json::json!({
            "rows": [
                valid_row(1),
                valid_row(2),
                valid_row(3),
                valid_row(4),
                valid_row(5),
                // Missing prompt
                {
                    "category": "imported",
                    "content": "",
                    "options": ["A", "B"],
                    "correct_index": 1
                },
                // Correct index out of bounds
                {
                    "category": "imported",
                    "content": format!("Broken question {}", marker),
                    "options": ["A", "B"],
                    "correct_index": 5
                }
            ]
        }))
        .send()
        .await
        .expect("Bulk import failed");

    assert_eq!(resp.status().as_u16(), 200);
    let report: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(report["inserted_count"], 5);
    assert_eq!(report["error_count"], 2);
    assert_eq!(report["errors"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_exam_lifecycle() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // 1. A teacher builds a two-question exam (pass threshold 50%).
    let (_, teacher_token) = register_and_login(&client, &address, "teacher").await;
    let marker = &uuid::Uuid::new_v4().to_string()[..8];

    let q1 = create_question(
        &client,
        &address,
        &teacher_token,
        "math",
        &format!("What is 2 + 2? {}", marker),
        &[("3", false), ("4", true), ("5", false)],
    )
    .await;
    let q2 = create_question(
        &client,
        &address,
        &teacher_token,
        "math",
        &format!("What is 3 * 3? {}", marker),
        &[("6", false), ("9", true), ("12", false)],
    )
    .await;

    let exam_resp = client
        .post(&format!("{}/api/exams", address))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .json(&serde_json::json!({
            "title": format!("Math basics {}", marker),
            "category": "math",
            "duration_minutes": 30,
            "pass_percentage": 50.0,
            "question_ids": [q1, q2]
        }))
        .send()
        .await
        .expect("Create exam failed");
    assert_eq!(exam_resp.status().as_u16(), 201);
    let exam_id = exam_resp.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap();

    // 2. Register a student, then fan the exam out to all students.
    let (_, student_token) = register_and_login(&client, &address, "student").await;

    let assign_resp = client
        .post(&format!("{}/api/assignments", address))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .json(&serde_json::json!({"exam_id": exam_id}))
        .send()
        .await
        .expect("Assign failed");
    assert_eq!(assign_resp.status().as_u16(), 201);

    // 3. The student sees the exam in their assigned list.
    let assigned: serde_json::Value = client
        .get(&format!("{}/api/exams/assigned", address))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .expect("Assigned list failed")
        .json()
        .await
        .unwrap();
    let entry = assigned
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["exam_id"].as_i64() == Some(exam_id))
        .expect("Exam not in assigned list");
    assert_eq!(entry["status"], "pending");

    // 4. Start the exam. The payload must not leak the answer key.
    let start: serde_json::Value = client
        .get(&format!("{}/api/exams/start/{}", address, exam_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .expect("Start failed")
        .json()
        .await
        .unwrap();

    assert_eq!(start["total_questions"], 2);
    let questions = start["questions"].as_array().unwrap();
    for q in questions {
        for opt in q["options"].as_array().unwrap() {
            assert!(
                opt.get("is_correct").is_none(),
                "Answer key leaked to the exam-taking client"
            );
        }
    }

    // Resolve option ids by display text (the client can't see correctness).
    let option_id = |question_id: i64, text: &str| -> i64 {
        questions
            .iter()
            .find(|q| q["id"].as_i64() == Some(question_id))
            .and_then(|q| {
                q["options"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .find(|o| o["text"] == text)
            })
            .and_then(|o| o["id"].as_i64())
            .expect("Option not found")
    };

    // 5. Submit: Q1 right ("4"), Q2 wrong ("6"). 1/2 = 50% which meets the
    // inclusive pass threshold.
    let mut answers = HashMap::new();
    answers.insert(q1, option_id(q1, "4"));
    answers.insert(q2, option_id(q2, "6"));

    let submit_resp = client
        .post(&format!("{}/api/exams/submit/{}", address, exam_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&serde_json::json!({ "answers": answers, "time_taken": 42 }))
        .send()
        .await
        .expect("Submit failed");
    assert_eq!(submit_resp.status().as_u16(), 200);

    let result: serde_json::Value = submit_resp.json().await.unwrap();
    assert_eq!(result["score"], 1);
    assert_eq!(result["total_questions"], 2);
    assert_eq!(result["correct_answers"], 1);
    assert_eq!(result["wrong_answers"], 1);
    assert_eq!(result["percentage"], 50.0);
    assert_eq!(result["result"], "pass");

    // 6. A second submission is rejected and must not change the result.
    let resubmit = client
        .post(&format!("{}/api/exams/submit/{}", address, exam_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&serde_json::json!({ "answers": {} }))
        .send()
        .await
        .expect("Resubmit failed");
    assert_eq!(resubmit.status().as_u16(), 409);

    // 7. The review endpoint reproduces the submitted/correct pairs.
    let review: serde_json::Value = client
        .get(&format!("{}/api/exams/review/{}", address, exam_id))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .expect("Review failed")
        .json()
        .await
        .unwrap();

    assert_eq!(review["score"], 1);
    let entries = review["review"].as_array().unwrap();
    assert_eq!(entries.len(), 2);

    let q1_entry = entries
        .iter()
        .find(|e| e["question_id"].as_i64() == Some(q1))
        .unwrap();
    assert_eq!(q1_entry["selected_option"], "4");
    assert_eq!(q1_entry["correct_option"], "4");
    assert_eq!(q1_entry["is_correct"], true);

    let q2_entry = entries
        .iter()
        .find(|e| e["question_id"].as_i64() == Some(q2))
        .unwrap();
    assert_eq!(q2_entry["selected_option"], "6");
    assert_eq!(q2_entry["correct_option"], "9");
    assert_eq!(q2_entry["is_correct"], false);

    // The stored per-question records round-trip with their option ids.
    let records = review["answers"].as_array().unwrap();
    let q1_record = records
        .iter()
        .find(|r| r["question_id"].as_i64() == Some(q1))
        .unwrap();
    assert_eq!(q1_record["selected_option_id"], q1_record["correct_option_id"]);
    assert_eq!(q1_record["is_correct"], true);
    let q2_record = records
        .iter()
        .find(|r| r["question_id"].as_i64() == Some(q2))
        .unwrap();
    assert_eq!(q2_record["selected_option_id"].as_i64(), Some(0));
    assert_eq!(q2_record["correct_option_id"].as_i64(), Some(1));
    assert_eq!(q2_record["is_correct"], false);

    // 8. The attempt shows up in the student's history with stored timing.
    let history: serde_json::Value = client
        .get(&format!("{}/api/exams/history", address))
        .header("Authorization", format!("Bearer {}", student_token))
        .send()
        .await
        .expect("History failed")
        .json()
        .await
        .unwrap();

    let row = history
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["exam_id"].as_i64() == Some(exam_id))
        .expect("Attempt missing from history");
    assert_eq!(row["score"], 1);
    assert_eq!(row["passed"], true);
    assert_eq!(row["time_taken_seconds"], 42);
}
