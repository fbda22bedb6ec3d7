// tests/api_tests.rs

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use trainhub::{
    config::Config, routes, services::generator::OutlineQuizGenerator, state::AppState,
    utils::hash::hash_password,
};

const SAMPLE_TEXT: &str = "Classroom routines reduce lost instruction time at the start of lessons. \
    Clear behavioural expectations should be set in the first week of term. \
    Positive reinforcement works better than sanctions for most learners. \
    Seating plans are a low-effort tool for managing disruptive pairings. \
    Transitions between activities are where most disruption begins.";

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    // Note: For Postgres, you must have a running database.
    // We'll read from DATABASE_URL environment variable.
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    // 1. Create a pool (several connections so concurrent requests in a
    //    test really overlap instead of queueing on the pool)
    let pool = PgPoolOptions::new()
        .max_connections(5)
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

    let state = AppState {
        pool,
        config,
        generator: Arc::new(OutlineQuizGenerator::new()),
    };

    // 4. Create the router with the app state
    let app = routes::create_router(state);

    // 5. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 6. Spawn the server in the background (ConnectInfo feeds the
    //    per-IP rate limiter)
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    address
}

async fn test_pool() -> sqlx::PgPool {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test DB")
}

/// Seeds an admin directly in the database and returns a bearer token.
async fn admin_token(address: &str, client: &reqwest::Client, pool: &sqlx::PgPool) -> String {
    let username = format!("adm_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";
    let hashed = hash_password(password).unwrap();

    sqlx::query("INSERT INTO users (username, password, role) VALUES ($1, $2, 'admin')")
        .bind(&username)
        .bind(&hashed)
        .execute(pool)
        .await
        .unwrap();

    login(address, client, &username, password).await
}

async fn register_teacher(address: &str, client: &reqwest::Client) -> (String, String) {
    let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "password": password,
            "full_name": "Test Teacher"
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);

    let token = login(address, client, &username, password).await;
    (username, token)
}

async fn login(address: &str, client: &reqwest::Client, username: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/api/auth/login", address))
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

    response["token"].as_str().expect("Token not found").to_string()
}

/// Reads the answer key of a generation straight from the database.
async fn answer_key(pool: &sqlx::PgPool, generation_id: i64) -> Vec<serde_json::Value> {
    let questions: serde_json::Value =
        sqlx::query_scalar("SELECT questions FROM quiz_generations WHERE id = $1")
            .bind(generation_id)
            .fetch_one(pool)
            .await
            .unwrap();
    questions.as_array().unwrap().clone()
}

fn all_correct(questions: &[serde_json::Value]) -> HashMap<String, String> {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| (i.to_string(), q["answer"].as_str().unwrap().to_string()))
        .collect()
}

fn all_wrong(questions: &[serde_json::Value]) -> HashMap<String, String> {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let answer = q["answer"].as_str().unwrap();
            let wrong = q["options"]
                .as_array()
                .unwrap()
                .iter()
                .map(|o| o.as_str().unwrap())
                .find(|o| *o != answer)
                .unwrap();
            (i.to_string(), wrong.to_string())
        })
        .collect()
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_fails_validation() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act: Send a username that is too short
    let response = client
        .post(format!("{}/api/auth/register", address))
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
async fn portal_requires_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/weeks", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn teacher_cannot_reach_admin_routes() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = register_teacher(&address, &client).await;

    let response = client
        .get(format!("{}/api/admin/users", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn upload_generates_content_and_checkpoint_quizzes() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;
    let token = admin_token(&address, &client, &pool).await;

    let week: serde_json::Value = client
        .post(format!("{}/api/admin/weeks", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "name": "Classroom Management Techniques" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let week_id = week["id"].as_i64().unwrap();

    let upload: serde_json::Value = client
        .post(format!("{}/api/admin/weeks/{}/files", address, week_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "title": "Presentation on Classroom Control",
            "filename": "classroom-control.pdf",
            "extracted_text": SAMPLE_TEXT,
            "source_url": "https://files.example.org/classroom-control.pdf"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // The storage location round-trips through the file object.
    assert_eq!(
        upload["file"]["source_url"],
        "https://files.example.org/classroom-control.pdf"
    );

    let content_generation = upload["content_generation_id"].as_i64().unwrap();
    let checkpoint_generation = upload["checkpoint_generation_id"].as_i64().unwrap();

    let content_questions = answer_key(&pool, content_generation).await;
    assert_eq!(content_questions.len(), 5);

    let checkpoint_questions = answer_key(&pool, checkpoint_generation).await;
    assert_eq!(checkpoint_questions.len(), 2);

    // A second upload grows the checkpoint quiz as a new version.
    let upload2: serde_json::Value = client
        .post(format!("{}/api/admin/weeks/{}/files", address, week_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "title": "Student Engagement Strategies",
            "filename": "engagement.pdf",
            "extracted_text": SAMPLE_TEXT
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let checkpoint2 = upload2["checkpoint_generation_id"].as_i64().unwrap();
    assert_ne!(checkpoint2, checkpoint_generation);
    let checkpoint2_questions = answer_key(&pool, checkpoint2).await;
    assert_eq!(checkpoint2_questions.len(), 4);

    // A malformed storage location is refused outright.
    let response = client
        .post(format!("{}/api/admin/weeks/{}/files", address, week_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "title": "Broken Link",
            "filename": "broken.pdf",
            "extracted_text": SAMPLE_TEXT,
            "source_url": "not a url"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn attempt_gate_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;
    let admin = admin_token(&address, &client, &pool).await;

    // Admin sets up one week with two files.
    let week: serde_json::Value = client
        .post(format!("{}/api/admin/weeks", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&serde_json::json!({ "name": "Assessment and Evaluation Methods" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let week_id = week["id"].as_i64().unwrap();

    let mut file_ids = Vec::new();
    let mut generation_ids = Vec::new();
    for title in ["Formative Assessment", "Summative Assessment"] {
        let upload: serde_json::Value = client
            .post(format!("{}/api/admin/weeks/{}/files", address, week_id))
            .header("Authorization", format!("Bearer {}", admin))
            .json(&serde_json::json!({
                "title": title,
                "filename": format!("{}.pdf", title.to_lowercase().replace(' ', "-")),
                "extracted_text": SAMPLE_TEXT
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        file_ids.push(upload["file"]["id"].as_i64().unwrap());
        generation_ids.push(upload["content_generation_id"].as_i64().unwrap());
    }

    let (username, teacher) = register_teacher(&address, &client).await;
    let teacher_id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
        .bind(&username)
        .fetch_one(&pool)
        .await
        .unwrap();

    // The first file may not be the program's first overall (other tests
    // share the database), so unlock it explicitly.
    let response = client
        .post(format!("{}/api/admin/progress/grant", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&serde_json::json!({ "teacher_id": teacher_id, "file_id": file_ids[0] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // Second file is still locked: quiz fetch is refused.
    let response = client
        .get(format!("{}/api/files/{}/quiz", address, file_ids[1]))
        .header("Authorization", format!("Bearer {}", teacher))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // Fetch the first quiz; answers must not leak through the public DTO.
    let quiz: serde_json::Value = client
        .get(format!("{}/api/files/{}/quiz", address, file_ids[0]))
        .header("Authorization", format!("Bearer {}", teacher))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(quiz["generation_id"].as_i64().unwrap(), generation_ids[0]);
    assert_eq!(quiz["attempts_remaining"].as_i64().unwrap(), 3);
    assert!(quiz["questions"][0].get("answer").is_none());

    let questions = answer_key(&pool, generation_ids[0]).await;
    let wrong = all_wrong(&questions);

    // Three failing attempts.
    for expected_attempt in 1..=3 {
        let result: serde_json::Value = client
            .post(format!("{}/api/quiz/{}/submit", address, generation_ids[0]))
            .header("Authorization", format!("Bearer {}", teacher))
            .json(&serde_json::json!({ "answers": wrong }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(result["passed"], false);
        assert_eq!(result["attempt_number"].as_i64().unwrap(), expected_attempt);
    }

    // Fourth submission hits the cap.
    let response = client
        .post(format!("{}/api/quiz/{}/submit", address, generation_ids[0]))
        .header("Authorization", format!("Bearer {}", teacher))
        .json(&serde_json::json!({ "answers": wrong }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let attempt_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM attempts WHERE teacher_id = $1 AND generation_id = $2",
    )
    .bind(teacher_id)
    .bind(generation_ids[0])
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(attempt_count, 3);

    // Regeneration mints a fresh generation with its own counter.
    let regenerated: serde_json::Value = client
        .post(format!(
            "{}/api/quiz/{}/regenerate",
            address, generation_ids[0]
        ))
        .header("Authorization", format!("Bearer {}", teacher))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let new_generation = regenerated["generation_id"].as_i64().unwrap();
    assert_ne!(new_generation, generation_ids[0]);
    assert_eq!(regenerated["attempts_remaining"].as_i64().unwrap(), 3);

    // Regenerating twice is refused.
    let response = client
        .post(format!(
            "{}/api/quiz/{}/regenerate",
            address, generation_ids[0]
        ))
        .header("Authorization", format!("Bearer {}", teacher))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // The file quiz now resolves to the regenerated set.
    let quiz: serde_json::Value = client
        .get(format!("{}/api/files/{}/quiz", address, file_ids[0]))
        .header("Authorization", format!("Bearer {}", teacher))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(quiz["generation_id"].as_i64().unwrap(), new_generation);

    // Pass the regenerated quiz.
    let new_questions = answer_key(&pool, new_generation).await;
    let correct = all_correct(&new_questions);
    let result: serde_json::Value = client
        .post(format!("{}/api/quiz/{}/submit", address, new_generation))
        .header("Authorization", format!("Bearer {}", teacher))
        .json(&serde_json::json!({ "answers": correct }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["passed"], true);
    assert_eq!(result["score"].as_f64().unwrap(), 100.0);

    // Passing completed the file and unlocked the next one.
    let status: String = sqlx::query_scalar(
        "SELECT status FROM content_progress WHERE teacher_id = $1 AND file_id = $2",
    )
    .bind(teacher_id)
    .bind(file_ids[0])
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(status, "completed");

    let next_status: String = sqlx::query_scalar(
        "SELECT status FROM content_progress WHERE teacher_id = $1 AND file_id = $2",
    )
    .bind(teacher_id)
    .bind(file_ids[1])
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(next_status, "available");

    // Re-submitting after the pass is idempotent.
    let result: serde_json::Value = client
        .post(format!("{}/api/quiz/{}/submit", address, new_generation))
        .header("Authorization", format!("Bearer {}", teacher))
        .json(&serde_json::json!({ "answers": correct }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["already_passed"], true);

    let attempt_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM attempts WHERE teacher_id = $1 AND generation_id = $2",
    )
    .bind(teacher_id)
    .bind(new_generation)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(attempt_count, 1);

    // Report card: mean of 0, 0, 0, 100 over four attempts.
    let report: serde_json::Value = client
        .get(format!("{}/api/report-card", address))
        .header("Authorization", format!("Bearer {}", teacher))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["total_taken"].as_i64().unwrap(), 4);
    assert_eq!(report["total_passed"].as_i64().unwrap(), 1);
    assert_eq!(report["average_score"].as_f64().unwrap(), 25.0);
    assert_eq!(report["level"], "Beginner");

    // History under the old generation survives the regeneration.
    let history: serde_json::Value = client
        .get(format!("{}/api/quiz/{}/attempts", address, new_generation))
        .header("Authorization", format!("Bearer {}", teacher))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["attempts"].as_array().unwrap().len(), 4);
    assert_eq!(history["generation_chain"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn viewing_is_forward_only() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;
    let admin = admin_token(&address, &client, &pool).await;

    let week: serde_json::Value = client
        .post(format!("{}/api/admin/weeks", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&serde_json::json!({ "name": "Lesson Planning Essentials" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let week_id = week["id"].as_i64().unwrap();

    let mut file_ids = Vec::new();
    for title in ["Unit Plans", "Lesson Objectives"] {
        let upload: serde_json::Value = client
            .post(format!("{}/api/admin/weeks/{}/files", address, week_id))
            .header("Authorization", format!("Bearer {}", admin))
            .json(&serde_json::json!({
                "title": title,
                "filename": format!("{}.pdf", title.to_lowercase().replace(' ', "-")),
                "extracted_text": SAMPLE_TEXT
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        file_ids.push(upload["file"]["id"].as_i64().unwrap());
    }

    let (username, teacher) = register_teacher(&address, &client).await;
    let teacher_id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
        .bind(&username)
        .fetch_one(&pool)
        .await
        .unwrap();

    let response = client
        .post(format!("{}/api/admin/progress/grant", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&serde_json::json!({ "teacher_id": teacher_id, "file_id": file_ids[0] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // Viewing an available file moves it to viewed.
    let result: serde_json::Value = client
        .post(format!("{}/api/files/{}/view", address, file_ids[0]))
        .header("Authorization", format!("Bearer {}", teacher))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["status"], "viewed");

    // Viewing again is a no-op, not an error.
    let result: serde_json::Value = client
        .post(format!("{}/api/files/{}/view", address, file_ids[0]))
        .header("Authorization", format!("Bearer {}", teacher))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["status"], "viewed");

    // A locked file cannot be viewed.
    let response = client
        .post(format!("{}/api/files/{}/view", address, file_ids[1]))
        .header("Authorization", format!("Bearer {}", teacher))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // Once completed, a view never pulls the status back down.
    sqlx::query(
        "UPDATE content_progress SET status = 'completed' WHERE teacher_id = $1 AND file_id = $2",
    )
    .bind(teacher_id)
    .bind(file_ids[0])
    .execute(&pool)
    .await
    .unwrap();

    let result: serde_json::Value = client
        .post(format!("{}/api/files/{}/view", address, file_ids[0]))
        .header("Authorization", format!("Bearer {}", teacher))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["status"], "completed");
}

#[tokio::test]
async fn simultaneous_submissions_record_distinct_attempts() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;
    let admin = admin_token(&address, &client, &pool).await;

    let week: serde_json::Value = client
        .post(format!("{}/api/admin/weeks", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&serde_json::json!({ "name": "Differentiated Instruction" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let week_id = week["id"].as_i64().unwrap();

    let upload: serde_json::Value = client
        .post(format!("{}/api/admin/weeks/{}/files", address, week_id))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&serde_json::json!({
            "title": "Scaffolding Techniques",
            "filename": "scaffolding.pdf",
            "extracted_text": SAMPLE_TEXT
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let generation_id = upload["content_generation_id"].as_i64().unwrap();

    let (username, teacher) = register_teacher(&address, &client).await;
    let teacher_id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
        .bind(&username)
        .fetch_one(&pool)
        .await
        .unwrap();

    let questions = answer_key(&pool, generation_id).await;
    let wrong = all_wrong(&questions);

    // Two submissions land at the same time, as from a double-clicked
    // submit button. The generation row lock serializes them so each
    // gets its own attempt number.
    let first = client
        .post(format!("{}/api/quiz/{}/submit", address, generation_id))
        .header("Authorization", format!("Bearer {}", teacher))
        .json(&serde_json::json!({ "answers": wrong }))
        .send();
    let second = client
        .post(format!("{}/api/quiz/{}/submit", address, generation_id))
        .header("Authorization", format!("Bearer {}", teacher))
        .json(&serde_json::json!({ "answers": wrong }))
        .send();

    let (first, second) = tokio::join!(first, second);
    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first.status().as_u16(), 200);
    assert_eq!(second.status().as_u16(), 200);

    let attempt_numbers: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT attempt_number FROM attempts
        WHERE teacher_id = $1 AND generation_id = $2
        ORDER BY attempt_number
        "#,
    )
    .bind(teacher_id)
    .bind(generation_id)
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(attempt_numbers, vec![1, 2]);
}

#[tokio::test]
async fn reorder_renumbers_weeks_contiguously() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;
    let token = admin_token(&address, &client, &pool).await;

    for name in ["Reorder A", "Reorder B"] {
        let response = client
            .post(format!("{}/api/admin/weeks", address))
            .header("Authorization", format!("Bearer {}", token))
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
    }

    let weeks: Vec<serde_json::Value> = client
        .post(format!("{}/api/admin/weeks/reorder", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "week_number": 1, "new_position": 2 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Renumbering must leave a contiguous 1..=n sequence.
    for (index, week) in weeks.iter().enumerate() {
        assert_eq!(week["week_number"].as_i64().unwrap(), index as i64 + 1);
    }
}

#[tokio::test]
async fn certificate_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;
    let admin = admin_token(&address, &client, &pool).await;

    let batch: serde_json::Value = client
        .post(format!("{}/api/admin/batches", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&serde_json::json!({
            "name": format!("Batch {}", uuid::Uuid::new_v4()),
            "starts_on": "2026-09-01"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let batch_id = batch["id"].as_i64().unwrap();

    let (username, teacher) = register_teacher(&address, &client).await;
    let teacher_id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
        .bind(&username)
        .fetch_one(&pool)
        .await
        .unwrap();

    // Assign the teacher to the batch.
    let response = client
        .put(format!("{}/api/admin/users/{}", address, teacher_id))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&serde_json::json!({ "batch_id": batch_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .post(format!("{}/api/staff/certificates", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&serde_json::json!({
            "teacher_id": teacher_id,
            "batch_id": batch_id,
            "title": "Programme Completion"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    // Duplicate issue is a conflict.
    let response = client
        .post(format!("{}/api/staff/certificates", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&serde_json::json!({
            "teacher_id": teacher_id,
            "batch_id": batch_id,
            "title": "Programme Completion"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let mine: Vec<serde_json::Value> = client
        .get(format!("{}/api/certificates", address))
        .header("Authorization", format!("Bearer {}", teacher))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["title"], "Programme Completion");
}
