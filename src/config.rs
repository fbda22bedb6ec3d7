// src/config.rs

use dotenvy::dotenv;
use std::env;

/// Maximum scored attempts a teacher gets per quiz generation.
pub const MAX_ATTEMPTS: i64 = 3;

/// Minimum score (percentage) that counts as a pass.
pub const PASSING_SCORE: f64 = 70.0;

/// Questions generated for each content quiz.
pub const QUIZ_QUESTION_COUNT: usize = 5;

/// Questions appended to the weekly checkpoint quiz per uploaded file.
pub const CHECKPOINT_QUESTIONS_PER_FILE: usize = 2;

/// Cumulative pass counts at which the report-card level steps up.
pub const INTERMEDIATE_PASS_THRESHOLD: i64 = 5;
pub const ADVANCED_PASS_THRESHOLD: i64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let admin_username = env::var("ADMIN_USERNAME").ok();
        let admin_password = env::var("ADMIN_PASSWORD").ok();

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_username,
            admin_password,
        }
    }
}
