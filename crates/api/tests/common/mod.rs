//! Common test utilities for integration tests.
//!
//! The tests run against a real PostgreSQL database named by
//! `TEST_DATABASE_URL`; without it they return early.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use entries_export_api::{
    app::{create_app, AppState},
    config::Config,
    extractors::{API_KEY_HEADER, VIEW_ENTRIES},
};
use persistence::repositories::ApiKeyRepository;
use serde_json::Value;
use shared::crypto::{extract_key_prefix, sha256_hex};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

/// Referer the export AJAX gate accepts.
pub const EXPORT_REFERER: &str = "http://localhost/wp-admin/admin.php?page=forms-tools&view=export";

static KEY_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Create a test database pool, or `None` when no test database is configured.
pub async fn create_test_pool() -> Option<PgPool> {
    let database_url = std::env::var("TEST_DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    persistence::db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    Some(pool)
}

/// Test configuration writing export files under `tmp_dir`.
pub fn test_config(tmp_dir: &TempDir) -> Config {
    let tmp_dir = tmp_dir.path().to_string_lossy().to_string();
    Config::load_for_test(&[
        ("export.tmp_dir", tmp_dir.as_str()),
        ("export.transient_backend", "database"),
        ("export.entries_per_step", "2"),
        ("export.debug", "true"),
    ])
    .expect("Failed to build test config")
}

/// A running application with its pool and export directory.
pub struct TestContext {
    pub pool: PgPool,
    pub app: Router,
    pub dir: TempDir,
}

impl TestContext {
    pub async fn setup() -> Option<Self> {
        let pool = create_test_pool().await?;
        let dir = TempDir::new().expect("Failed to create temp dir");
        let app = create_app(AppState::new(test_config(&dir), pool.clone()));
        Some(Self { pool, app, dir })
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }
}

/// Creates an API key with the given capabilities and returns the plain key.
pub async fn create_test_api_key(pool: &PgPool, capabilities: &[&str]) -> String {
    let seq = KEY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let seed = format!(
        "{}-{}-{}",
        std::process::id(),
        seq,
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    );
    let key = format!("ee_{}", &sha256_hex(&seed)[..40]);
    let prefix = extract_key_prefix(&key).unwrap().to_string();
    let capabilities: Vec<String> = capabilities.iter().map(|c| c.to_string()).collect();

    ApiKeyRepository::new(pool.clone())
        .create("integration test", &sha256_hex(&key), &prefix, &capabilities, false)
        .await
        .expect("Failed to create API key");

    key
}

/// Creates a key allowed to export entries.
pub async fn create_viewer_key(pool: &PgPool) -> String {
    create_test_api_key(pool, &[VIEW_ENTRIES]).await
}

/// Inserts the contact form used by the tests and returns its id.
pub async fn seed_form(pool: &PgPool) -> i64 {
    let fields = r#"[
        {"id": 1, "type": "name", "label": "Name"},
        {"id": 2, "type": "email", "label": "Email"},
        {"id": 3, "type": "textarea", "label": "Message"},
        {"id": 4, "type": "divider", "label": "Section"}
    ]"#;
    sqlx::query_scalar::<_, i64>("INSERT INTO forms (title, fields) VALUES ($1, $2) RETURNING id")
        .bind("Contact Us")
        .bind(fields)
        .fetch_one(pool)
        .await
        .expect("Failed to insert form")
}

/// Inserts `count` entries into the form and returns their ids, oldest first.
pub async fn seed_entries(pool: &PgPool, form_id: i64, count: usize) -> Vec<i64> {
    let mut ids = Vec::with_capacity(count);
    for n in 1..=count {
        let name = format!("Person {}", n);
        let email = format!("person{}@example.com", n);
        let fields = serde_json::json!({
            "1": {"id": 1, "value": name},
            "2": {"id": 2, "value": email},
            "3": {"id": 3, "value": "Hello,\nworld"},
        })
        .to_string();

        let entry_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO entries (form_id, status, fields, ip_address, user_agent, user_uuid, date)
            VALUES ($1, '', $2, '10.0.0.1', 'Mozilla/5.0', $3, NOW() - ($4 || ' minutes')::interval)
            RETURNING entry_id
            "#,
        )
        .bind(form_id)
        .bind(&fields)
        .bind(format!("uuid-{}", n))
        .bind((count - n).to_string())
        .fetch_one(pool)
        .await
        .expect("Failed to insert entry");

        for (field_id, value) in [(1_i64, &name), (2, &email)] {
            sqlx::query(
                "INSERT INTO entry_fields (entry_id, form_id, field_id, value) VALUES ($1, $2, $3, $4)",
            )
            .bind(entry_id)
            .bind(form_id)
            .bind(field_id)
            .bind(value)
            .execute(pool)
            .await
            .expect("Failed to insert entry field");
        }

        ids.push(entry_id);
    }
    ids
}

fn encode(pairs: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// GET request against the export page.
pub fn page_request(api_key: &str, query: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(format!("/api/v1/tools/export?{}", encode(query)))
        .header(API_KEY_HEADER, api_key)
        .body(Body::empty())
        .unwrap()
}

/// Form-encoded POST against the export AJAX endpoint.
pub fn ajax_request(
    api_key: &str,
    query: &[(&str, &str)],
    body: &[(&str, &str)],
) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(format!("/api/v1/tools/export/ajax?{}", encode(query)))
        .header(API_KEY_HEADER, api_key)
        .header(header::REFERER, EXPORT_REFERER)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(encode(body)))
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Parse a JSON response body.
pub async fn parse_response_body(response: Response) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Fetches the page data and returns its export nonce.
pub async fn export_nonce(ctx: &TestContext, api_key: &str, form_id: i64) -> String {
    let form = form_id.to_string();
    let response = ctx
        .send(page_request(api_key, &[("form", form.as_str())]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    body["nonce"].as_str().unwrap().to_string()
}
