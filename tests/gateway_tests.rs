//! Gateway contract tests against an in-process mock backend: credential
//! injection, the 401 sign-out interceptor, failure normalization, and
//! faithful pass-through of query parameters and binary payloads.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;

use databotics::api::{AnalyzeRequest, CleanOptions, GenerateSqlRequest};
use databotics::credentials::{CredentialStore, MemoryCredentialStore};
use databotics::error::ClientError;
use databotics::gateway::Gateway;

#[derive(Default)]
struct Recorded {
    auth_headers: Mutex<Vec<Option<String>>>,
    query_params: Mutex<Vec<HashMap<String, String>>>,
    bodies: Mutex<Vec<Vec<u8>>>,
}

impl Recorded {
    fn record_auth(&self, headers: &HeaderMap) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        self.auth_headers.lock().push(auth);
    }
}

async fn read_file_part(mp: &mut Multipart) -> Vec<u8> {
    while let Some(field) = mp.next_field().await.unwrap() {
        if field.name() == Some("file") {
            return field.bytes().await.unwrap().to_vec();
        }
    }
    Vec::new()
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn token_json(token: &str) -> Json<serde_json::Value> {
    Json(serde_json::json!({"access_token": token, "token_type": "bearer"}))
}

#[tokio::test]
async fn login_success_stores_the_token() {
    let app = Router::new().route(
        "/auth/login",
        post(|Json(body): Json<serde_json::Value>| async move {
            if body["username"] == "admin" && body["password"] == "databotics" {
                token_json("tok-123").into_response()
            } else {
                StatusCode::UNAUTHORIZED.into_response()
            }
        }),
    );
    let base = serve(app).await;

    let creds = Arc::new(MemoryCredentialStore::new());
    let gw = Gateway::new(&base, creds.clone()).unwrap();
    gw.login("admin", "databotics").await.unwrap();
    assert_eq!(creds.get().as_deref(), Some("tok-123"));
}

#[tokio::test]
async fn login_failure_is_an_auth_error_with_no_global_effect() {
    let app = Router::new()
        .route("/auth/login", post(|| async { StatusCode::UNAUTHORIZED }));
    let base = serve(app).await;

    let creds = Arc::new(MemoryCredentialStore::new());
    let gw = Gateway::new(&base, creds.clone()).unwrap();
    let fired = Arc::new(AtomicUsize::new(0));
    let f = fired.clone();
    gw.set_signout_hook(move || {
        f.fetch_add(1, Ordering::SeqCst);
    });

    let err = gw.login("admin", "wrong").await.unwrap_err();
    assert_eq!(err, ClientError::auth("Invalid username or password"));
    assert_eq!(err.to_string(), "Invalid username or password");
    // No credential existed, none must appear, and the sign-out side effect
    // must not fire for the auth endpoints.
    assert!(creds.get().is_none());
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn register_failure_carries_the_body_text() {
    let app = Router::new().route(
        "/auth/register",
        post(|| async { (StatusCode::BAD_REQUEST, "Username already exists") }),
    );
    let base = serve(app).await;

    let gw = Gateway::new(&base, Arc::new(MemoryCredentialStore::new())).unwrap();
    let err = gw.register("admin", "pw").await.unwrap_err();
    assert_eq!(err, ClientError::auth("Username already exists"));
}

#[tokio::test]
async fn bearer_header_is_attached_when_a_credential_exists() {
    let recorded = Arc::new(Recorded::default());
    let app = Router::new()
        .route(
            "/upload",
            post(|State(r): State<Arc<Recorded>>, headers: HeaderMap, _mp: Multipart| async move {
                r.record_auth(&headers);
                Json(serde_json::json!({"session_id": "s1", "filename": "a.csv", "size": 3}))
            }),
        )
        .with_state(recorded.clone());
    let base = serve(app).await;

    let creds = Arc::new(MemoryCredentialStore::new());
    creds.set("tok-9");
    let gw = Gateway::new(&base, creds).unwrap();
    let session = gw.upload(b"a,b".to_vec(), "a.csv").await.unwrap();
    assert_eq!(session.session_id, "s1");
    assert_eq!(session.size, 3);
    assert_eq!(
        recorded.auth_headers.lock().as_slice(),
        &[Some("Bearer tok-9".to_string())]
    );
}

#[tokio::test]
async fn profile_by_file_posts_the_raw_bytes_and_decodes_the_profile() {
    let recorded = Arc::new(Recorded::default());
    let app = Router::new()
        .route(
            "/profile",
            post(
                |State(r): State<Arc<Recorded>>, headers: HeaderMap, mut mp: Multipart| async move {
                    r.record_auth(&headers);
                    let bytes = read_file_part(&mut mp).await;
                    r.bodies.lock().push(bytes);
                    Json(serde_json::json!({
                        "row_count": 7,
                        "columns": [{"name": "id", "type": "int64", "null_count": 0, "null_pct": 0.0}],
                        "sample_rows": [],
                        "warnings": ["small sample"]
                    }))
                },
            ),
        )
        .with_state(recorded.clone());
    let base = serve(app).await;

    let creds = Arc::new(MemoryCredentialStore::new());
    creds.set("tok-7");
    let gw = Gateway::new(&base, creds).unwrap();

    let input = b"id\n1\n2\n".to_vec();
    let profile = gw.profile_by_file(input.clone(), "ids.csv").await.unwrap();
    assert_eq!(profile.row_count, 7);
    assert_eq!(profile.columns[0].name, "id");
    assert_eq!(profile.warnings, vec!["small sample".to_string()]);
    // The bytes reach the backend untouched, with the credential attached.
    assert_eq!(recorded.bodies.lock().as_slice(), &[input]);
    assert_eq!(
        recorded.auth_headers.lock().as_slice(),
        &[Some("Bearer tok-7".to_string())]
    );
}

#[tokio::test]
async fn unauthorized_response_clears_credential_and_fires_signout() {
    let app = Router::new()
        .route("/profile/{id}", post(|| async { StatusCode::UNAUTHORIZED }));
    let base = serve(app).await;

    let creds = Arc::new(MemoryCredentialStore::new());
    creds.set("stale-token");
    let gw = Gateway::new(&base, creds.clone()).unwrap();
    let fired = Arc::new(AtomicUsize::new(0));
    let f = fired.clone();
    gw.set_signout_hook(move || {
        f.fetch_add(1, Ordering::SeqCst);
    });

    let err = gw.profile_by_session("s1").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(creds.get().is_none());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn other_failures_surface_the_body_text_or_a_status_line() {
    let app = Router::new()
        .route(
            "/validate",
            post(|_mp: Multipart| async { (StatusCode::UNPROCESSABLE_ENTITY, "rules file not found") }),
        )
        .route("/upload", post(|_mp: Multipart| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let base = serve(app).await;

    let creds = Arc::new(MemoryCredentialStore::new());
    creds.set("tok");
    let gw = Gateway::new(&base, creds.clone()).unwrap();

    let err = gw.validate(b"x".to_vec(), "a.csv", Some("rules/missing.yaml")).await.unwrap_err();
    assert_eq!(err, ClientError::Request { status: 422, message: "rules file not found".to_string() });

    let err = gw.upload(b"x".to_vec(), "a.csv").await.unwrap_err();
    assert_eq!(err.to_string(), "request failed with status 500");
    // Non-401 failures never touch the credential.
    assert!(creds.get().is_some());
}

#[tokio::test]
async fn query_sql_travels_as_an_encoded_parameter() {
    let recorded = Arc::new(Recorded::default());
    let app = Router::new()
        .route(
            "/query",
            post(
                |State(r): State<Arc<Recorded>>,
                 Query(params): Query<HashMap<String, String>>,
                 _mp: Multipart| async move {
                    r.query_params.lock().push(params);
                    Json(serde_json::json!({"columns": ["n"], "rows": [{"n": 1}], "row_count": 1}))
                },
            ),
        )
        .with_state(recorded.clone());
    let base = serve(app).await;

    let creds = Arc::new(MemoryCredentialStore::new());
    creds.set("tok");
    let gw = Gateway::new(&base, creds).unwrap();

    let sql = "SELECT a, b FROM df WHERE note = 'x & y' LIMIT 100";
    let result = gw.query(b"a\n1\n".to_vec(), "a.csv", sql).await.unwrap();
    assert_eq!(result.row_count, 1);
    assert_eq!(result.columns, vec!["n".to_string()]);

    let params = recorded.query_params.lock();
    assert_eq!(params.len(), 1);
    // Percent-encoding must round-trip the SQL byte-for-byte.
    assert_eq!(params[0].get("sql").map(String::as_str), Some(sql));
}

#[tokio::test]
async fn clean_passes_options_through_and_returns_raw_bytes() {
    let recorded = Arc::new(Recorded::default());
    let app = Router::new()
        .route(
            "/clean",
            post(
                |State(r): State<Arc<Recorded>>,
                 Query(params): Query<HashMap<String, String>>,
                 mut mp: Multipart| async move {
                    r.query_params.lock().push(params);
                    let bytes = read_file_part(&mut mp).await;
                    r.bodies.lock().push(bytes.clone());
                    // Echo the upload untouched, as a no-op clean would.
                    bytes
                },
            ),
        )
        .with_state(recorded.clone());
    let base = serve(app).await;

    let creds = Arc::new(MemoryCredentialStore::new());
    creds.set("tok");
    let gw = Gateway::new(&base, creds).unwrap();

    let input = b"id,name\n1,alpha\n2,beta\n".to_vec();
    let options = CleanOptions { trim_strings: true, drop_duplicates: false, normalize_case: None };
    let cleaned = gw.clean(input.clone(), "tidy.csv", &options).await.unwrap();
    assert_eq!(cleaned, input);

    let params = recorded.query_params.lock();
    assert_eq!(params[0].get("trim_strings").map(String::as_str), Some("true"));
    assert_eq!(params[0].get("drop_duplicates").map(String::as_str), Some("false"));
    assert!(!params[0].contains_key("normalize_case"));
}

#[tokio::test]
async fn analyze_sends_its_parameters_and_decodes_the_result() {
    let recorded = Arc::new(Recorded::default());
    let app = Router::new()
        .route(
            "/analyze",
            post(
                |State(r): State<Arc<Recorded>>,
                 Query(params): Query<HashMap<String, String>>,
                 _mp: Multipart| async move {
                    r.query_params.lock().push(params);
                    Json(serde_json::json!({
                        "anomalies": [{"ts": "2024-06-01", "z": 4.2}],
                        "summary": {"points": 30},
                        "narrative": "one spike detected"
                    }))
                },
            ),
        )
        .with_state(recorded.clone());
    let base = serve(app).await;

    let creds = Arc::new(MemoryCredentialStore::new());
    creds.set("tok");
    let gw = Gateway::new(&base, creds).unwrap();

    let request = AnalyzeRequest {
        timestamp_col: "ts".to_string(),
        metric_col: "amount".to_string(),
        dimension_cols: vec!["region".to_string(), "channel".to_string()],
        method: Some("zscore".to_string()),
    };
    let result = gw.analyze(b"x".to_vec(), "a.csv", &request).await.unwrap();
    assert_eq!(result.anomalies.len(), 1);
    assert_eq!(result.narrative, "one spike detected");

    let params = recorded.query_params.lock();
    assert_eq!(params[0].get("timestamp_col").map(String::as_str), Some("ts"));
    assert_eq!(params[0].get("metric_col").map(String::as_str), Some("amount"));
    assert_eq!(params[0].get("method").map(String::as_str), Some("zscore"));
    assert_eq!(params[0].get("dimension_cols").map(String::as_str), Some("region,channel"));
}

#[tokio::test]
async fn generate_sql_posts_json_and_decodes_the_plan() {
    let app = Router::new().route(
        "/generate_sql",
        post(|Json(body): Json<serde_json::Value>| async move {
            assert_eq!(body["question"], "total by region");
            assert_eq!(body["table"], "loaded_table");
            assert_eq!(body["schema"]["amount"], "float64");
            Json(serde_json::json!({
                "sql": "SELECT region, SUM(amount) FROM loaded_table GROUP BY region",
                "explanation": "groups rows by region",
                "safety": {"read_only": true}
            }))
        }),
    );
    let base = serve(app).await;

    let creds = Arc::new(MemoryCredentialStore::new());
    creds.set("tok");
    let gw = Gateway::new(&base, creds).unwrap();

    let request = GenerateSqlRequest {
        question: "total by region".to_string(),
        table: "loaded_table".to_string(),
        schema: [("amount".to_string(), "float64".to_string())].into_iter().collect(),
        sample_rows: None,
    };
    let plan = gw.generate_sql(&request).await.unwrap();
    assert!(plan.sql.starts_with("SELECT region"));
    assert_eq!(plan.safety.get("read_only").and_then(|v| v.as_bool()), Some(true));
}

#[tokio::test]
async fn network_failure_is_surfaced_as_a_network_error() {
    // Nothing listens on this port.
    let gw = Gateway::new("http://127.0.0.1:1", Arc::new(MemoryCredentialStore::new())).unwrap();
    let err = gw.profile_by_session("s1").await.unwrap_err();
    assert!(matches!(err, ClientError::Network { .. }), "{:?}", err);
}
