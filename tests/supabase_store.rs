use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use dealhunt::platform::Platform;
use dealhunt::search::Hit;
use dealhunt::watchlist::{PersistenceError, SupabaseStore, WatchlistStore};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

const KEY: &str = "anon-key";

/// Just enough PostgREST for the two tables: `eq.` filters, inserts returning
/// the stored rows, and `created_at.desc` ordering.
#[derive(Default)]
struct Rest {
    users: Mutex<Vec<Value>>,
    watchlist: Mutex<Vec<Value>>,
    next_id: AtomicU64,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(KEY)
        && headers.get("authorization").and_then(|v| v.to_str().ok())
            == Some(format!("Bearer {}", KEY).as_str())
}

fn matches(row: &Value, filters: &HashMap<String, String>) -> bool {
    filters.iter().all(|(column, filter)| match filter.strip_prefix("eq.") {
        Some(expected) => match &row[column] {
            Value::String(s) => s == expected,
            Value::Number(n) => n.to_string() == expected,
            _ => false,
        },
        None => true,
    })
}

fn table<'a>(rest: &'a Rest, name: &str) -> &'a Mutex<Vec<Value>> {
    if name == "users" {
        &rest.users
    } else {
        &rest.watchlist
    }
}

async fn select(
    State(rest): State<Arc<Rest>>,
    axum::extract::Path(name): axum::extract::Path<String>,
    headers: HeaderMap,
    Query(filters): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid API key" }))).into_response();
    }
    let rows = table(&rest, &name).lock().unwrap();
    let mut found: Vec<Value> = rows.iter().filter(|r| matches(r, &filters)).cloned().collect();
    if filters.get("order").map(String::as_str) == Some("created_at.desc") {
        found.sort_by(|a, b| b["created_at"].as_str().cmp(&a["created_at"].as_str()));
    }
    Json(Value::Array(found)).into_response()
}

async fn insert(
    State(rest): State<Arc<Rest>>,
    axum::extract::Path(name): axum::extract::Path<String>,
    headers: HeaderMap,
    Json(body): Json<Vec<Value>>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let returning = headers.get("prefer").and_then(|v| v.to_str().ok()) == Some("return=representation");
    let mut rows = table(&rest, &name).lock().unwrap();
    let mut inserted = Vec::new();
    for mut row in body {
        let id = rest.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        row["id"] = json!(id);
        row["created_at"] = json!(format!("2025-06-01T10:00:{:02}.000000+00:00", id));
        rows.push(row.clone());
        inserted.push(row);
    }
    if returning {
        (StatusCode::CREATED, Json(Value::Array(inserted))).into_response()
    } else {
        StatusCode::CREATED.into_response()
    }
}

async fn remove(
    State(rest): State<Arc<Rest>>,
    axum::extract::Path(name): axum::extract::Path<String>,
    Query(filters): Query<HashMap<String, String>>,
) -> Json<Value> {
    let mut rows = table(&rest, &name).lock().unwrap();
    let (removed, kept): (Vec<Value>, Vec<Value>) = rows.drain(..).partition(|r| matches(r, &filters));
    *rows = kept;
    Json(Value::Array(removed))
}

async fn serve(rest: Arc<Rest>) -> SocketAddr {
    let app = Router::new()
        .route("/rest/v1/:table", get(select).post(insert).delete(remove))
        .with_state(rest);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_supabase_store_round_trip() {
    let rest = Arc::new(Rest::default());
    let addr = serve(rest.clone()).await;
    let store = SupabaseStore::new(&format!("http://{}/", addr), KEY.to_string());

    let user = store.get_or_create_user("Jo@Example.com").await.unwrap();
    assert_eq!(user.email, "jo@example.com");
    let again = store.get_or_create_user("jo@example.com").await.unwrap();
    assert_eq!(user.id, again.id);
    assert_eq!(rest.users.lock().unwrap().len(), 1);

    let amazon = Platform::new("Amazon");
    let first = Hit::new("Sony WH-1000XM4", "https://amazon.example/p1").with_rating("4.7");
    let second = Hit::new("Anker Q30", "https://amazon.example/p3");
    assert!(store.add_to_watchlist(&user.id, &first, &amazon, "headphones").await.unwrap());
    assert!(store.add_to_watchlist(&user.id, &second, &amazon, "headphones").await.unwrap());
    assert!(!store.add_to_watchlist(&user.id, &first, &amazon, "sony").await.unwrap());

    let entries = store.list_watchlist(&user.id).await.unwrap();
    let urls: Vec<&str> = entries.iter().map(|e| e.url.as_str()).collect();
    assert_eq!(urls, vec!["https://amazon.example/p3", "https://amazon.example/p1"]);
    assert_eq!(entries[1].rating.as_deref(), Some("4.7"));
    assert_eq!(entries[1].search_query, "headphones");

    assert!(store.remove_from_watchlist(&entries[0].id).await.unwrap());
    assert!(!store.remove_from_watchlist(&entries[0].id).await.unwrap());
    assert_eq!(store.list_watchlist(&user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_supabase_store_reports_rejections() {
    let rest = Arc::new(Rest::default());
    let addr = serve(rest).await;
    let store = SupabaseStore::new(&format!("http://{}", addr), "wrong-key".to_string());

    match store.get_or_create_user("jo@example.com").await {
        Err(PersistenceError::Status { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid API key");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}
