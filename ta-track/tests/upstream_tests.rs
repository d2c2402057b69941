//! Upstream client tests against in-process stub servers
//!
//! Each test binds a small axum app on 127.0.0.1:0 that mimics the
//! relevant slice of the market-data, chat-completion or backend API.

use axum::{
    body::Body,
    extract::{Path, Query},
    http::{HeaderMap, Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use ta_common::config::{BackendConfig, GenerativeConfig, MarketConfig};
use ta_track::services::{
    BackendCatalog, BackendClient, CatalogSource, FileCatalog, GenerativeClient,
    GenerativePriceSource, ItemLookup, MarketDataClient, MarketPriceSource, PriceSource,
};
use ta_track::{build_router, AppState, LookupError};
use tower::util::ServiceExt;

/// Serve `router` on an ephemeral port and return its base URL
async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

// =============================================================================
// Market data
// =============================================================================

const DAY_MS: f64 = 86_400_000.0;
/// 2025-11-08T00:00:00Z
const NOV_8_MS: f64 = 1_762_560_000_000.0;

fn market_stub() -> Router {
    Router::new()
        .route(
            "/simple/price",
            get(|headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                if headers.get("x-cg-demo-api-key").is_none() {
                    return (StatusCode::UNAUTHORIZED, Json(json!({}))).into_response();
                }
                let mut body = serde_json::Map::new();
                for id in q["ids"].split(',').filter(|id| *id == "bitcoin") {
                    body.insert(id.to_string(), json!({ "usd": 95000.5, "usd_24h_change": -1.234 }));
                }
                Json(Value::Object(body)).into_response()
            }),
        )
        .route(
            "/coins/:id/market_chart",
            get(|| async {
                // 31 daily closes oldest first, then an intraday sample on the last date
                let mut prices: Vec<Value> = (0..31)
                    .map(|d| json!([NOV_8_MS - (30 - d) as f64 * DAY_MS, 90_000.0 + d as f64]))
                    .collect();
                prices.push(json!([NOV_8_MS + 3_600_000.0, 95_000.5]));
                Json(json!({ "prices": prices }))
            }),
        )
        .route(
            "/coins/:id",
            get(|Path(id): Path<String>| async move {
                Json(json!({
                    "id": id,
                    "symbol": "btc",
                    "name": "Bitcoin",
                    "description": { "en": "x".repeat(400) },
                    "image": { "large": "https://img.example/btc.png" },
                    "links": { "homepage": ["", "https://bitcoin.org"] }
                }))
            }),
        )
}

async fn market_source() -> MarketPriceSource {
    let base_url = spawn_stub(market_stub()).await;
    let client = MarketDataClient::new(&MarketConfig {
        base_url,
        api_key: Some("demo-key".to_string()),
    })
    .unwrap();
    MarketPriceSource::new(Arc::new(client))
}

#[tokio::test]
async fn test_market_source_merges_three_calls() {
    let source = market_source().await;
    let result = source.fetch("bitcoin", None).await.unwrap();

    assert_eq!(result.current_price, 95000.5);
    assert_eq!(result.specs["Name"], "Bitcoin");
    assert_eq!(result.specs["Symbol"], "BTC");
    assert_eq!(result.specs["Trend"], "-1.23");
    assert_eq!(result.specs["Homepage"], "https://bitcoin.org");
    assert_eq!(result.specs["Image URL"], "https://img.example/btc.png");
    assert_eq!(result.specs["Description"].chars().count(), 200);

    // newest sample first
    assert_eq!(result.history[0].date, "2025-11-08");
    assert_eq!(result.history[0].price, 95000.5);
}

#[tokio::test]
async fn test_market_lookup_history_is_normalized() {
    let source = market_source().await;
    let catalog = FileCatalog::new("/nonexistent/categories.json");
    let lookup = ItemLookup::new(Arc::new(catalog), Arc::new(source));

    let result = lookup.track("BTC", None).await.unwrap();
    assert_eq!(result.history.len(), 30);
    assert_eq!(result.history[0].price, 95000.5);
    assert!(result.history.windows(2).all(|w| w[0].date > w[1].date));
}

#[tokio::test]
async fn test_market_missing_quote_is_incomplete() {
    let source = market_source().await;
    let err = source.fetch("ethereum", None).await.unwrap_err();
    assert!(matches!(err, LookupError::IncompleteUpstreamData(_)));
}

#[tokio::test]
async fn test_market_status_error_is_unavailable() {
    let base_url = spawn_stub(market_stub()).await;
    let client = MarketDataClient::new(&MarketConfig {
        base_url,
        api_key: None,
    })
    .unwrap();
    let err = MarketPriceSource::new(Arc::new(client))
        .fetch("bitcoin", None)
        .await
        .unwrap_err();
    assert!(matches!(err, LookupError::UpstreamUnavailable(_)));
}

// =============================================================================
// Generative
// =============================================================================

fn completion(content: &str) -> Value {
    json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
}

async fn generative_source(answer: Value, delay: Duration) -> GenerativePriceSource {
    let stub = Router::new().route(
        "/chat/completions",
        post(move |headers: HeaderMap, Json(request): Json<Value>| {
            let answer = answer.clone();
            async move {
                tokio::time::sleep(delay).await;
                let authorized = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    == Some("Bearer test-key");
                if !authorized || request["model"] != "grok-3" {
                    return (StatusCode::UNAUTHORIZED, Json(json!({}))).into_response();
                }
                Json(answer).into_response()
            }
        }),
    );
    let base_url = spawn_stub(stub).await;
    let config = GenerativeConfig {
        api_key: Some("test-key".to_string()),
        base_url,
        model: "grok-3".to_string(),
        timeout: Duration::from_millis(500),
    };
    let client = GenerativeClient::new(&config, "test-key".to_string()).unwrap();
    GenerativePriceSource::new(Arc::new(client))
}

#[tokio::test]
async fn test_generative_fenced_answer() {
    let content = "Here you go:\n```json\n{\"currentPrice\": \"$1,250\", \"history\": [\
                   {\"date\": \"2025-11-07\", \"price\": 1240}, {\"date\": \"2025-11-08\", \"price\": 1250}], \
                   \"specs\": {\"Name\": \"Topaz Ring\"}}\n```";
    let source = generative_source(completion(content), Duration::ZERO).await;

    let result = source.fetch("topaz-ring", Some("jewelry")).await.unwrap();
    assert_eq!(result.current_price, 1250.0);
    assert_eq!(result.history.len(), 2);
    assert_eq!(result.specs["Name"], "Topaz Ring");
    assert!(result.specs["Description"].contains("topaz ring"));
}

#[tokio::test]
async fn test_generative_prose_is_malformed() {
    let source = generative_source(completion("I cannot price that."), Duration::ZERO).await;
    let err = source.fetch("topaz-ring", None).await.unwrap_err();
    assert!(matches!(err, LookupError::MalformedUpstreamResponse(_)));
}

#[tokio::test]
async fn test_generative_missing_price_is_incomplete() {
    let content = r#"{"history": [{"date": "2025-11-08", "price": 1}], "specs": {}}"#;
    let source = generative_source(completion(content), Duration::ZERO).await;
    let err = source.fetch("topaz-ring", None).await.unwrap_err();
    assert!(matches!(err, LookupError::IncompleteUpstreamData(_)));
}

#[tokio::test]
async fn test_generative_undated_history_is_incomplete() {
    let content = r#"{"currentPrice": 120,
        "history": [{"date": "last week", "price": 90}, {"date": "yesterday", "price": 95}],
        "specs": {"Name": "Topaz Ring"}}"#;
    let source = generative_source(completion(content), Duration::ZERO).await;
    let err = source.fetch("topaz-ring", None).await.unwrap_err();
    assert!(matches!(err, LookupError::IncompleteUpstreamData(_)));
}

#[tokio::test]
async fn test_generative_timeout_is_unavailable() {
    let source = generative_source(completion("{}"), Duration::from_secs(3)).await;
    let err = source.fetch("topaz-ring", None).await.unwrap_err();
    assert!(matches!(err, LookupError::UpstreamUnavailable(_)));
}

// =============================================================================
// Backend: catalog tables, sessions, watchlists
// =============================================================================

const USER_ID: &str = "0b7d2f52-2a7e-4c3b-8a8c-1d8d1f5e9c11";

fn backend_stub() -> Router {
    fn authorized(headers: &HeaderMap) -> bool {
        headers.get("apikey").is_some()
            && headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer good-token")
    }

    Router::new()
        .route(
            "/auth/v1/user",
            get(|headers: HeaderMap| async move {
                if !authorized(&headers) {
                    return (StatusCode::UNAUTHORIZED, Json(json!({ "msg": "bad jwt" }))).into_response();
                }
                Json(json!({ "id": USER_ID, "email": "ada@example.com" })).into_response()
            }),
        )
        .route(
            "/auth/v1/otp",
            post(|Json(body): Json<Value>| async move {
                if body["email"] == "ada@example.com" {
                    StatusCode::OK
                } else {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
            }),
        )
        .route(
            "/rest/v1/watchlists",
            get(|headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                if !authorized(&headers) || q.get("user_id") != Some(&format!("eq.{}", USER_ID)) {
                    return StatusCode::UNAUTHORIZED.into_response();
                }
                Json(json!([
                    { "id": "6f1c4ad6-5d55-4a2c-9a43-2c6a0ff7b001", "user_id": USER_ID,
                      "item_slug": "bitcoin", "category": "crypto", "notes": null,
                      "created_at": "2025-11-08T12:00:00+00:00" },
                    { "id": "6f1c4ad6-5d55-4a2c-9a43-2c6a0ff7b002", "user_id": USER_ID,
                      "item_slug": "ethereum", "category": "crypto", "notes": "hodl",
                      "created_at": "2025-11-07T12:00:00+00:00" }
                ]))
                .into_response()
            })
            .post(|headers: HeaderMap, Json(rows): Json<Value>| async move {
                if !authorized(&headers) {
                    return StatusCode::UNAUTHORIZED.into_response();
                }
                let row = &rows[0];
                (
                    StatusCode::CREATED,
                    Json(json!([{
                        "id": "6f1c4ad6-5d55-4a2c-9a43-2c6a0ff7b003",
                        "user_id": row["user_id"],
                        "item_slug": row["item_slug"],
                        "category": row["category"],
                        "notes": row["notes"],
                        "created_at": "2025-11-08T13:00:00+00:00"
                    }])),
                )
                    .into_response()
            }),
        )
        .route(
            "/rest/v1/categories",
            get(|| async {
                Json(json!([
                    { "id": "00000000-0000-0000-0000-000000000001", "name": "Crypto", "slug": "crypto",
                      "label": "Crypto", "icon": "bitcoin", "parent_id": null },
                    { "id": "00000000-0000-0000-0000-000000000002", "name": "Altcoins", "slug": "altcoins",
                      "label": "Altcoins", "icon": "coins",
                      "parent_id": "00000000-0000-0000-0000-000000000001" }
                ]))
            }),
        )
        .route(
            "/rest/v1/items",
            get(|| async {
                Json(json!([
                    { "slug": "bitcoin", "name": "Bitcoin", "teaser_price": 95000.0, "trend": 1.5,
                      "category_id": "00000000-0000-0000-0000-000000000001" },
                    { "slug": "solana", "name": "Solana", "teaser_price": 160.0, "trend": 2.0,
                      "category_id": "00000000-0000-0000-0000-000000000002" }
                ]))
            }),
        )
}

async fn backend_client() -> Arc<BackendClient> {
    let url = spawn_stub(backend_stub()).await;
    Arc::new(
        BackendClient::new(&BackendConfig {
            url,
            anon_key: "anon".to_string(),
            service_key: None,
        })
        .unwrap(),
    )
}

/// App whose market source only knows bitcoin
async fn backed_app() -> Router {
    let backend = backend_client().await;
    let catalog: Arc<dyn CatalogSource> = Arc::new(BackendCatalog::new(backend.clone()));
    let lookup = ItemLookup::new(catalog, Arc::new(market_source().await));
    let public_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("public");
    build_router(AppState::new(Arc::new(lookup), public_dir).with_backend(backend))
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn watchlist_request(method: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri("/api/watchlist")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap()
}

#[tokio::test]
async fn test_backend_catalog_teaser() {
    let app = backed_app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/track")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "item": "top-5-altcoins", "category": "crypto" }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["related"][0]["slug"], "solana");
}

#[tokio::test]
async fn test_watchlist_requires_token() {
    let app = backed_app().await;
    let response = app.oneshot(watchlist_request("GET", None, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let app = backed_app().await;
    let response = app
        .oneshot(watchlist_request("GET", Some("stale-token"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_watchlist_enriched_listing() {
    let app = backed_app().await;
    let response = app
        .oneshot(watchlist_request("GET", Some("good-token"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);

    assert_eq!(entries[0]["item_slug"], "bitcoin");
    assert_eq!(entries[0]["current_price"], 95000.5);
    assert_eq!(entries[0]["trend"], -1.23);
    assert_eq!(entries[0]["image_url"], "https://img.example/btc.png");

    // the stub has no ethereum quote; the listing still succeeds
    assert_eq!(entries[1]["item_slug"], "ethereum");
    assert!(entries[1]["current_price"].is_null());
    assert_eq!(entries[1]["notes"], "hodl");
}

#[tokio::test]
async fn test_watchlist_add_entry() {
    let app = backed_app().await;
    let response = app
        .oneshot(watchlist_request(
            "POST",
            Some("good-token"),
            Some(json!({ "item_slug": "solana", "category": "crypto", "notes": "" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["item_slug"], "solana");
    assert_eq!(body["user_id"], USER_ID);
    assert!(body["notes"].is_null());
}

#[tokio::test]
async fn test_watchlist_add_blank_slug_is_400() {
    let app = backed_app().await;
    let response = app
        .oneshot(watchlist_request("POST", Some("good-token"), Some(json!({ "item_slug": " " }))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_magic_link() {
    let send = |email: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/auth/magic-link")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "email": email }).to_string()))
            .unwrap()
    };

    let response = backed_app().await.oneshot(send("ada@example.com")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await, json!({ "sent": true }));

    let response = backed_app().await.oneshot(send("not-an-email")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = backed_app().await.oneshot(send("bob@example.com")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
