//! HTTP-level tests against a router backed by the in-memory store

use async_trait::async_trait;
use axum::http::{header, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use chrono::Duration as ChronoDuration;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use conduit::api::{build_router, AppState};
use conduit::cache::create_cache;
use conduit::config::{CacheConfig, Config, ListingConfig};
use conduit::db::repositories::{MemoryRepository, SessionRepository};
use conduit::db::Stores;
use conduit::models::UserId;
use conduit::services::{ArticleService, CommentService, ProfileService, SlugLocks};

const ALICE: &str = "alice-token";
const BOB: &str = "bob-token";
const CAROL: &str = "carol-token";
const DAVE: &str = "dave-token";

struct BrokenSessions;

#[async_trait]
impl SessionRepository for BrokenSessions {
    async fn resolve(&self, _token: &str) -> anyhow::Result<Option<UserId>> {
        Err(anyhow::anyhow!("session store offline"))
    }
}

fn state(stores: Stores) -> AppState {
    let lookup_timeout = Duration::from_secs(1);
    let locks = Arc::new(SlugLocks::new());
    AppState {
        article_service: Arc::new(ArticleService::new(
            stores.articles.clone(),
            stores.follows.clone(),
            locks.clone(),
            ListingConfig::default(),
            lookup_timeout,
        )),
        comment_service: Arc::new(CommentService::new(
            stores.comments.clone(),
            stores.articles.clone(),
            locks,
        )),
        profile_service: Arc::new(ProfileService::new(
            stores.users.clone(),
            stores.follows.clone(),
            create_cache(&CacheConfig::default()),
            lookup_timeout,
        )),
        sessions: stores.sessions,
        lookup_timeout,
    }
}

/// alice (1), bob (2), carol (3) and dave (4), each with a session token;
/// carol follows alice.
fn setup() -> (TestServer, Arc<MemoryRepository>) {
    let repo = Arc::new(MemoryRepository::new());
    for (name, token) in [("alice", ALICE), ("bob", BOB), ("carol", CAROL), ("dave", DAVE)] {
        let id = repo.add_user(name);
        repo.add_session(token, id, ChronoDuration::hours(1));
    }
    repo.follow(3, 1);

    let app = build_router(state(Stores::memory(repo.clone())), "http://localhost:3000")
        .expect("router");
    (TestServer::new(app).expect("test server"), repo)
}

fn auth(request: TestRequest, token: &str) -> TestRequest {
    request.add_header(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Token {}", token)).unwrap(),
    )
}

async fn create_article(server: &TestServer, token: &str, article: Value) -> Value {
    let response = auth(server.post("/api/articles"), token)
        .json(&json!({ "article": article }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<Value>()["article"].clone()
}

// ============================================================================
// Articles
// ============================================================================

#[tokio::test]
async fn create_and_get_article() {
    let (server, _) = setup();

    let article = create_article(
        &server,
        ALICE,
        json!({ "title": "Foo", "description": "D", "body": "B", "tagList": ["rust", "web"] }),
    )
    .await;
    assert_eq!(article["slug"], "foo");
    assert_eq!(article["tagList"], json!(["rust", "web"]));
    assert_eq!(article["favorited"], false);
    assert_eq!(article["favoritesCount"], 0);
    assert_eq!(article["author"]["username"], "alice");

    let response = server.get("/api/articles/foo").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["article"]["title"], "Foo");

    let response = server.get("/api/articles/nope").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn create_requires_identity_and_fields() {
    let (server, _) = setup();

    let response = server
        .post("/api/articles")
        .json(&json!({ "article": { "title": "Foo", "body": "B" } }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = auth(server.post("/api/articles"), "unknown-token")
        .json(&json!({ "article": { "title": "Foo", "body": "B" } }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = auth(server.post("/api/articles"), ALICE)
        .json(&json!({ "article": { "title": "Foo" } }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"]["field"], "body");

    let response = auth(server.post("/api/articles"), ALICE)
        .text("{not json")
        .content_type("application/json")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bearer_scheme_is_accepted() {
    let (server, _) = setup();
    let response = server
        .post("/api/articles")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", BOB)).unwrap(),
        )
        .json(&json!({ "article": { "title": "Bar", "body": "B" } }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(response.json::<Value>()["article"]["author"]["username"], "bob");
}

#[tokio::test]
async fn update_is_owner_only_and_partial() {
    let (server, _) = setup();
    create_article(&server, ALICE, json!({ "title": "Foo", "body": "B", "tagList": ["a"] })).await;

    let response = auth(server.put("/api/articles/foo"), BOB)
        .json(&json!({ "article": { "title": "Hijacked" } }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = server
        .put("/api/articles/foo")
        .json(&json!({ "article": { "title": "Anon" } }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = auth(server.put("/api/articles/missing"), ALICE)
        .json(&json!({ "article": { "title": "X" } }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = auth(server.put("/api/articles/foo"), ALICE)
        .json(&json!({ "article": { "title": "Renamed" } }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let article = &response.json::<Value>()["article"];
    assert_eq!(article["slug"], "foo");
    assert_eq!(article["title"], "Renamed");
    assert_eq!(article["body"], "B");
    assert_eq!(article["tagList"], json!(["a"]));
}

#[tokio::test]
async fn malformed_update_body_reported_after_ownership() {
    let (server, _) = setup();
    create_article(&server, ALICE, json!({ "title": "Foo", "body": "B" })).await;
    let bad = json!({ "nope": 1 });

    let response = server.put("/api/articles/missing").json(&bad).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = server.put("/api/articles/foo").json(&bad).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = auth(server.put("/api/articles/foo"), BOB).json(&bad).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = auth(server.put("/api/articles/foo"), ALICE).json(&bad).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn delete_article_cascades_comments() {
    let (server, _) = setup();
    create_article(&server, ALICE, json!({ "title": "Foo", "body": "B" })).await;
    auth(server.post("/api/articles/foo/comments"), CAROL)
        .json(&json!({ "comment": { "body": "nice" } }))
        .await;

    let response = auth(server.delete("/api/articles/foo"), BOB).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = auth(server.delete("/api/articles/foo"), ALICE).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let response = server.get("/api/articles/foo/comments").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn favorite_is_idempotent() {
    let (server, _) = setup();
    create_article(&server, ALICE, json!({ "title": "Foo", "body": "B" })).await;

    for _ in 0..2 {
        let response = auth(server.post("/api/articles/foo/favorite"), BOB).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let article = &response.json::<Value>()["article"];
        assert_eq!(article["favorited"], true);
        assert_eq!(article["favoritesCount"], 1);
    }

    let response = server.get("/api/articles/foo").await;
    let article = &response.json::<Value>()["article"];
    assert_eq!(article["favorited"], false);
    assert_eq!(article["favoritesCount"], 1);

    for _ in 0..2 {
        let response = auth(server.delete("/api/articles/foo/favorite"), BOB).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<Value>()["article"]["favoritesCount"], 0);
    }

    let response = server.post("/api/articles/foo/favorite").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let response = auth(server.post("/api/articles/missing/favorite"), BOB).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Listing and feed
// ============================================================================

#[tokio::test]
async fn list_filters_and_pages() {
    let (server, _) = setup();
    create_article(&server, ALICE, json!({ "title": "One", "body": "B", "tagList": ["rust"] })).await;
    create_article(&server, BOB, json!({ "title": "Two", "body": "B" })).await;
    create_article(&server, ALICE, json!({ "title": "Three", "body": "B", "tagList": ["rust"] })).await;
    create_article(&server, BOB, json!({ "title": "Four", "body": "B" })).await;
    auth(server.post("/api/articles/two/favorite"), CAROL).await;

    let slugs = |body: &Value| -> Vec<String> {
        body["articles"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["slug"].as_str().unwrap().to_string())
            .collect()
    };

    let all = server.get("/api/articles").await.json::<Value>();
    assert_eq!(slugs(&all), vec!["four", "three", "two", "one"]);
    assert_eq!(all["articlesCount"], 4);

    let first = server
        .get("/api/articles")
        .add_query_param("limit", 2)
        .await
        .json::<Value>();
    let second = server
        .get("/api/articles")
        .add_query_param("offset", 2)
        .add_query_param("limit", 2)
        .await
        .json::<Value>();
    assert_eq!(slugs(&first), vec!["four", "three"]);
    assert_eq!(slugs(&second), vec!["two", "one"]);
    assert_eq!(second["articlesCount"], 4);

    let tagged = server
        .get("/api/articles")
        .add_query_param("tag", "rust")
        .await
        .json::<Value>();
    assert_eq!(slugs(&tagged), vec!["three", "one"]);

    let by_bob = server
        .get("/api/articles")
        .add_query_param("author", "bob")
        .await
        .json::<Value>();
    assert_eq!(slugs(&by_bob), vec!["four", "two"]);

    let favorited = server
        .get("/api/articles")
        .add_query_param("favorited", "carol")
        .await
        .json::<Value>();
    assert_eq!(slugs(&favorited), vec!["two"]);

    let unknown = server
        .get("/api/articles")
        .add_query_param("author", "nobody")
        .await;
    assert_eq!(unknown.status_code(), StatusCode::OK);
    assert_eq!(unknown.json::<Value>(), json!({ "articles": [], "articlesCount": 0 }));
}

#[tokio::test]
async fn malformed_pagination_is_rejected() {
    let (server, _) = setup();
    for (param, value) in [("limit", "ten"), ("offset", "-1")] {
        let response = server
            .get("/api/articles")
            .add_query_param(param, value)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body = response.json::<Value>();
        assert_eq!(body["error"]["code"], "INVALID_QUERY");
        assert_eq!(body["error"]["details"]["param"], param);
    }
}

#[tokio::test]
async fn repeated_query_param_uses_error_envelope() {
    let (server, _) = setup();

    let response = server
        .get("/api/articles")
        .add_query_param("tag", "a")
        .add_query_param("tag", "b")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "INVALID_QUERY");
}

#[tokio::test]
async fn anonymous_feed_is_unauthorized_before_pagination() {
    let (server, _) = setup();

    let response = server
        .get("/api/articles/feed")
        .add_query_param("offset", "x")
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = auth(server.get("/api/articles/feed"), CAROL)
        .add_query_param("offset", "x")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "INVALID_QUERY");
}

#[tokio::test]
async fn feed_shows_followed_authors() {
    let (server, _) = setup();
    create_article(&server, ALICE, json!({ "title": "From Alice", "body": "B" })).await;
    create_article(&server, BOB, json!({ "title": "From Bob", "body": "B" })).await;

    let response = server.get("/api/articles/feed").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = auth(server.get("/api/articles/feed"), CAROL).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<Value>();
    assert_eq!(body["articlesCount"], 1);
    assert_eq!(body["articles"][0]["slug"], "from-alice");
    assert_eq!(body["articles"][0]["author"]["following"], true);
}

// ============================================================================
// Comments
// ============================================================================

#[tokio::test]
async fn comment_lifecycle() {
    let (server, _) = setup();
    create_article(&server, ALICE, json!({ "title": "Foo", "body": "B" })).await;

    let response = auth(server.post("/api/articles/foo/comments"), CAROL)
        .json(&json!({ "comment": { "body": "nice" } }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let comment = &response.json::<Value>()["comment"];
    assert_eq!(comment["id"], 1);
    assert_eq!(comment["body"], "nice");
    assert_eq!(comment["author"]["username"], "carol");

    let response = server.get("/api/articles/foo/comments").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["comments"].as_array().unwrap().len(), 1);

    let response = auth(server.delete("/api/articles/foo/comments/1"), DAVE).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = auth(server.delete("/api/articles/foo/comments/1"), ALICE).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let response = auth(server.delete("/api/articles/foo/comments/1"), ALICE).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comment_errors() {
    let (server, _) = setup();
    create_article(&server, ALICE, json!({ "title": "Foo", "body": "B" })).await;

    let response = server
        .post("/api/articles/foo/comments")
        .json(&json!({ "comment": { "body": "hi" } }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = auth(server.post("/api/articles/missing/comments"), BOB)
        .json(&json!({ "comment": { "body": "hi" } }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = auth(server.post("/api/articles/foo/comments"), BOB)
        .json(&json!({ "comment": { "body": "" } }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server.get("/api/articles/missing/comments").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = auth(server.delete("/api/articles/foo/comments/abc"), ALICE).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "VALIDATION_ERROR");
}

// ============================================================================
// Identity
// ============================================================================

#[tokio::test]
async fn failing_session_store_is_unavailable() {
    let repo = Arc::new(MemoryRepository::new());
    let mut stores = Stores::memory(repo);
    stores.sessions = Arc::new(BrokenSessions);
    let app = build_router(state(stores), "http://localhost:3000").unwrap();
    let server = TestServer::new(app).unwrap();

    let response = auth(server.get("/api/articles"), ALICE).await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json::<Value>()["error"]["code"], "SERVICE_UNAVAILABLE");

    // Anonymous requests never touch the session store
    let response = server.get("/api/articles").await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[test]
fn invalid_cors_origin_is_an_error() {
    let stores = Stores::memory(Arc::new(MemoryRepository::new()));
    assert!(build_router(state(stores), "bad\norigin").is_err());
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn memory_driver_serves_seeded_users() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(
        &mut file,
        br#"
database:
  driver: memory
  seed:
    users:
      - username: alice
        tokens: ["alice-token"]
      - username: carol
        tokens: ["carol-token"]
    follows:
      - { follower: carol, author: alice }
"#,
    )
    .unwrap();
    let config = Config::load(file.path()).unwrap();
    config.validate().unwrap();

    let stores = Stores::open(&config.database).await.unwrap();
    let app = build_router(state(stores), &config.server.cors_origin).unwrap();
    let server = TestServer::new(app).unwrap();

    let article = create_article(&server, ALICE, json!({ "title": "Seeded", "body": "B" })).await;
    assert_eq!(article["author"]["username"], "alice");

    let response = auth(server.get("/api/articles/feed"), CAROL).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["articles"][0]["slug"], "seeded");
}
