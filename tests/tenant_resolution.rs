use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tenant_forum::extractors::user::{USER_ID_HEADER, USER_ROLE_HEADER};
use tenant_forum::settings::{Environment, PoolSettings};
use tenant_forum::{
    common_routes, forum_routes, with_http_layers, AppError, AppState, Tenant, TenantDirectory, TenantError,
    TenantRegistry,
};
use tower::ServiceExt;
use uuid::Uuid;

/// Registry wrapper that records every lookup it serves.
struct RecordingDirectory {
    inner: TenantRegistry,
    lookups: Mutex<Vec<String>>,
}

impl RecordingDirectory {
    fn new(inner: TenantRegistry) -> Self {
        RecordingDirectory {
            inner,
            lookups: Mutex::new(Vec::new()),
        }
    }

    fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TenantDirectory for RecordingDirectory {
    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, TenantError> {
        self.lookups.lock().unwrap().push(name.to_string());
        tokio::task::yield_now().await;
        self.inner.find_by_name(name).await
    }
}

fn registry() -> TenantRegistry {
    TenantRegistry::with_tenants([
        Tenant::new("acme", "db1", "u", "p", "acme_db"),
        Tenant::new("beta", "db2", "u2", "p2", "beta_db"),
    ])
}

fn app_in(directory: Arc<dyn TenantDirectory>, environment: Environment) -> Router {
    let state = AppState::new(directory, PoolSettings::default());
    with_http_layers(common_routes().merge(forum_routes(state)), 1024 * 1024, environment)
}

fn app(directory: Arc<dyn TenantDirectory>) -> Router {
    app_in(directory, Environment::Production)
}

fn as_user(builder: axum::http::request::Builder, role: &str) -> axum::http::request::Builder {
    builder
        .header(USER_ID_HEADER, Uuid::new_v4().to_string())
        .header(USER_ROLE_HEADER, role)
}

fn upload_request(post_id: Uuid) -> Request<Body> {
    as_user(Request::builder(), "user")
        .method("POST")
        .uri(format!("/posts/{}/media", post_id))
        .header(header::HOST, "acme.example.com")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=X")
        .body(Body::from("--X--\r\n"))
        .unwrap()
}

fn get(uri: &str, host: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(host) = host {
        builder = builder.header(header::HOST, host);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn content_type(res: &axum::response::Response) -> String {
    res.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn known_subdomain_resolves_its_tenant() {
    let res = app(Arc::new(registry()))
        .oneshot(get("/tenant", Some("acme.example.com")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["data"]["name"], "acme");
    assert_eq!(body["data"]["databaseHost"], "db1");
    assert_eq!(body["data"]["database"], "acme_db");
    assert!(!body.to_string().contains("\"p\""));
}

#[tokio::test]
async fn port_is_ignored() {
    let res = app(Arc::new(registry()))
        .oneshot(get("/tenant", Some("beta.example.com:8080")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["data"]["name"], "beta");
}

#[tokio::test]
async fn unknown_tenant_is_not_found() {
    let res = app(Arc::new(registry()))
        .oneshot(get("/tenant", Some("ghost.example.com")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(content_type(&res), "application/problem+json");
    let body = json_body(res).await;
    assert_eq!(body["code"], "tenant_not_found");
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn unknown_tenant_fails_before_touching_a_database() {
    let res = app(Arc::new(registry()))
        .oneshot(get("/posts", Some("ghost.example.com")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(res).await["code"], "tenant_not_found");
}

#[tokio::test]
async fn malformed_hosts_are_bad_requests() {
    for host in [Some(""), Some(".example.com"), Some(":8080"), None] {
        let directory = Arc::new(RecordingDirectory::new(registry()));
        let res = app(directory.clone()).oneshot(get("/tenant", host)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "host {:?}", host);
        assert_eq!(content_type(&res), "application/problem+json");
        assert_eq!(json_body(res).await["code"], "malformed_host");
        assert!(directory.lookups().is_empty(), "host {:?} reached the registry", host);
    }
}

#[tokio::test]
async fn health_needs_no_tenant() {
    let router = app(Arc::new(registry()));
    let res = router.clone().oneshot(get("/health", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["status"], "ok");

    let res = router.oneshot(get("/version", Some("ghost.example.com"))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn every_request_performs_its_own_lookup() {
    let registry = registry();
    let directory = Arc::new(RecordingDirectory::new(registry.clone()));
    let router = app(directory.clone());

    let res = router.clone().oneshot(get("/tenant", Some("acme.example.com"))).await.unwrap();
    assert_eq!(json_body(res).await["data"]["database"], "acme_db");

    assert!(registry.update("acme", |t| t.db_name = "acme_moved".into()));

    let res = router.oneshot(get("/tenant", Some("acme.example.com"))).await.unwrap();
    assert_eq!(json_body(res).await["data"]["database"], "acme_moved");
    assert_eq!(directory.lookups(), vec!["acme".to_string(), "acme".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_tenants_stay_isolated() {
    let directory = Arc::new(RecordingDirectory::new(registry()));
    let router = app(directory.clone());

    let mut handles = Vec::new();
    for i in 0..40 {
        let (tenant, database) = if i % 2 == 0 { ("acme", "acme_db") } else { ("beta", "beta_db") };
        let router = router.clone();
        handles.push(tokio::spawn(async move {
            let host = format!("{}.example.com", tenant);
            let res = router.oneshot(get("/tenant", Some(&host))).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
            let body = json_body(res).await;
            assert_eq!(body["data"]["name"], tenant);
            assert_eq!(body["data"]["database"], database);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let lookups = directory.lookups();
    assert_eq!(lookups.len(), 40);
    assert_eq!(lookups.iter().filter(|n| *n == "acme").count(), 20);
    assert_eq!(lookups.iter().filter(|n| *n == "beta").count(), 20);
}

#[tokio::test]
async fn anonymous_writes_are_rejected_before_tenant_lookup() {
    let directory = Arc::new(RecordingDirectory::new(registry()));
    let req = Request::builder()
        .method("POST")
        .uri("/posts")
        .header(header::HOST, "acme.example.com")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"title":"t","description":"d"}"#))
        .unwrap();
    let res = app(directory.clone()).oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(content_type(&res), "application/problem+json");
    assert_eq!(json_body(res).await["code"], "unauthorized");
    assert!(directory.lookups().is_empty());
}

#[tokio::test]
async fn admin_routes_forbid_plain_users() {
    let directory = Arc::new(RecordingDirectory::new(registry()));
    let router = app(directory.clone());
    let target = Uuid::new_v4();
    let requests = [
        ("GET", "/admin/analytics/summary".to_string()),
        ("POST", format!("/admin/users/{}/ban", target)),
        ("PUT", format!("/admin/posts/{}/visibility", target)),
    ];
    for (method, uri) in requests {
        let req = as_user(Request::builder(), "user")
            .method(method)
            .uri(&uri)
            .header(header::HOST, "acme.example.com")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"visibility":"hidden"}"#))
            .unwrap();
        let res = router.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{} {}", method, uri);
        assert_eq!(json_body(res).await["code"], "forbidden");
    }
    assert!(directory.lookups().is_empty());
}

#[tokio::test]
async fn invalid_listing_queries_are_rejected_before_tenant_lookup() {
    let directory = Arc::new(RecordingDirectory::new(registry()));
    let router = app(directory.clone());

    let res = router.clone().oneshot(get("/posts?limit=0", Some("acme.example.com"))).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(res).await["code"], "validation_error");

    let res = router.clone().oneshot(get("/posts?sortBy=title", Some("acme.example.com"))).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["code"], "bad_request");

    let post = Uuid::new_v4();
    let uri = format!("/posts/{}/comments?cursor=not-a-uuid", post);
    let res = router.clone().oneshot(get(&uri, Some("acme.example.com"))).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let req = as_user(Request::builder(), "user")
        .uri("/posts/bookmarks?limit=51")
        .header(header::HOST, "acme.example.com")
        .body(Body::empty())
        .unwrap();
    let res = router.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    assert!(directory.lookups().is_empty());
}

#[tokio::test]
async fn upload_without_media_storage_is_bad_gateway() {
    let res = app(Arc::new(registry())).oneshot(upload_request(Uuid::new_v4())).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(res).await;
    assert_eq!(body["code"], "storage_error");
    assert_eq!(body["detail"], "an internal error occurred");
}

#[tokio::test]
async fn development_exposes_server_error_detail() {
    let res = app_in(Arc::new(registry()), Environment::Development)
        .oneshot(upload_request(Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(content_type(&res), "application/problem+json");
    let body = json_body(res).await;
    assert_eq!(body["code"], "storage_error");
    assert!(body["detail"].as_str().unwrap().contains("media storage is not configured"));
}

async fn explode() -> &'static str {
    panic!("Host=db1;Username=u;Password=p;Database=acme_db")
}

async fn fail() -> Result<(), AppError> {
    Err(AppError::Internal("Host=db1;Password=p unreachable".into()))
}

#[tokio::test]
async fn panics_and_internal_errors_get_generic_problem_bodies() {
    let router = with_http_layers(
        Router::new().route("/explode", axum::routing::get(explode)).route("/fail", axum::routing::get(fail)),
        1024,
        Environment::Production,
    );
    for uri in ["/explode", "/fail"] {
        let res = router.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
        assert_eq!(content_type(&res), "application/problem+json");
        let body = json_body(res).await;
        assert_eq!(body["code"], "internal_error");
        assert_eq!(body["detail"], "an internal error occurred");
        assert!(!body.to_string().contains("Password"));
    }
}
