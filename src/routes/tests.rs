use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tower::ServiceExt;

use super::create_router;
use crate::auth::jwt::sign_token;
use crate::config::AdminAccount;
use crate::handlers::auth::ensure_admin;
use crate::media::MediaStore;
use crate::state::{AppState, AuthSettings};

const SECRET: &str = "test-secret";
const BOUNDARY: &str = "catalog-test-boundary";

fn test_state(pool: PgPool) -> AppState {
    let root = std::env::temp_dir().join(format!("catalog-routes-{}", uuid::Uuid::new_v4()));
    AppState::new(
        pool,
        MediaStore::new(root, "/media/"),
        AuthSettings { jwt_secret: SECRET.to_string(), token_ttl_hours: 1 },
    )
}

/// A pool that never connects; requests that reach the database fail fast.
fn unreachable_pool() -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy("postgres://catalog@127.0.0.1:1/catalog")
        .unwrap()
}

fn app(state: &AppState) -> Router {
    create_router(state.clone(), 1024 * 1024)
}

fn token() -> String {
    sign_token(1, "tester", SECRET, 1).unwrap()
}

fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Body {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn multipart_request(
    method: &str,
    uri: &str,
    auth: Option<&str>,
    fields: &[(&str, &str)],
    image: Option<(&str, &[u8])>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
    if let Some(value) = auth {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(multipart_body(fields, image)).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };
    (status, json)
}

#[tokio::test]
async fn api_root_lists_resources() {
    let state = test_state(unreachable_pool());
    let (status, json) = send(&app(&state), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["products"], "/products/");
    assert_eq!(json["product-types"], "/product-types/");
}

#[tokio::test]
async fn health_check_responds_ok() {
    let state = test_state(unreachable_pool());
    let (status, body) = send(&app(&state), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn anonymous_writes_are_rejected() {
    let state = test_state(unreachable_pool());
    let app = app(&state);

    let requests = [
        multipart_request("POST", "/products/", None, &[("name", "Milk")], None),
        multipart_request("PUT", "/products/1/", None, &[("name", "Milk")], None),
        multipart_request("PATCH", "/products/1/", None, &[("name", "Milk")], None),
        multipart_request("POST", "/product-types/", None, &[("name", "Dairy")], None),
        multipart_request("PUT", "/product-types/1/", None, &[("name", "Dairy")], None),
        Request::builder().method("DELETE").uri("/products/1/").body(Body::empty()).unwrap(),
        Request::builder().method("DELETE").uri("/product-types/1/").body(Body::empty()).unwrap(),
    ];

    for request in requests {
        let (status, json) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "Authentication credentials were not provided.");
    }
}

#[tokio::test]
async fn bad_tokens_are_rejected() {
    let state = test_state(unreachable_pool());
    let app = app(&state);
    let forged = sign_token(1, "tester", "another-secret", 1).unwrap();

    for auth in [format!("Token {forged}"), "Token garbage".to_string(), format!("Basic {}", token())] {
        let request = multipart_request("POST", "/product-types/", Some(&auth), &[("name", "Dairy")], None);
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{auth}");
    }
}

#[tokio::test]
async fn authenticated_write_reaches_handler_validation() {
    let state = test_state(unreachable_pool());
    let app = app(&state);

    // Both header styles pass the gate; validation fails before any query runs.
    for auth in [format!("Token {}", token()), format!("Bearer {}", token())] {
        let request = multipart_request("POST", "/products/", Some(&auth), &[("name", "Milk"), ("product_type", "dairy")], None);
        let (status, json) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid product type id \"dairy\".");
    }

    let request = multipart_request("POST", "/product-types/", Some(&format!("Token {}", token())), &[("name", "  ")], None);
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "name: This field may not be blank.");
}

#[tokio::test]
async fn malformed_list_filter_is_bad_request() {
    let state = test_state(unreachable_pool());
    let (status, json) = send(&app(&state), get("/products/?product_type_id=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid product_type_id \"abc\".");
}

#[tokio::test]
async fn uploaded_media_is_served() {
    let state = test_state(unreachable_pool());
    let dir = state.media.root().join("product_images");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(dir.join("milk.png"), b"png-bytes").await.unwrap();

    let response = app(&state).oneshot(get("/media/product_images/milk.png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"png-bytes");

    let _ = tokio::fs::remove_dir_all(state.media.root()).await;
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let state = test_state(unreachable_pool());
    let app = create_router(state.clone(), 1024);

    let image = vec![0u8; 4096];
    let request = multipart_request("POST", "/product-types/", Some(&format!("Token {}", token())), &[("name", "Dairy")], Some(("dairy.png", &image[..])));
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(json["error"].as_str().unwrap().contains("too large"), "{json}");
}

#[tokio::test]
async fn token_auth_accepts_form_bodies() {
    let state = test_state(unreachable_pool());
    let app = app(&state);

    // Blank fields fail validation before any lookup, so each body format is
    // shown to parse without a database.
    let urlencoded = Request::builder()
        .method("POST")
        .uri("/token-auth/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("username=admin&password="))
        .unwrap();
    let (status, json) = send(&app, urlencoded).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "password: This field may not be blank.");

    let multipart = multipart_request("POST", "/token-auth/", None, &[("password", "secret")], None);
    let (status, json) = send(&app, multipart).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "username: This field may not be blank.");

    let json_body = Request::builder()
        .method("POST")
        .uri("/token-auth/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"username":"  "}"#))
        .unwrap();
    let (status, json) = send(&app, json_body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "username: This field may not be blank.");

    let plain = Request::builder()
        .method("POST")
        .uri("/token-auth/")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("admin:secret"))
        .unwrap();
    let (status, _) = send(&app, plain).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

// The tests below need a Postgres server: run with
// `DATABASE_URL=postgres://... cargo test -- --ignored`.

fn auth_header() -> String {
    format!("Token {}", token())
}

async fn create_product_type(app: &Router, name: &str, image: Option<(&str, &[u8])>) -> Value {
    let request = multipart_request("POST", "/product-types/", Some(&auth_header()), &[("name", name), ("description", "desc")], image);
    let (status, json) = send(app, request).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json
}

async fn create_product(app: &Router, name: &str, type_id: i64, image: Option<(&str, &[u8])>) -> Value {
    let type_id = type_id.to_string();
    let request = multipart_request(
        "POST",
        "/products/",
        Some(&auth_header()),
        &[("name", name), ("description", "tasty"), ("product_type", &type_id)],
        image,
    );
    let (status, json) = send(app, request).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json
}

#[sqlx::test]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn duplicate_names_are_rejected(pool: PgPool) {
    let state = test_state(pool);
    let app = app(&state);

    let dairy = create_product_type(&app, "Dairy", None).await;
    let request = multipart_request("POST", "/product-types/", Some(&auth_header()), &[("name", "Dairy")], None);
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Product Type with this name already exists.");

    let type_id = dairy["id"].as_i64().unwrap();
    create_product(&app, "Milk", type_id, None).await;
    let request = multipart_request(
        "POST",
        "/products/",
        Some(&auth_header()),
        &[("name", "Milk"), ("product_type", &type_id.to_string())],
        None,
    );
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Product with this name already exists.");

    // Renaming onto another record's name is rejected too.
    let cheese = create_product(&app, "Cheese", type_id, None).await;
    let uri = format!("/products/{}/", cheese["id"]);
    let (status, _) = send(&app, multipart_request("PUT", &uri, Some(&auth_header()), &[("name", "Milk")], None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn product_requires_existing_type(pool: PgPool) {
    let state = test_state(pool);
    let app = app(&state);

    let request = multipart_request("POST", "/products/", Some(&auth_header()), &[("name", "Milk"), ("product_type", "999")], None);
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Product type with id 999 does not exist.");

    let request = multipart_request("POST", "/products/", Some(&auth_header()), &[("name", "Milk")], None);
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Moving an existing product to a missing type is rejected and leaves the row alone.
    let dairy = create_product_type(&app, "Dairy", None).await;
    let milk = create_product(&app, "Milk", dairy["id"].as_i64().unwrap(), None).await;
    let uri = format!("/products/{}/", milk["id"]);
    let request = multipart_request("PUT", &uri, Some(&auth_header()), &[("name", "Oat Milk"), ("product_type", "999")], None);
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Product type with id 999 does not exist.");

    let (status, json) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, milk);
}

#[sqlx::test]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn public_reads_nest_product_type(pool: PgPool) {
    let state = test_state(pool);
    let app = app(&state);

    let dairy = create_product_type(&app, "Dairy", Some(("dairy.JPG", &b"jpg"[..]))).await;
    assert_eq!(dairy["image"], "/media/product_type_images/dairy.jpg");
    let milk = create_product(&app, "Fresh Milk", dairy["id"].as_i64().unwrap(), Some(("IMG_1.png", &b"png"[..]))).await;
    assert_eq!(milk["image"], "/media/product_images/fresh-milk.png");

    let (status, json) = send(&app, get(&format!("/products/{}/", milk["id"]))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Fresh Milk");
    assert_eq!(json["product_type"]["name"], "Dairy");
    assert_eq!(json["product_type"]["description"], "desc");

    let (status, json) = send(&app, get("/product-types/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, get("/products/424242/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let _ = tokio::fs::remove_dir_all(state.media.root()).await;
}

#[sqlx::test]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn renaming_a_record_renames_its_image(pool: PgPool) {
    let state = test_state(pool);
    let app = app(&state);
    let root = state.media.root().to_path_buf();

    let dairy = create_product_type(&app, "Dairy", Some(("d.png", &b"png"[..]))).await;
    let milk = create_product(&app, "Milk", dairy["id"].as_i64().unwrap(), Some(("m.gif", &b"gif"[..]))).await;

    let uri = format!("/products/{}/", milk["id"]);
    let (status, json) = send(&app, multipart_request("PUT", &uri, Some(&auth_header()), &[("name", "Whole Milk")], None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["image"], "/media/product_images/whole-milk.gif");
    assert_eq!(json["description"], "tasty");
    assert!(root.join("product_images/whole-milk.gif").exists());
    assert!(!root.join("product_images/milk.gif").exists());

    let uri = format!("/product-types/{}/", dairy["id"]);
    let (status, json) = send(&app, multipart_request("PATCH", &uri, Some(&auth_header()), &[("name", "Dairy Goods")], None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["image"], "/media/product_type_images/dairy-goods.png");
    assert!(root.join("product_type_images/dairy-goods.png").exists());
    assert!(!root.join("product_type_images/dairy.png").exists());

    let _ = tokio::fs::remove_dir_all(root).await;
}

#[sqlx::test]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn new_upload_replaces_old_image(pool: PgPool) {
    let state = test_state(pool);
    let app = app(&state);
    let root = state.media.root().to_path_buf();

    let dairy = create_product_type(&app, "Dairy", Some(("d.jpg", &b"old"[..]))).await;
    let uri = format!("/product-types/{}/", dairy["id"]);
    let request = multipart_request("PUT", &uri, Some(&auth_header()), &[("name", "Dairy"), ("header", "")], Some(("new.png", &b"new"[..])));
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["image"], "/media/product_type_images/dairy.png");
    assert_eq!(json["header"], Value::Null);
    assert!(!root.join("product_type_images/dairy.jpg").exists());
    assert_eq!(tokio::fs::read(root.join("product_type_images/dairy.png")).await.unwrap(), b"new");

    let _ = tokio::fs::remove_dir_all(root).await;
}

#[sqlx::test]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn deleting_records_removes_images(pool: PgPool) {
    let state = test_state(pool);
    let app = app(&state);
    let root = state.media.root().to_path_buf();

    let dairy = create_product_type(&app, "Dairy", Some(("d.png", &b"png"[..]))).await;
    let type_id = dairy["id"].as_i64().unwrap();
    let milk = create_product(&app, "Milk", type_id, Some(("m.png", &b"png"[..]))).await;
    create_product(&app, "Cheese", type_id, Some(("c.png", &b"png"[..]))).await;

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/products/{}/", milk["id"]))
        .header(header::AUTHORIZATION, auth_header())
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!root.join("product_images/milk.png").exists());
    assert!(root.join("product_images/cheese.png").exists());

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/product-types/{type_id}/"))
        .header(header::AUTHORIZATION, auth_header())
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!root.join("product_type_images/dairy.png").exists());
    assert!(!root.join("product_images/cheese.png").exists());

    let (_, json) = send(&app, get("/products/")).await;
    assert_eq!(json.as_array().unwrap().len(), 0);

    let _ = tokio::fs::remove_dir_all(root).await;
}

#[sqlx::test]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn list_filters_and_paginates(pool: PgPool) {
    let state = test_state(pool);
    let app = app(&state);

    let dairy = create_product_type(&app, "Dairy", None).await["id"].as_i64().unwrap();
    let bakery = create_product_type(&app, "Bakery", None).await["id"].as_i64().unwrap();
    for n in 1..=12 {
        create_product(&app, &format!("Milk {n:02}"), dairy, None).await;
    }
    create_product(&app, "Sourdough", bakery, None).await;
    create_product(&app, "Buttermilk Bread", bakery, None).await;

    let (_, json) = send(&app, get("/products/")).await;
    assert_eq!(json.as_array().unwrap().len(), 14);

    let (_, json) = send(&app, get("/products/?paginate=true")).await;
    assert_eq!(json["count"], 14);
    assert_eq!(json["results"].as_array().unwrap().len(), 10);
    assert_eq!(json["next"], "/products/?paginate=true&page=2");
    assert_eq!(json["previous"], Value::Null);

    let (_, json) = send(&app, get("/products/?paginate=true&page=2")).await;
    assert_eq!(json["results"].as_array().unwrap().len(), 4);
    assert_eq!(json["next"], Value::Null);
    assert_eq!(json["previous"], "/products/?paginate=true");

    let (status, _) = send(&app, get("/products/?paginate=true&page=3")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Substring vs prefix search.
    let (_, json) = send(&app, get("/products/?keyword=MILK")).await;
    assert_eq!(json.as_array().unwrap().len(), 13);
    let (_, json) = send(&app, get("/products/?search_keyword=milk")).await;
    assert_eq!(json.as_array().unwrap().len(), 12);

    // Type filters by id under either name, or by type name.
    let (_, json) = send(&app, get(&format!("/products/?product_type_id={bakery}"))).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
    let (_, json) = send(&app, get(&format!("/products/?product_type={bakery}&keyword=milk"))).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    let (_, json) = send(&app, get("/products/?product_type=bak&paginate=true")).await;
    assert_eq!(json["count"], 2);

    // LIKE wildcards in input match literally.
    let (_, json) = send(&app, get("/products/?keyword=%25")).await;
    assert_eq!(json.as_array().unwrap().len(), 0);
}

#[sqlx::test]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn token_auth_issues_usable_token(pool: PgPool) {
    ensure_admin(&pool, &AdminAccount { username: "admin".into(), password: "changeme".into() })
        .await
        .unwrap();
    let state = test_state(pool);
    let app = app(&state);

    let login = |password: &str| {
        Request::builder()
            .method("POST")
            .uri("/token-auth/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!(r#"{{"username":"admin","password":"{password}"}}"#)))
            .unwrap()
    };

    let (status, json) = send(&app, login("wrong")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Unable to log in with provided credentials.");

    let (status, json) = send(&app, login("changeme")).await;
    assert_eq!(status, StatusCode::OK);
    let token = json["token"].as_str().unwrap().to_string();

    let request = multipart_request("POST", "/product-types/", Some(&format!("Token {token}")), &[("name", "Dairy")], None);
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);

    let form_login = Request::builder()
        .method("POST")
        .uri("/token-auth/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("username=admin&password=changeme"))
        .unwrap();
    let (status, json) = send(&app, form_login).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["token"].is_string());
}
