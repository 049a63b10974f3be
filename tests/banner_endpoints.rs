use std::io::Cursor;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use banner_backend::features::banner::fonts::FontCatalog;
use banner_backend::{AppConfig, AppState, build_app};
use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, Rgb, RgbImage};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    let state = AppState::build(AppConfig::default(), FontCatalog::empty()).expect("state");
    build_app(state)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn header_str<'a>(resp: &'a axum::response::Response, name: header::HeaderName) -> &'a str {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec()
}

fn png_base64(w: u32, h: u32) -> String {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([30, 90, 160])));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .expect("encode png");
    general_purpose::STANDARD.encode(out)
}

#[tokio::test]
async fn health_is_served_without_prefix() {
    let resp = app().oneshot(get("/health")).await.expect("health");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!header_str(&resp, header::HeaderName::from_static("x-request-id")).is_empty());
    let body: Value = serde_json::from_slice(&body_bytes(resp).await).expect("json");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "banner-backend");
    assert!(body["themes"].as_u64().unwrap_or(0) > 0);
}

#[tokio::test]
async fn themes_endpoint_lists_builtin_catalog() {
    let resp = app().oneshot(get("/api/v1/themes")).await.expect("themes");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(resp).await).expect("json");
    let ids: Vec<&str> = body
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|t| t["id"].as_str())
        .collect();
    assert!(ids.contains(&"default"));
    assert!(ids.contains(&"modern"));
    assert!(body[0]["displayName"].is_string());
}

#[tokio::test]
async fn get_banner_renders_svg_with_download_headers() {
    let resp = app()
        .oneshot(get(
            "/api/v1/banner?title=Hello%20World&website=example.com&format=svg&w=400&h=300&design=nope",
        ))
        .await
        .expect("banner");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(header_str(&resp, header::CONTENT_TYPE).starts_with("image/svg+xml"));
    assert_eq!(header_str(&resp, header::CACHE_CONTROL), "public, max-age=300");
    let disposition = header_str(&resp, header::CONTENT_DISPOSITION).to_string();
    assert!(
        disposition.contains("banner-default-") && disposition.ends_with(".svg\""),
        "{disposition}"
    );

    let svg = String::from_utf8(body_bytes(resp).await).expect("utf8");
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("width=\"400\""));
    assert!(svg.contains("Hello"));
    assert!(svg.contains("example.com"));
}

#[tokio::test]
async fn repeated_request_is_served_from_cache() {
    let app = app();
    let uri = "/api/v1/banner?title=Cache%20me&format=svg&w=300&h=200";
    let first = app.clone().oneshot(get(uri)).await.expect("first");
    assert_eq!(first.status(), StatusCode::OK);
    let first = body_bytes(first).await;
    let second = app.oneshot(get(uri)).await.expect("second");
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(first, body_bytes(second).await);
}

#[tokio::test]
async fn placeholder_banner_is_not_stored() {
    let resp = app()
        .oneshot(get(
            "/api/v1/banner?title=Fallback&format=svg&w=300&h=200&url=http://127.0.0.1:9/gone.jpg",
        ))
        .await
        .expect("banner");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, header::CACHE_CONTROL), "no-store");
}

#[tokio::test]
async fn missing_title_is_a_validation_problem() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/api/v1/banner?website=example.com")
                .header("x-request-id", "it.banner-001")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("banner");
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        header_str(&resp, header::CONTENT_TYPE),
        "application/problem+json"
    );
    let body: Value = serde_json::from_slice(&body_bytes(resp).await).expect("json");
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert_eq!(body["status"], 422);
    assert_eq!(body["requestId"], "it.banner-001");
}

#[tokio::test]
async fn quote_without_title_uses_random_quote_and_no_store() {
    let resp = app()
        .oneshot(get("/api/v1/banner/quote?format=svg&w=400&h=500"))
        .await
        .expect("quote");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, header::CACHE_CONTROL), "no-store");
    let svg = String::from_utf8(body_bytes(resp).await).expect("utf8");
    assert!(svg.contains("height=\"500\""));
}

#[tokio::test]
async fn post_with_inline_png_returns_png() {
    let body = json!({
        "image": format!("data:image/png;base64,{}", png_base64(80, 40)),
        "params": {
            "title": "Inline image upload",
            "format": "png",
            "w": 320,
            "h": 200,
            "hl": "#FF0000"
        }
    });
    let resp = app()
        .oneshot(post_json("/api/v1/banner", body))
        .await
        .expect("post");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, header::CONTENT_TYPE), "image/png");
    let bytes = body_bytes(resp).await;
    let decoded = image::load_from_memory(&bytes).expect("png");
    // 窄画布上标题折成多行时，底部渐变条可能高于画布，输出高度随之增长
    assert_eq!(decoded.width(), 320);
    assert!(decoded.height() >= 200, "height {}", decoded.height());
}

#[tokio::test]
async fn post_with_malformed_image_is_bad_request() {
    let body = json!({
        "image": "data:image/png;base64,@@not-base64@@",
        "params": { "title": "Broken upload" }
    });
    let resp = app()
        .oneshot(post_json("/api/v1/banner", body))
        .await
        .expect("post");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body_bytes(resp).await).expect("json");
    assert_eq!(body["code"], "INVALID_IMAGE_DATA");
}

#[tokio::test]
async fn openapi_document_is_exposed() {
    let resp = app()
        .oneshot(get("/api-docs/openapi.json"))
        .await
        .expect("openapi");
    assert_eq!(resp.status(), StatusCode::OK);
    let doc: Value = serde_json::from_slice(&body_bytes(resp).await).expect("json");
    assert!(doc["paths"]["/banner"].is_object());
}
