use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::util::ServiceExt;

pub async fn request(
    app: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
    headers: &[(&str, String)],
) -> Response {
    let mut builder = Request::builder().method(method).uri(path);

    for (k, v) in headers {
        builder = builder.header(*k, v.as_str());
    }

    let req = if let Some(payload) = body {
        builder
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("empty body")
    };

    app.clone().oneshot(req).await.expect("oneshot response")
}

/// Sends a raw body with the given content type.
pub async fn request_raw(
    app: &Router,
    method: Method,
    path: &str,
    content_type: &str,
    body: String,
) -> Response {
    let req = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", content_type)
        .body(Body::from(body))
        .expect("raw request body");
    app.clone().oneshot(req).await.expect("oneshot response")
}

pub async fn response_json(resp: Response) -> (StatusCode, HeaderMap, Value) {
    let (status, headers, text) = response_text(resp).await;
    let json = if text.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_str::<Value>(&text).expect("parse json body")
    };
    (status, headers, json)
}

pub async fn response_text(resp: Response) -> (StatusCode, HeaderMap, String) {
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body bytes");
    (status, headers, String::from_utf8_lossy(&bytes).to_string())
}

/// `request` + `response_json`, dropping the headers.
pub async fn call(app: &Router, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, _, json) = response_json(request(app, method, path, body, &[]).await).await;
    (status, json)
}

pub fn assert_json_error(body: &Value, code: &str) {
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], code, "unexpected error body: {body}");
    assert!(body.get("message").is_some());
    assert!(body["traceId"].is_string());
}

pub fn assert_status_ok_json(status: StatusCode, body: &Value) {
    assert!(status.is_success(), "status {status}, body {body}");
    assert_eq!(body["success"], true);
    assert!(body.get("data").is_some());
}
