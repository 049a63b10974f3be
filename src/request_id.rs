use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// 请求/响应中携带 request_id 的头
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;

/// 请求扩展中的 request_id
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

tokio::task_local! {
    static TASK_REQUEST_ID: String;
}

/// 当前任务绑定的 request_id（problem+json 错误响应会带上它）
pub fn current_request_id() -> Option<String> {
    TASK_REQUEST_ID.try_with(Clone::clone).ok()
}

fn is_acceptable(id: &str) -> bool {
    (1..=MAX_REQUEST_ID_LEN).contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

fn incoming_or_generated(req: &Request) -> String {
    req.headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| is_acceptable(id))
        .map(str::to_string)
        .unwrap_or_else(|| format!("bnr_{}", Uuid::new_v4().simple()))
}

/// 透传客户端的 `X-Request-Id`（缺失或不合法时生成），回写到响应头
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let id = incoming_or_generated(&req);
    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = TASK_REQUEST_ID
        .scope(id.clone(), async move { next.run(req).await })
        .await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn accepts_safe_ids_only() {
        assert!(is_acceptable("bnr-42_a.b"));
        assert!(!is_acceptable(""));
        assert!(!is_acceptable("has space"));
        assert!(!is_acceptable(&"x".repeat(MAX_REQUEST_ID_LEN + 1)));
    }

    #[test]
    fn generates_when_header_is_unusable() {
        let req = Request::builder()
            .header("x-request-id", "bad/id")
            .body(Body::empty())
            .expect("request");
        assert!(incoming_or_generated(&req).starts_with("bnr_"));

        let req = Request::builder()
            .header("x-request-id", " trace-1 ")
            .body(Body::empty())
            .expect("request");
        assert_eq!(incoming_or_generated(&req), "trace-1");
    }

    #[tokio::test]
    async fn task_local_is_absent_outside_middleware() {
        assert_eq!(current_request_id(), None);
    }
}
