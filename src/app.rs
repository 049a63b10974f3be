use axum::{Router, routing::get};
use tower_http::compression::CompressionLayer;
use tower_http::compression::predicate::{NotForContentType, Predicate, SizeAbove};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::features::{banner, health};
use crate::openapi::ApiDoc;
use crate::request_id::request_id_middleware;
use crate::state::AppState;

/// 压缩策略：JSON/SVG/problem+json 压缩；jpeg/png 等已压缩的图片不再压缩。
pub fn compression_predicate() -> impl Predicate {
    SizeAbove::default()
        .and(NotForContentType::GRPC)
        .and(NotForContentType::IMAGES)
        .and(NotForContentType::SSE)
        .and(NotForContentType::const_new("application/octet-stream"))
}

/// 组装完整路由：`/health` 与 `/docs` 在根路径，横幅接口挂在 `api.prefix` 下。
pub fn build_app(state: AppState) -> Router {
    let prefix = state.config.api.prefix.clone();
    let api_router = Router::<AppState>::new().merge(banner::create_banner_router());

    Router::<AppState>::new()
        .route("/health", get(health::health_check))
        .nest(&prefix, api_router)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(CompressionLayer::new().compress_when(compression_predicate()))
        .layer(axum::middleware::from_fn(request_id_middleware))
}

#[cfg(test)]
mod tests {
    use super::compression_predicate;
    use axum::body::Body;
    use axum::http::{Response, header};
    use tower_http::compression::predicate::Predicate;

    fn should_compress_for(ct: &str) -> bool {
        let resp = Response::builder()
            .header(header::CONTENT_TYPE, ct)
            .body(Body::from(vec![b'x'; 2048]))
            .expect("response");
        compression_predicate().should_compress(&resp)
    }

    #[test]
    fn raster_banners_are_not_recompressed() {
        assert!(!should_compress_for("image/jpeg"));
        assert!(!should_compress_for("image/png"));
    }

    #[test]
    fn svg_and_json_are_compressed() {
        assert!(should_compress_for("image/svg+xml; charset=utf-8"));
        assert!(should_compress_for("application/json"));
        assert!(should_compress_for("application/problem+json"));
    }
}
