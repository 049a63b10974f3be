use utoipa::OpenApi;
use utoipa::openapi::server::{ServerBuilder, ServerVariableBuilder};
use utoipa::{Modify, openapi};

/// Swagger UI 的 Servers：业务接口挂在 `config.api.prefix` 下，`/health` 在根路径。
struct ApiServers;

impl Modify for ApiServers {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let api = ServerBuilder::new()
            .url("{api_prefix}")
            .description(Some("横幅接口（默认 /api/v1）"))
            .parameter(
                "api_prefix",
                ServerVariableBuilder::new()
                    .default_value("/api/v1")
                    .description(Some("对应 config.api.prefix（APP_API__PREFIX 可覆盖）")),
            )
            .build();

        let root = ServerBuilder::new()
            .url("/")
            .description(Some("根路径（/health）"))
            .build();

        openapi.servers = Some(vec![api, root]);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::features::health::handler::health_check,
        crate::features::banner::handler::get_banner,
        crate::features::banner::handler::get_quote_banner,
        crate::features::banner::handler::post_banner,
        crate::features::banner::handler::list_themes,
    ),
    components(schemas(
        crate::error::ProblemDetails,
        crate::features::banner::types::BannerBody,
        crate::features::banner::types::ThemeSummary,
        crate::features::banner::types::LayoutMode,
        crate::features::banner::types::OutputFormat,
        crate::features::health::handler::HealthResponse,
    )),
    modifiers(&ApiServers),
    tags(
        (
            name = "Banner",
            description = "横幅渲染：底部叠加条与居中引用卡片（jpeg/png/svg 输出），以及主题目录。"
        ),
        (name = "Health", description = "健康检查：服务探活。"),
    ),
    info(
        title = "Banner Backend API",
        version = env!("CARGO_PKG_VERSION"),
        description = "横幅文字叠加服务（Axum + utoipa）。除 /health 外，接口实际挂载在 `config.api.prefix`（默认 /api/v1）下，paths 不含该前缀。"
    )
)]
pub struct ApiDoc;
