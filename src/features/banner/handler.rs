use std::time::Instant;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{RawQuery, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use sha2::{Digest, Sha256};

use super::params::{RequestParams, decompose_request_params, parse_render_request};
use super::types::{BannerBody, LayoutMode, OutputFormat, RenderRequest, ThemeSummary};
use crate::error::{AppError, ProblemDetails};
use crate::state::AppState;

const NO_STORE: &str = "no-store";

#[utoipa::path(
    get,
    path = "/banner",
    summary = "生成底部叠加横幅",
    description = "在底图底部叠加渐变条、标题与网址。url 参数之后的未知参数会被视为图片地址的一部分重新拼回。",
    params(
        ("title" = String, Query, description = "标题（必填，最多 300 字符）"),
        ("website" = Option<String>, Query, description = "网址行文本"),
        ("url" = Option<String>, Query, description = "底图地址（http/https 或 data URI）"),
        ("design" = Option<String>, Query, description = "主题 id，未知主题回退 default"),
        ("w" = Option<u32>, Query, description = "画布宽度 100-4096"),
        ("h" = Option<u32>, Query, description = "画布高度 100-4096"),
        ("hl" = Option<String>, Query, description = "强调色列表，逗号分隔"),
        ("format" = Option<String>, Query, description = "输出格式：jpeg|png|svg，默认 jpeg"),
        ("quality" = Option<u8>, Query, description = "JPEG 质量 1-100，默认 85"),
        ("mode" = Option<String>, Query, description = "覆盖布局模式：bottom|quote")
    ),
    responses(
        (status = 200, description = "横幅图片字节"),
        (status = 400, description = "图片数据无效", body = ProblemDetails),
        (status = 422, description = "参数校验失败或渲染失败", body = ProblemDetails),
        (status = 503, description = "渲染队列繁忙", body = ProblemDetails)
    ),
    tag = "Banner"
)]
pub async fn get_banner(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    let params = decompose_request_params(query.as_deref().unwrap_or_default());
    let request = parse_render_request(&params, LayoutMode::BottomAnchored, None)?;
    respond(&state, request).await
}

#[utoipa::path(
    get,
    path = "/banner/quote",
    summary = "生成居中引用卡片",
    description = "居中排版的引用卡片，参数与 /banner 相同。未提供 title 时随机选取内置语录，此时响应不可缓存。",
    params(
        ("title" = Option<String>, Query, description = "引用内容，缺省时随机"),
        ("website" = Option<String>, Query, description = "署名行"),
        ("design" = Option<String>, Query, description = "主题 id")
    ),
    responses(
        (status = 200, description = "引用卡片图片字节"),
        (status = 400, description = "图片数据无效", body = ProblemDetails),
        (status = 422, description = "参数校验失败或渲染失败", body = ProblemDetails)
    ),
    tag = "Banner"
)]
pub async fn get_quote_banner(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    let params = decompose_request_params(query.as_deref().unwrap_or_default());
    let request = parse_render_request(&params, LayoutMode::CenteredQuote, None)?;
    respond(&state, request).await
}

#[utoipa::path(
    post,
    path = "/banner",
    summary = "以 JSON 提交横幅渲染",
    description = "请求体中的 image 为 base64 或 data URI 底图，优先于 params.url；params 键名与 GET 查询参数一致。",
    request_body = BannerBody,
    responses(
        (status = 200, description = "横幅图片字节"),
        (status = 400, description = "图片数据无效", body = ProblemDetails),
        (status = 422, description = "参数校验失败或渲染失败", body = ProblemDetails)
    ),
    tag = "Banner"
)]
pub async fn post_banner(
    State(state): State<AppState>,
    Json(body): Json<BannerBody>,
) -> Result<Response, AppError> {
    let params = RequestParams::from_json(&body.params);
    let request = parse_render_request(&params, body.mode, body.image.as_deref())?;
    respond(&state, request).await
}

#[utoipa::path(
    get,
    path = "/themes",
    summary = "主题目录",
    description = "列出全部内置主题及其主要样式参数。",
    responses((status = 200, description = "主题列表", body = [ThemeSummary])),
    tag = "Banner"
)]
pub async fn list_themes(State(state): State<AppState>) -> Json<Vec<ThemeSummary>> {
    Json(state.themes.list().iter().map(ThemeSummary::from).collect())
}

/// 缓存键：规范化后的请求（含输出格式与质量）取 SHA-256
fn cache_key(request: &RenderRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{request:?}").as_bytes());
    format!("banner:{}", hex::encode(hasher.finalize()))
}

/// 引用模式下的空标题会随机选语录，结果不能复用
fn uses_random_content(request: &RenderRequest) -> bool {
    request.layout_mode == LayoutMode::CenteredQuote && request.title.trim().is_empty()
}

fn image_headers(
    format: OutputFormat,
    theme_id: &str,
    cache_control: &str,
) -> Result<HeaderMap, AppError> {
    let filename = format!(
        "banner-{}-{}.{}",
        theme_id,
        chrono::Utc::now().format("%Y%m%d%H%M%S"),
        format.extension()
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(format.content_type()),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("inline; filename=\"{filename}\""))
            .map_err(|e| AppError::Internal(format!("非法的文件名响应头: {e}")))?,
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_str(cache_control)
            .map_err(|e| AppError::Internal(format!("非法的缓存响应头: {e}")))?,
    );
    Ok(headers)
}

fn image_response(
    bytes: Bytes,
    format: OutputFormat,
    theme_id: &str,
    cache_control: &str,
) -> Result<Response, AppError> {
    let headers = image_headers(format, theme_id, cache_control)?;
    Ok((StatusCode::OK, headers, bytes).into_response())
}

/// 所有渲染路由共用：查缓存 → 渲染 → 写缓存 → 组装响应
async fn respond(state: &AppState, request: RenderRequest) -> Result<Response, AppError> {
    let t_total = Instant::now();
    let public_cache = format!(
        "public, max-age={}",
        state.config.render.client_max_age_secs
    );
    let theme_id = state.themes.resolve(&request.theme_id).id;
    let format = request.format;

    let cache = state
        .render_cache
        .as_ref()
        .filter(|_| !uses_random_content(&request));
    let key = cache.map(|_| cache_key(&request));

    if let (Some(cache), Some(key)) = (cache, key.as_ref()) {
        if let Some(bytes) = cache.get(key).await {
            tracing::info!(
                "横幅缓存命中: {} ({} 字节, {:?})",
                key,
                bytes.len(),
                t_total.elapsed()
            );
            return image_response(bytes, format, theme_id, &public_cache);
        }
        tracing::debug!("横幅缓存未命中: {}", key);
    }

    let rendered = state.banner.render(request).await?;

    let cache_control = if rendered.cacheable {
        public_cache.as_str()
    } else {
        NO_STORE
    };
    // 降级结果不写缓存，下次请求仍按完整参数渲染
    if rendered.cacheable
        && !rendered.degraded
        && let (Some(cache), Some(key)) = (cache, key)
    {
        cache.insert(key, rendered.bytes.clone()).await;
    }

    image_response(
        rendered.bytes,
        rendered.format,
        &rendered.theme_id,
        cache_control,
    )
}

/// 横幅相关路由（挂载在业务前缀下）
pub fn create_banner_router() -> Router<AppState> {
    Router::new()
        .route("/banner", get(get_banner).post(post_banner))
        .route("/banner/quote", get(get_quote_banner))
        .route("/themes", get(list_themes))
}
