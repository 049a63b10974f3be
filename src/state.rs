use axum::body::Bytes;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::features::banner::compositor::RasterCompositor;
use crate::features::banner::fetch::ImageFetcher;
use crate::features::banner::fonts::FontCatalog;
use crate::features::banner::service::BannerService;
use crate::features::banner::theme::ThemeRegistry;

/// 聚合的应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub themes: Arc<ThemeRegistry>,
    pub banner: Arc<BannerService>,
    /// 横幅响应缓存（按图片字节大小加权）；关闭缓存时为 None
    pub render_cache: Option<Cache<String, Bytes>>,
}

impl AppState {
    /// 由配置与启动时加载好的字体目录构建状态
    pub fn build(config: AppConfig, fonts: FontCatalog) -> Result<Self, AppError> {
        let themes = Arc::new(ThemeRegistry::builtin());
        let render = &config.render;

        let banner = BannerService::new(
            themes.clone(),
            Arc::new(fonts),
            Arc::new(RasterCompositor::new(render.optimize_speed)),
            ImageFetcher::new(&config.fetch)?,
            Arc::new(Semaphore::new(render.effective_parallelism())),
        )
        .with_permit_timeout(render.permit_timeout_secs);

        let render_cache = render.cache_enabled.then(|| {
            Cache::builder()
                .weigher(|_k, v: &Bytes| v.len().try_into().unwrap_or(u32::MAX))
                .max_capacity(render.cache_max_bytes)
                .time_to_live(Duration::from_secs(render.cache_ttl_secs))
                .time_to_idle(Duration::from_secs(render.cache_tti_secs))
                .build()
        });

        Ok(Self {
            config: Arc::new(config),
            themes,
            banner: Arc::new(banner),
            render_cache,
        })
    }
}
