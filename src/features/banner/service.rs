use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use image::DynamicImage;
use tokio::sync::Semaphore;
use tokio::task::spawn_blocking;

use super::autofit::AutoFitSizer;
use super::compositor::{Compositor, image_data_uri};
use super::fetch::ImageFetcher;
use super::fonts::FontCatalog;
use super::highlight::HighlightScorer;
use super::layout::{LayoutOptions, SIDE_PADDING, layout};
use super::quotes;
use super::scene::{SceneInputs, ScenePlan, SlotSource, build};
use super::svg::{SceneImages, SlotFill, SvgOptions, render_svg};
use super::theme::{DesignTheme, ThemeRegistry};
use super::types::{ImageSource, LayoutMode, OutputFormat, RenderRequest};
use super::wrap::wrap;
use crate::error::AppError;

/// 单个标题最多强调的短语数
pub const MAX_HIGHLIGHTS_PER_TITLE: usize = 2;
/// 底图缺失或拉取失败时的占位色
pub const PLACEHOLDER_COLOR: &str = "#1F2937";

/// 渲染结果
#[derive(Debug, Clone)]
pub struct RenderedBanner {
    pub bytes: Bytes,
    pub format: OutputFormat,
    /// 实际使用的主题 id（未知主题已回退）
    pub theme_id: String,
    pub width: u32,
    pub height: u32,
    /// 随机引用语录或底图退回占位色的结果不可缓存
    pub cacheable: bool,
    /// 是否经过降级重试
    pub degraded: bool,
}

/// 底图输入：用户内联数据解码失败是请求错误，远程图片失败只降级为占位
enum BaseInput {
    Missing,
    /// 远程底图拉取失败
    Unavailable,
    Inline(Bytes),
    Remote(Bytes),
}

/// 纯计算管线：主题 → 自动字号折行 → 强调打分 → 布局 → 绘制计划。
pub fn plan_scene(
    themes: &ThemeRegistry,
    scorer: &HighlightScorer,
    request: &RenderRequest,
    logo_size: Option<(u32, u32)>,
) -> ScenePlan {
    let theme = themes.resolve(&request.theme_id);
    let max_width = (f64::from(request.canvas_width) - 2.0 * f64::from(SIDE_PADDING)).max(1.0);
    let base_font = request.base_title_font_size(theme);

    let wrapped = if request.fixed_font_size {
        wrap(&request.title, max_width, base_font, theme.char_width_factor)
    } else {
        AutoFitSizer::for_theme(theme).fit(&request.title, max_width, base_font)
    };

    let max_highlights = if request.highlight_enabled && theme.enable_highlight {
        request
            .highlight_palette(theme)
            .len()
            .min(MAX_HIGHLIGHTS_PER_TITLE)
    } else {
        0
    };
    let segments = scorer.score(&request.title, max_highlights, &request.custom_keywords);

    let options = LayoutOptions {
        canvas_width: request.canvas_width,
        canvas_height: request.canvas_height,
        title_align: request.title_align,
        website: request.website_text(),
        website_font_size: request.website_font_size_for(theme),
        website_align: request.website_align,
        badge: request.top_badge.as_ref(),
        show_decorative_lines: request.show_decorative_lines,
    };
    let layout_result = layout(&wrapped, theme, request.layout_mode, &options);

    build(&SceneInputs {
        request,
        theme,
        wrap: &wrapped,
        segments: &segments,
        layout: &layout_result,
        logo_size,
    })
}

/// 占位色：取主题渐变末端的不透明色，否则使用固定深色
pub fn placeholder_color(theme: &DesignTheme) -> String {
    theme
        .gradient_stops
        .last()
        .map(|s| s.color.as_str())
        .filter(|c| c.starts_with('#'))
        .unwrap_or(PLACEHOLDER_COLOR)
        .to_string()
}

/// 横幅渲染服务：参数已解析完毕，负责拉图、排版、合成与降级重试。
pub struct BannerService {
    themes: Arc<ThemeRegistry>,
    fonts: Arc<FontCatalog>,
    scorer: Arc<HighlightScorer>,
    compositor: Arc<dyn Compositor>,
    fetcher: ImageFetcher,
    render_semaphore: Arc<Semaphore>,
    permit_timeout: Option<Duration>,
}

impl BannerService {
    pub fn new(
        themes: Arc<ThemeRegistry>,
        fonts: Arc<FontCatalog>,
        compositor: Arc<dyn Compositor>,
        fetcher: ImageFetcher,
        render_semaphore: Arc<Semaphore>,
    ) -> Self {
        Self {
            themes,
            fonts,
            scorer: Arc::new(HighlightScorer::default()),
            compositor,
            fetcher,
            render_semaphore,
            permit_timeout: None,
        }
    }

    pub fn with_scorer(mut self, scorer: HighlightScorer) -> Self {
        self.scorer = Arc::new(scorer);
        self
    }

    /// 等待渲染许可的上限（0 表示不限）
    pub fn with_permit_timeout(mut self, secs: u64) -> Self {
        self.permit_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    pub fn themes(&self) -> &ThemeRegistry {
        &self.themes
    }

    /// 引用模式且标题为空时填入随机语录；返回是否使用了随机内容
    fn fill_random_quote(request: &mut RenderRequest) -> bool {
        if request.layout_mode != LayoutMode::CenteredQuote || !request.title.trim().is_empty() {
            return false;
        }
        let quote = quotes::random_quote();
        request.title = quote.text.to_string();
        if request.website_text().is_none() {
            request.website = Some(quotes::attribution(&quote));
        }
        true
    }

    async fn load_base(&self, source: Option<&ImageSource>) -> Result<BaseInput, AppError> {
        match source {
            None => Ok(BaseInput::Missing),
            Some(src @ ImageSource::Inline(_)) => {
                self.fetcher.load(src).await.map(BaseInput::Inline)
            }
            Some(src @ ImageSource::Url(url)) => match self.fetcher.load(src).await {
                Ok(bytes) => Ok(BaseInput::Remote(bytes)),
                Err(e) => {
                    tracing::warn!("底图拉取失败，使用占位色: {} ({})", url, e);
                    Ok(BaseInput::Unavailable)
                }
            },
        }
    }

    async fn load_logo(&self, request: &RenderRequest) -> Option<Bytes> {
        let logo = request.logo.as_ref()?;
        match self.fetcher.load(&logo.source).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!("logo 加载失败，已省略: {}", e);
                None
            }
        }
    }

    pub async fn render(&self, mut request: RenderRequest) -> Result<RenderedBanner, AppError> {
        let started = Instant::now();
        let random = Self::fill_random_quote(&mut request);
        if request.title.trim().is_empty() {
            return Err(AppError::Validation("title 不能为空".into()));
        }

        let base = self.load_base(request.background_image.as_ref()).await?;
        let logo = self.load_logo(&request).await;
        let fetched = started.elapsed();

        let permit = match self.permit_timeout {
            Some(limit) => tokio::time::timeout(limit, self.render_semaphore.clone().acquire_owned())
                .await
                .map_err(|_| AppError::Busy("渲染队列等待超时".into()))?,
            None => self.render_semaphore.clone().acquire_owned().await,
        }
        .map_err(|e| AppError::Internal(format!("渲染信号量已关闭: {e}")))?;

        let ctx = RenderContext {
            themes: self.themes.clone(),
            fonts: self.fonts.clone(),
            scorer: self.scorer.clone(),
            compositor: self.compositor.clone(),
        };
        let mut rendered = spawn_blocking(move || {
            let _permit = permit;
            ctx.render_blocking(request, base, logo)
        })
        .await
        .map_err(|e| AppError::Internal(format!("阻塞渲染任务执行失败: {e}")))??;
        rendered.cacheable &= !random;

        tracing::info!(
            "横幅渲染完成: theme={}, {}x{}, 格式={}, 字节={}, 降级={}, 拉图={:?}, 总计={:?}",
            rendered.theme_id,
            rendered.width,
            rendered.height,
            rendered.format.extension(),
            rendered.bytes.len(),
            rendered.degraded,
            fetched,
            started.elapsed()
        );
        Ok(rendered)
    }
}

/// 阻塞线程中使用的共享资源
struct RenderContext {
    themes: Arc<ThemeRegistry>,
    fonts: Arc<FontCatalog>,
    scorer: Arc<HighlightScorer>,
    compositor: Arc<dyn Compositor>,
}

impl RenderContext {
    fn render_blocking(
        &self,
        request: RenderRequest,
        base: BaseInput,
        logo: Option<Bytes>,
    ) -> Result<RenderedBanner, AppError> {
        let mut placeholder_fallback = false;
        let base_image = match base {
            BaseInput::Missing => None,
            BaseInput::Unavailable => {
                placeholder_fallback = true;
                None
            }
            BaseInput::Inline(bytes) => Some(self.compositor.decode(&bytes)?),
            BaseInput::Remote(bytes) => match self.compositor.decode(&bytes) {
                Ok(img) => Some(img),
                Err(e) => {
                    tracing::warn!("远程底图无法解码，使用占位色: {}", e);
                    placeholder_fallback = true;
                    None
                }
            },
        };
        let logo_image = logo.and_then(|bytes| match self.compositor.decode(&bytes) {
            Ok(img) => Some(img),
            Err(e) => {
                tracing::warn!("logo 无法解码，已省略: {}", e);
                None
            }
        });

        let mut out = match self.attempt(&request, base_image.as_ref(), logo_image.as_ref()) {
            Ok(out) => out,
            Err(e) if e.is_retryable_render_failure() => {
                tracing::warn!("渲染失败，使用降级参数重试: {}", e);
                let reduced = request.reduced_fidelity();
                let mut out = self.attempt(&reduced, base_image.as_ref(), None)?;
                out.degraded = true;
                out
            }
            Err(e) => return Err(e),
        };
        // 上游恢复后应重新拉取真实底图
        if placeholder_fallback {
            out.cacheable = false;
        }
        Ok(out)
    }

    fn attempt(
        &self,
        request: &RenderRequest,
        base: Option<&DynamicImage>,
        logo: Option<&DynamicImage>,
    ) -> Result<RenderedBanner, AppError> {
        let t0 = Instant::now();
        let theme = self.themes.resolve(&request.theme_id);
        let logo_size = logo.map(|img| (img.width(), img.height()));
        let plan = plan_scene(&self.themes, &self.scorer, request, logo_size);
        let t_plan = t0.elapsed();

        let base_fill = match (base, plan.slot(SlotSource::BaseImage)) {
            (Some(img), Some((_, _, w, h))) => {
                let scaled = self
                    .compositor
                    .resize_cover(img, w.max(1) as u32, h.max(1) as u32);
                SlotFill::Href(image_data_uri(&scaled)?)
            }
            _ => SlotFill::Solid(placeholder_color(theme)),
        };
        let logo_href = match (logo, plan.slot(SlotSource::Logo)) {
            (Some(img), Some((_, _, w, h))) => {
                let scaled = self
                    .compositor
                    .resize_cover(img, w.max(1) as u32, h.max(1) as u32);
                Some(image_data_uri(&scaled)?)
            }
            _ => None,
        };
        let images = SceneImages {
            base: Some(base_fill),
            logo: logo_href,
        };

        let bytes = match request.format {
            OutputFormat::Svg => {
                render_svg(&plan, &images, &self.fonts, SvgOptions { embed_fonts: true })
                    .into_bytes()
            }
            format => self
                .compositor
                .render(&plan, &images, &self.fonts, format, request.quality)?,
        };

        tracing::debug!(
            "合成分段: 排版={:?}, 合成编码={:?}",
            t_plan,
            t0.elapsed() - t_plan
        );

        Ok(RenderedBanner {
            bytes: Bytes::from(bytes),
            format: request.format,
            theme_id: theme.id.to_string(),
            width: plan.width(),
            height: plan.height(),
            cacheable: true,
            degraded: false,
        })
    }
}
