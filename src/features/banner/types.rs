use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::theme::{DEFAULT_THEME_ID, DesignTheme};

/// 默认画布宽度
pub const DEFAULT_WIDTH: u32 = 1200;
/// 默认画布高度
pub const DEFAULT_HEIGHT: u32 = 630;
/// 引用模式默认画布（竖版 4:5）
pub const DEFAULT_QUOTE_WIDTH: u32 = 1080;
pub const DEFAULT_QUOTE_HEIGHT: u32 = 1350;
/// 画布尺寸允许范围
pub const MIN_DIMENSION: u32 = 100;
pub const MAX_DIMENSION: u32 = 4096;
/// 强调色数量上限
pub const MAX_HIGHLIGHT_COLORS: usize = 5;

/// 布局模式：每个请求确定一次，之后不再切换。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum LayoutMode {
    /// 底部叠加条，高度随内容增长
    #[default]
    BottomAnchored,
    /// 整幅画布内垂直居中（引用/金句）
    CenteredQuote,
}

impl LayoutMode {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "bottom" | "bottomanchored" | "bottom-anchored" | "banner" => {
                Some(Self::BottomAnchored)
            }
            "quote" | "center" | "centered" | "centeredquote" | "centered-quote" => {
                Some(Self::CenteredQuote)
            }
            _ => None,
        }
    }
}

/// 水平对齐（标题、网址、顶部徽标共用）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl HorizontalAlign {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Some(Self::Left),
            "center" | "centre" | "middle" => Some(Self::Center),
            "right" | "end" => Some(Self::Right),
            _ => None,
        }
    }

    /// SVG `text-anchor` 取值
    pub fn text_anchor(self) -> &'static str {
        match self {
            Self::Left => "start",
            Self::Center => "middle",
            Self::Right => "end",
        }
    }

    /// 给定画布宽度与左右留白时的锚点 x
    pub fn anchor_x(self, canvas_width: u32, padding: i32) -> i32 {
        let w = canvas_width as i32;
        match self {
            Self::Left => padding,
            Self::Center => w / 2,
            Self::Right => w - padding,
        }
    }
}

/// Logo 放置位置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogoPosition {
    #[default]
    #[serde(rename = "top-left")]
    TopLeft,
    #[serde(rename = "top-center")]
    TopCenter,
    #[serde(rename = "top-right")]
    TopRight,
}

impl LogoPosition {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "top-left" | "topleft" | "left" => Some(Self::TopLeft),
            "top-center" | "topcenter" | "center" => Some(Self::TopCenter),
            "top-right" | "topright" | "right" => Some(Self::TopRight),
            _ => None,
        }
    }
}

/// 输出图片格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JPEG（默认，照片类背景体积更小）
    #[default]
    Jpeg,
    Png,
    /// 直接返回叠加层 SVG（不含底图栅格化）
    Svg,
}

impl OutputFormat {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Svg => "image/svg+xml; charset=utf-8",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }
}

/// 图片来源：远程 URL 或内联数据（data URI / 裸 base64）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    Inline(String),
}

/// 标题区背景覆盖
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Background {
    Solid(String),
    /// 颜色列表，渲染时均匀分布在 0–100%
    Gradient(Vec<String>),
}

/// 边框设置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorderSpec {
    pub enabled: bool,
    pub color: String,
    pub width_px: u32,
    /// 0 表示在画布外侧扩展边距
    pub inset_px: u32,
}

impl Default for BorderSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            color: "#FFFFFF".to_string(),
            width_px: 4,
            inset_px: 20,
        }
    }
}

/// 顶部徽标
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeSpec {
    pub text: String,
    pub position: HorizontalAlign,
    pub background: String,
    pub color: String,
    pub font_size: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoSpec {
    pub source: ImageSource,
    pub position: LogoPosition,
    pub target_width: u32,
}

/// 单次渲染请求（已从原始参数解析完毕）
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub title: String,
    pub website: Option<String>,
    pub theme_id: String,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub layout_mode: LayoutMode,
    pub background_image: Option<ImageSource>,
    pub highlight_colors: Vec<String>,
    pub title_color: Option<String>,
    pub website_color: Option<String>,
    pub title_background: Option<Background>,
    pub border: BorderSpec,
    pub line_color: Option<String>,
    pub show_decorative_lines: bool,
    pub top_badge: Option<BadgeSpec>,
    pub logo: Option<LogoSpec>,
    pub custom_keywords: Vec<String>,
    pub title_font_size: Option<f64>,
    pub title_align: HorizontalAlign,
    pub website_font_size: Option<f64>,
    pub website_align: HorizontalAlign,
    /// 是否允许关键词强调
    pub highlight_enabled: bool,
    /// 是否跳过自动缩放（降级渲染使用固定字号）
    pub fixed_font_size: bool,
    pub format: OutputFormat,
    pub quality: u8,
    /// 客户端缓存提示（`val` 参数），参与缓存键
    pub cache_hint: Option<String>,
}

impl RenderRequest {
    pub fn new(title: impl Into<String>, layout_mode: LayoutMode) -> Self {
        let (canvas_width, canvas_height) = match layout_mode {
            LayoutMode::BottomAnchored => (DEFAULT_WIDTH, DEFAULT_HEIGHT),
            LayoutMode::CenteredQuote => (DEFAULT_QUOTE_WIDTH, DEFAULT_QUOTE_HEIGHT),
        };
        Self {
            title: title.into(),
            website: None,
            theme_id: DEFAULT_THEME_ID.to_string(),
            canvas_width,
            canvas_height,
            layout_mode,
            background_image: None,
            highlight_colors: Vec::new(),
            title_color: None,
            website_color: None,
            title_background: None,
            border: BorderSpec::default(),
            line_color: None,
            show_decorative_lines: false,
            top_badge: None,
            logo: None,
            custom_keywords: Vec::new(),
            title_font_size: None,
            title_align: HorizontalAlign::Center,
            website_font_size: None,
            website_align: HorizontalAlign::Center,
            highlight_enabled: true,
            fixed_font_size: false,
            format: OutputFormat::Jpeg,
            quality: 85,
            cache_hint: None,
        }
    }

    /// 有效网址文本（空白视为缺省）
    pub fn website_text(&self) -> Option<&str> {
        self.website
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// 标题基准字号：请求覆盖优先，否则取主题值
    pub fn base_title_font_size(&self, theme: &DesignTheme) -> f64 {
        self.title_font_size
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(theme.title_font_size)
    }

    pub fn website_font_size_for(&self, theme: &DesignTheme) -> f64 {
        self.website_font_size
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(theme.website_font_size)
    }

    /// 实际使用的强调色（请求 hl 优先，至多 MAX_HIGHLIGHT_COLORS 个）
    pub fn highlight_palette(&self, theme: &DesignTheme) -> Vec<String> {
        let palette: Vec<String> = if self.highlight_colors.is_empty() {
            theme
                .highlight_colors
                .iter()
                .map(|c| (*c).to_string())
                .collect()
        } else {
            self.highlight_colors.clone()
        };
        palette.into_iter().take(MAX_HIGHLIGHT_COLORS).collect()
    }

    /// 降级请求：去掉装饰元素、强调与 logo，标题使用固定字号。
    pub fn reduced_fidelity(&self) -> Self {
        Self {
            top_badge: None,
            logo: None,
            show_decorative_lines: false,
            highlight_enabled: false,
            title_font_size: Some(FALLBACK_TITLE_FONT_SIZE),
            fixed_font_size: true,
            ..self.clone()
        }
    }
}

/// 降级渲染的固定标题字号
pub const FALLBACK_TITLE_FONT_SIZE: f64 = 40.0;

/// POST 渲染请求体
#[derive(Debug, Default, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BannerBody {
    /// 底图：data URI 或裸 base64（与 params.url 二选一）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// 布局模式（默认 bottomAnchored）
    #[serde(default)]
    pub mode: LayoutMode,
    /// 其余参数，键名与 GET 查询参数一致（title、design、w、h、hl …）
    #[serde(default)]
    #[schema(value_type = Object)]
    pub params: HashMap<String, serde_json::Value>,
}

/// 主题目录条目
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSummary {
    #[schema(example = "modern")]
    pub id: String,
    pub display_name: String,
    pub title_color: String,
    pub website_color: String,
    pub font_family: String,
    pub title_font_size: f64,
    pub transparent_background: bool,
    pub enable_highlight: bool,
}

impl From<&DesignTheme> for ThemeSummary {
    fn from(theme: &DesignTheme) -> Self {
        Self {
            id: theme.id.to_string(),
            display_name: theme.display_name.to_string(),
            title_color: theme.title_color.to_string(),
            website_color: theme.website_color.to_string(),
            font_family: theme.font_family.to_string(),
            title_font_size: theme.title_font_size,
            transparent_background: theme.transparent_background,
            enable_highlight: theme.enable_highlight,
        }
    }
}
