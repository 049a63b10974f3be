/// 自动字号
pub mod autofit;
pub mod compositor;
/// 内联图片解码与远程图片拉取
pub mod fetch;
pub mod fonts;
pub mod handler;
/// 关键词/短语强调打分
pub mod highlight;
pub mod layout;
/// 请求参数拆解与解析
pub mod params;
pub mod quotes;
/// 与具体渲染后端无关的绘制计划
pub mod scene;
pub mod service;
/// 绘制计划到 SVG 文档的转换
pub mod svg;
pub mod theme;
pub mod types;
pub mod wrap;

pub use handler::create_banner_router;
pub use service::{BannerService, RenderedBanner, plan_scene};
pub use theme::{DesignTheme, ThemeRegistry};
pub use types::{BannerBody, LayoutMode, OutputFormat, RenderRequest, ThemeSummary};
