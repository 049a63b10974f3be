use serde::Serialize;

use super::highlight::{HighlightSegment, split_segments_by_lines};
use super::layout::{LayoutResult, SIDE_PADDING};
use super::theme::{DesignTheme, GradientStop};
use super::types::{Background, HorizontalAlign, LayoutMode, LogoPosition, RenderRequest};
use super::wrap::WrapResult;

const LOGO_MARGIN: i32 = 20;
const BADGE_RADIUS: i32 = 6;
const ACCENT_LINE_WIDTH: u32 = 4;
const DECOR_LINE_WIDTH: u32 = 2;
const WEBSITE_FONT_WEIGHT: u16 = 400;

/// 图片槽位的来源，实际像素由合成端提供
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotSource {
    BaseImage,
    Logo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f64,
    pub font_weight: u16,
    /// 片段未指定颜色时使用
    pub color: String,
    pub anchor: HorizontalAlign,
}

/// 同一文字行内的着色片段
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextSegment {
    pub text: String,
    pub color: Option<String>,
}

/// 渲染端无关的绘制指令
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DrawOp {
    FillRect {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        color: String,
        radius: i32,
    },
    /// 自上而下的线性渐变
    LinearGradientRect {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        stops: Vec<GradientStop>,
    },
    StrokeRect {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        color: String,
        stroke_width: u32,
    },
    TextRun {
        x: i32,
        y: i32,
        style: TextStyle,
        segments: Vec<TextSegment>,
    },
    Line {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        color: String,
        width: u32,
    },
    ImageSlot {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        source: SlotSource,
    },
}

/// 有序绘制计划；创建后只读，交由合成端消费一次。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenePlan {
    width: u32,
    height: u32,
    band_top: i32,
    ops: Vec<DrawOp>,
}

impl ScenePlan {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 叠加条（或引用模式整幅画布）在计划中的起始 y
    pub fn band_top(&self) -> i32 {
        self.band_top
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// 计划中使用到的字体族（去重，保持出现顺序）
    pub fn font_families(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for op in &self.ops {
            if let DrawOp::TextRun { style, .. } = op {
                let family = style.font_family.as_str();
                if !out.contains(&family) {
                    out.push(family);
                }
            }
        }
        out
    }

    /// 指定来源的图片槽位 `(x, y, width, height)`，合成端据此缩放图片
    pub fn slot(&self, wanted: SlotSource) -> Option<(i32, i32, i32, i32)> {
        self.ops.iter().find_map(|op| match op {
            DrawOp::ImageSlot {
                x,
                y,
                width,
                height,
                source,
            } if *source == wanted => Some((*x, *y, *width, *height)),
            _ => None,
        })
    }
}

/// 构建计划所需的全部输入；构建过程不做任何 I/O。
pub struct SceneInputs<'a> {
    pub request: &'a RenderRequest,
    pub theme: &'a DesignTheme,
    pub wrap: &'a WrapResult,
    pub segments: &'a [HighlightSegment],
    pub layout: &'a LayoutResult,
    /// logo 原始像素尺寸（未取到 logo 时为 None）
    pub logo_size: Option<(u32, u32)>,
}

/// 用户提供的渐变颜色：均匀分布在 0–100%，只有一个颜色时放在 100%。
pub fn distribute_stops(colors: &[String]) -> Vec<GradientStop> {
    match colors.len() {
        0 => Vec::new(),
        1 => vec![GradientStop::new(1.0, colors[0].clone())],
        n => colors
            .iter()
            .enumerate()
            .map(|(i, c)| GradientStop::new(i as f32 / (n - 1) as f32, c.clone()))
            .collect(),
    }
}

/// 等比缩放到目标宽度（不超过可用宽度）
pub fn fit_logo(intrinsic: (u32, u32), target_width: u32, max_width: u32) -> Option<(i32, i32)> {
    let (iw, ih) = intrinsic;
    if iw == 0 || ih == 0 {
        return None;
    }
    let w = target_width.min(max_width).max(1);
    let h = (f64::from(w) * f64::from(ih) / f64::from(iw)).round().max(1.0);
    Some((w as i32, h as i32))
}

pub fn build(inputs: &SceneInputs<'_>) -> ScenePlan {
    let SceneInputs {
        request,
        theme,
        wrap,
        segments,
        layout,
        logo_size,
    } = *inputs;

    let canvas_w = request.canvas_width as i32;
    let canvas_h = request.canvas_height as i32;
    let band_h = layout.canvas_height as i32;
    let content_h = match layout.mode {
        LayoutMode::BottomAnchored => canvas_h.max(band_h),
        LayoutMode::CenteredQuote => canvas_h,
    };

    // 内边距为 0 的边框：在画布外侧扩展一圈
    let pad = if request.border.enabled && request.border.inset_px == 0 {
        request.border.width_px as i32
    } else {
        0
    };
    let band_top = match layout.mode {
        LayoutMode::BottomAnchored => pad + content_h - band_h,
        LayoutMode::CenteredQuote => pad,
    };
    let band_height = match layout.mode {
        LayoutMode::BottomAnchored => band_h,
        LayoutMode::CenteredQuote => content_h,
    };

    let mut ops = Vec::new();

    if pad > 0 {
        ops.push(DrawOp::FillRect {
            x: 0,
            y: 0,
            width: canvas_w + 2 * pad,
            height: content_h + 2 * pad,
            color: request.border.color.clone(),
            radius: 0,
        });
    }

    ops.push(DrawOp::ImageSlot {
        x: pad,
        y: pad,
        width: canvas_w,
        height: content_h,
        source: SlotSource::BaseImage,
    });

    if let Some(op) = background_op(request, theme, pad, band_top, canvas_w, band_height) {
        ops.push(op);
    }

    if request.border.enabled && request.border.inset_px > 0 {
        let inset = request.border.inset_px as i32;
        ops.push(DrawOp::StrokeRect {
            x: pad + inset,
            y: pad + inset,
            width: (canvas_w - 2 * inset).max(0),
            height: (content_h - 2 * inset).max(0),
            color: request.border.color.clone(),
            stroke_width: request.border.width_px,
        });
    }

    if let (Some(geom), Some(spec)) = (&layout.badge, &request.top_badge) {
        ops.push(DrawOp::FillRect {
            x: pad + geom.x,
            y: band_top + geom.y,
            width: geom.width,
            height: geom.height,
            color: spec.background.clone(),
            radius: BADGE_RADIUS,
        });
        ops.push(DrawOp::TextRun {
            x: pad + geom.text_x,
            y: band_top + geom.text_y,
            style: TextStyle {
                font_family: theme.font_family.to_string(),
                font_size: geom.font_size,
                font_weight: theme.font_weight,
                color: spec.color.clone(),
                anchor: HorizontalAlign::Center,
            },
            segments: vec![TextSegment {
                text: spec.text.clone(),
                color: None,
            }],
        });
    }

    let palette = request.highlight_palette(theme);
    let title_style = TextStyle {
        font_family: theme.font_family.to_string(),
        font_size: wrap.font_size_used,
        font_weight: theme.font_weight,
        color: request
            .title_color
            .clone()
            .unwrap_or_else(|| theme.title_color.to_string()),
        anchor: request.title_align,
    };
    let title_x = pad + request.title_align.anchor_x(request.canvas_width, SIDE_PADDING);
    let per_line = split_segments_by_lines(segments, wrap);
    for (line_segments, y) in per_line.iter().zip(&layout.line_ys) {
        ops.push(DrawOp::TextRun {
            x: title_x,
            y: band_top + y,
            style: title_style.clone(),
            segments: line_segments
                .iter()
                .map(|s| TextSegment {
                    text: s.text.clone(),
                    color: s
                        .color_index
                        .filter(|_| !palette.is_empty())
                        .map(|idx| palette[idx % palette.len()].clone()),
                })
                .collect(),
        });
    }

    let website_color = request
        .website_color
        .clone()
        .unwrap_or_else(|| theme.website_color.to_string());
    let line_color = request
        .line_color
        .clone()
        .unwrap_or_else(|| website_color.clone());

    if let Some(accent) = &layout.accent_line {
        ops.push(DrawOp::Line {
            x1: pad + accent.x1,
            y1: band_top + accent.y1,
            x2: pad + accent.x2,
            y2: band_top + accent.y2,
            color: request
                .line_color
                .clone()
                .or_else(|| palette.first().cloned())
                .unwrap_or_else(|| website_color.clone()),
            width: ACCENT_LINE_WIDTH,
        });
    }

    if let Some(website) = request.website_text() {
        ops.push(DrawOp::TextRun {
            x: pad + request.website_align.anchor_x(request.canvas_width, SIDE_PADDING),
            y: band_top + layout.website_y,
            style: TextStyle {
                font_family: theme.font_family.to_string(),
                font_size: request.website_font_size_for(theme),
                font_weight: WEBSITE_FONT_WEIGHT,
                color: website_color.clone(),
                anchor: request.website_align,
            },
            segments: vec![TextSegment {
                text: website.to_string(),
                color: None,
            }],
        });
    }

    for line in &layout.decorative_lines {
        ops.push(DrawOp::Line {
            x1: pad + line.x1,
            y1: band_top + line.y1,
            x2: pad + line.x2,
            y2: band_top + line.y2,
            color: line_color.clone(),
            width: DECOR_LINE_WIDTH,
        });
    }

    if let (Some(logo), Some(size)) = (&request.logo, logo_size) {
        let max_width = (canvas_w - 2 * LOGO_MARGIN).max(1) as u32;
        if let Some((w, h)) = fit_logo(size, logo.target_width, max_width) {
            let x = match logo.position {
                LogoPosition::TopLeft => LOGO_MARGIN,
                LogoPosition::TopCenter => (canvas_w - w) / 2,
                LogoPosition::TopRight => canvas_w - LOGO_MARGIN - w,
            };
            ops.push(DrawOp::ImageSlot {
                x: pad + x,
                y: pad + LOGO_MARGIN,
                width: w,
                height: h,
                source: SlotSource::Logo,
            });
        }
    }

    ScenePlan {
        width: (canvas_w + 2 * pad) as u32,
        height: (content_h + 2 * pad) as u32,
        band_top,
        ops,
    }
}

fn background_op(
    request: &RenderRequest,
    theme: &DesignTheme,
    pad: i32,
    band_top: i32,
    width: i32,
    height: i32,
) -> Option<DrawOp> {
    match &request.title_background {
        Some(Background::Solid(color)) => Some(DrawOp::FillRect {
            x: pad,
            y: band_top,
            width,
            height,
            color: color.clone(),
            radius: 0,
        }),
        Some(Background::Gradient(colors)) if !colors.is_empty() => {
            Some(DrawOp::LinearGradientRect {
                x: pad,
                y: band_top,
                width,
                height,
                stops: distribute_stops(colors),
            })
        }
        _ if theme.transparent_background || theme.gradient_stops.is_empty() => None,
        _ => Some(DrawOp::LinearGradientRect {
            x: pad,
            y: band_top,
            width,
            height,
            stops: theme.gradient_stops.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::banner::highlight::HighlightScorer;
    use crate::features::banner::layout::{LayoutOptions, layout};
    use crate::features::banner::theme::ThemeRegistry;
    use crate::features::banner::types::{BorderSpec, ImageSource, LogoSpec};
    use crate::features::banner::wrap::wrap;

    fn plan_for(request: &RenderRequest, logo_size: Option<(u32, u32)>) -> ScenePlan {
        let registry = ThemeRegistry::builtin();
        let theme = registry.resolve(&request.theme_id);
        let wrapped = wrap(&request.title, 1120.0, 48.0, theme.char_width_factor);
        let segments = HighlightScorer::default().score(&request.title, 2, &[]);
        let website_font = request.website_font_size_for(theme);
        let options = LayoutOptions {
            canvas_width: request.canvas_width,
            canvas_height: request.canvas_height,
            title_align: request.title_align,
            website: request.website_text(),
            website_font_size: website_font,
            website_align: request.website_align,
            badge: request.top_badge.as_ref(),
            show_decorative_lines: request.show_decorative_lines,
        };
        let result = layout(&wrapped, theme, request.layout_mode, &options);
        build(&SceneInputs {
            request,
            theme,
            wrap: &wrapped,
            segments: &segments,
            layout: &result,
            logo_size,
        })
    }

    #[test]
    fn distributes_user_gradient_evenly() {
        let colors: Vec<String> = ["#000", "#111", "#222"].iter().map(|c| c.to_string()).collect();
        let stops = distribute_stops(&colors);
        let offsets: Vec<f32> = stops.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0.0, 0.5, 1.0]);
        let single = distribute_stops(&colors[..1]);
        assert_eq!(single, vec![GradientStop::new(1.0, "#000")]);
    }

    #[test]
    fn bottom_plan_anchors_band_at_bottom() {
        let mut request = RenderRequest::new("FREE SHIPPING TODAY", LayoutMode::BottomAnchored);
        request.website = Some("shop.example".into());
        let plan = plan_for(&request, None);

        assert_eq!(plan.width(), 1200);
        assert_eq!(plan.height(), 630);
        assert!(plan.band_top() > 0);
        assert!(matches!(
            plan.ops()[0],
            DrawOp::ImageSlot {
                source: SlotSource::BaseImage,
                ..
            }
        ));
        assert!(matches!(plan.ops()[1], DrawOp::LinearGradientRect { y, .. } if y == plan.band_top()));
        let texts: Vec<&DrawOp> = plan
            .ops()
            .iter()
            .filter(|op| matches!(op, DrawOp::TextRun { .. }))
            .collect();
        assert_eq!(texts.len(), 2);
    }

    #[test]
    fn highlight_segments_carry_palette_colors() {
        let request = RenderRequest::new("FREE SHIPPING TODAY", LayoutMode::BottomAnchored);
        let plan = plan_for(&request, None);
        let colored: Vec<(String, Option<String>)> = plan
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::TextRun { segments, .. } => Some(segments.clone()),
                _ => None,
            })
            .flatten()
            .map(|s| (s.text, s.color))
            .collect();
        assert_eq!(colored[0], ("FREE SHIPPING".to_string(), Some("#FFD700".to_string())));
    }

    #[test]
    fn zero_inset_border_extends_canvas() {
        let mut request = RenderRequest::new("Title", LayoutMode::CenteredQuote);
        request.border = BorderSpec {
            enabled: true,
            color: "#FF0000".into(),
            width_px: 10,
            inset_px: 0,
        };
        let plan = plan_for(&request, None);
        assert_eq!(plan.width(), 1080 + 20);
        assert_eq!(plan.height(), 1350 + 20);
        assert!(matches!(&plan.ops()[0], DrawOp::FillRect { color, .. } if color == "#FF0000"));
        assert_eq!(plan.slot(SlotSource::BaseImage), Some((10, 10, 1080, 1350)));
    }

    #[test]
    fn inset_border_is_a_stroke() {
        let mut request = RenderRequest::new("Title", LayoutMode::BottomAnchored);
        request.border.enabled = true;
        let plan = plan_for(&request, None);
        assert!(plan.ops().iter().any(|op| matches!(
            op,
            DrawOp::StrokeRect { x: 20, y: 20, width: 1160, height: 590, stroke_width: 4, .. }
        )));
    }

    #[test]
    fn transparent_theme_skips_background() {
        let mut request = RenderRequest::new("Title", LayoutMode::BottomAnchored);
        request.theme_id = "transparent".into();
        let plan = plan_for(&request, None);
        assert!(!plan.ops().iter().any(|op| matches!(
            op,
            DrawOp::LinearGradientRect { .. } | DrawOp::FillRect { .. }
        )));
    }

    #[test]
    fn logo_keeps_aspect_ratio() {
        assert_eq!(fit_logo((400, 200), 120, 1000), Some((120, 60)));
        assert_eq!(fit_logo((400, 200), 2000, 500), Some((500, 250)));
        assert_eq!(fit_logo((0, 200), 120, 1000), None);

        let mut request = RenderRequest::new("Title", LayoutMode::BottomAnchored);
        request.logo = Some(LogoSpec {
            source: ImageSource::Url("https://example.com/logo.png".into()),
            position: LogoPosition::TopRight,
            target_width: 120,
        });
        let plan = plan_for(&request, Some((300, 100)));
        let last = plan.ops().last().expect("ops");
        assert_eq!(
            *last,
            DrawOp::ImageSlot {
                x: 1200 - 20 - 120,
                y: 20,
                width: 120,
                height: 40,
                source: SlotSource::Logo,
            }
        );
    }

    #[test]
    fn tall_band_grows_plan() {
        let mut request = RenderRequest::new(
            "one two three four five six seven eight nine ten eleven twelve",
            LayoutMode::BottomAnchored,
        );
        request.canvas_height = 150;
        let plan = plan_for(&request, None);
        assert!(plan.height() >= 200);
        assert_eq!(plan.band_top(), 0);
    }
}
