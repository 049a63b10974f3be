use serde::Serialize;

use super::theme::DesignTheme;
use super::types::{BadgeSpec, HorizontalAlign, LayoutMode};
use super::wrap::WrapResult;

/// 叠加条最小高度
pub const MIN_BAND_HEIGHT: u32 = 200;
pub const TOP_MARGIN: i32 = 30;
pub const BOTTOM_MARGIN: i32 = 30;
/// 标题/网址左右留白
pub const SIDE_PADDING: i32 = 40;
/// 标题块底部到网址基线的距离
pub const WEBSITE_GAP: i32 = 25;
/// 绘制强调短线时的网址间距
pub const ACCENT_WEBSITE_GAP: i32 = 40;
const ACCENT_OFFSET: i32 = 14;
const ACCENT_HALF_WIDTH: i32 = 40;
/// 估算文字宽度的字宽系数（装饰线、徽标）
pub const ESTIMATED_GLYPH_WIDTH: f64 = 0.6;
const DECOR_INSET: i32 = 40;
const DECOR_GAP: i32 = 20;
const BADGE_Y: i32 = 24;
const BADGE_SIDE_MARGIN: i32 = 30;
const BADGE_PADDING_X: i32 = 14;
const BADGE_PADDING_Y: i32 = 8;
const BADGE_GAP: i32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineSegment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// 顶部徽标几何（文字以 `text_x` 居中、`text_y` 为基线）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BadgeGeometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub text_x: i32,
    pub text_y: i32,
    pub font_size: f64,
}

/// 布局计算所需的请求侧参数
#[derive(Debug, Clone, Copy)]
pub struct LayoutOptions<'a> {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub title_align: HorizontalAlign,
    pub website: Option<&'a str>,
    pub website_font_size: f64,
    pub website_align: HorizontalAlign,
    pub badge: Option<&'a BadgeSpec>,
    pub show_decorative_lines: bool,
}

/// 布局结果：所有坐标均为整数（合成端要求整数几何）。
///
/// 底部模式下 y 坐标相对叠加条顶部，`canvas_height` 为叠加条高度；
/// 引用模式下相对整幅画布。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutResult {
    pub mode: LayoutMode,
    pub line_height: i32,
    pub title_start_y: i32,
    pub line_ys: Vec<i32>,
    pub title_end_y: i32,
    /// 无网址时为 0
    pub website_y: i32,
    pub canvas_height: u32,
    pub badge: Option<BadgeGeometry>,
    pub accent_line: Option<LineSegment>,
    pub decorative_lines: Vec<LineSegment>,
}

/// 行高：`round(font_size + 8)`
pub fn line_height_for(font_size: f64) -> i32 {
    (font_size + 8.0).round() as i32
}

/// 按平均字宽估算文字宽度（不做真实测量）
pub fn estimate_text_width(text: &str, font_size: f64) -> i32 {
    (text.chars().count() as f64 * font_size * ESTIMATED_GLYPH_WIDTH).round() as i32
}

pub fn layout(
    wrap: &WrapResult,
    theme: &DesignTheme,
    mode: LayoutMode,
    options: &LayoutOptions<'_>,
) -> LayoutResult {
    let line_height = line_height_for(wrap.font_size_used);
    let line_count = wrap.line_count().max(1) as i32;
    let website = options.website.map(str::trim).filter(|s| !s.is_empty());
    let website_font = options.website_font_size;
    let website_gap = if theme.accent_line {
        ACCENT_WEBSITE_GAP
    } else {
        WEBSITE_GAP
    };
    let badge = options
        .badge
        .map(|spec| badge_geometry(spec, options.canvas_width));

    // 标题块顶部
    let block_top = match mode {
        LayoutMode::BottomAnchored => match &badge {
            Some(b) => b.y + b.height + BADGE_GAP,
            None => TOP_MARGIN,
        },
        LayoutMode::CenteredQuote => {
            let mut block = line_count * line_height;
            if website.is_some() {
                block += website_gap + website_font.round() as i32;
            }
            ((f64::from(options.canvas_height) - f64::from(block)) / 2.0)
                .round()
                .max(0.0) as i32
        }
    };

    let title_start_y = block_top + (f64::from(line_height) * 0.8).round() as i32;
    let line_ys: Vec<i32> = (0..line_count)
        .map(|i| title_start_y + i * line_height)
        .collect();
    let title_end_y =
        title_start_y + (line_count - 1) * line_height + (f64::from(line_height) * 0.2).round() as i32;

    let accent_line = theme.accent_line.then(|| {
        let cx = options
            .title_align
            .anchor_x(options.canvas_width, SIDE_PADDING);
        let (x1, x2) = match options.title_align {
            HorizontalAlign::Left => (cx, cx + 2 * ACCENT_HALF_WIDTH),
            HorizontalAlign::Center => (cx - ACCENT_HALF_WIDTH, cx + ACCENT_HALF_WIDTH),
            HorizontalAlign::Right => (cx - 2 * ACCENT_HALF_WIDTH, cx),
        };
        let y = title_end_y + ACCENT_OFFSET;
        LineSegment { x1, y1: y, x2, y2: y }
    });

    let website_y = if website.is_some() {
        title_end_y + website_gap
    } else {
        0
    };

    let decorative_lines = match website {
        Some(text) if options.show_decorative_lines => {
            decorative_lines(text, website_y, website_font, options)
        }
        _ => Vec::new(),
    };

    let canvas_height = match mode {
        LayoutMode::BottomAnchored => {
            let content_bottom = if website.is_some() {
                website_y + (website_font * 0.3).round() as i32
            } else if let Some(accent) = &accent_line {
                accent.y1
            } else {
                title_end_y
            };
            ((content_bottom + BOTTOM_MARGIN).max(0) as u32).max(MIN_BAND_HEIGHT)
        }
        LayoutMode::CenteredQuote => options.canvas_height,
    };

    LayoutResult {
        mode,
        line_height,
        title_start_y,
        line_ys,
        title_end_y,
        website_y,
        canvas_height,
        badge,
        accent_line,
        decorative_lines,
    }
}

fn badge_geometry(spec: &BadgeSpec, canvas_width: u32) -> BadgeGeometry {
    let width = estimate_text_width(&spec.text, spec.font_size) + 2 * BADGE_PADDING_X;
    let height = spec.font_size.round() as i32 + 2 * BADGE_PADDING_Y;
    let canvas = canvas_width as i32;
    let x = match spec.position {
        HorizontalAlign::Left => BADGE_SIDE_MARGIN,
        HorizontalAlign::Center => (canvas - width) / 2,
        HorizontalAlign::Right => canvas - BADGE_SIDE_MARGIN - width,
    };
    BadgeGeometry {
        x,
        y: BADGE_Y,
        width,
        height,
        text_x: x + width / 2,
        // 基线：盒子垂直中线向下约 0.35 字号
        text_y: BADGE_Y + height / 2 + (spec.font_size * 0.35).round() as i32,
        font_size: spec.font_size,
    }
}

/// 网址两侧装饰线；宽度按估算值，无空间的一侧省略。
fn decorative_lines(
    text: &str,
    website_y: i32,
    font_size: f64,
    options: &LayoutOptions<'_>,
) -> Vec<LineSegment> {
    let width = options.canvas_width as i32;
    let text_width = estimate_text_width(text, font_size);
    let anchor = options.website_align.anchor_x(options.canvas_width, SIDE_PADDING);
    let (text_left, text_right) = match options.website_align {
        HorizontalAlign::Left => (anchor, anchor + text_width),
        HorizontalAlign::Center => (anchor - text_width / 2, anchor + text_width / 2),
        HorizontalAlign::Right => (anchor - text_width, anchor),
    };
    let y = website_y - (font_size * 0.35).round() as i32;

    let mut out = Vec::with_capacity(2);
    let (lx1, lx2) = (DECOR_INSET, text_left - DECOR_GAP);
    if lx2 > lx1 {
        out.push(LineSegment {
            x1: lx1,
            y1: y,
            x2: lx2,
            y2: y,
        });
    }
    let (rx1, rx2) = (text_right + DECOR_GAP, width - DECOR_INSET);
    if rx2 > rx1 {
        out.push(LineSegment {
            x1: rx1,
            y1: y,
            x2: rx2,
            y2: y,
        });
    }
    out
}
