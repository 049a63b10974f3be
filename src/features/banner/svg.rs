use base64::{Engine as _, engine::general_purpose};

use super::fonts::FontCatalog;
use super::scene::{DrawOp, ScenePlan, SlotSource, TextSegment, TextStyle};
use super::theme::GradientStop;

/// 图片槽位的填充内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotFill {
    /// 已按槽位尺寸处理好的图片（data URI）
    Href(String),
    /// 纯色占位（底图缺失或拉取失败）
    Solid(String),
}

/// 合成端为计划中的图片槽位准备的内容
#[derive(Debug, Clone, Default)]
pub struct SceneImages {
    pub base: Option<SlotFill>,
    pub logo: Option<String>,
}

impl SceneImages {
    fn fill_for(&self, source: SlotSource) -> Option<SlotFill> {
        match source {
            SlotSource::BaseImage => self.base.clone(),
            SlotSource::Logo => self.logo.clone().map(SlotFill::Href),
        }
    }
}

/// SVG 渲染选项
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgOptions {
    /// 是否以 `@font-face` 内嵌字体（直接输出 SVG 时使用；栅格化走字体库）
    pub embed_fonts: bool,
}

pub fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// 字体族属性值：含空格的名字加引号，末尾追加通用族
fn font_family_attr(family: &str) -> String {
    let family = family.trim();
    if family.contains(' ') {
        format!("'{family}', sans-serif")
    } else {
        format!("{family}, sans-serif")
    }
}

fn font_face_css(plan: &ScenePlan, fonts: &FontCatalog) -> String {
    let mut css = String::new();
    for family in plan.font_families() {
        match fonts.load_typeface(family) {
            Some(face) => {
                let encoded = general_purpose::STANDARD.encode(face.data.as_slice());
                css.push_str(&format!(
                    "@font-face{{font-family:'{}';src:url(data:{};base64,{}) format('{}');}}",
                    escape_xml(family),
                    face.format.mime(),
                    encoded,
                    face.format.css_format()
                ));
            }
            None => tracing::debug!("字体 {} 不可嵌入，已省略", family),
        }
    }
    css
}

fn gradient_def(out: &mut String, id: &str, stops: &[GradientStop]) {
    out.push_str(&format!(
        r#"<linearGradient id="{id}" x1="0" y1="0" x2="0" y2="1">"#
    ));
    for stop in stops {
        out.push_str(&format!(
            r#"<stop offset="{:.4}" stop-color="{}"/>"#,
            stop.offset,
            escape_xml(&stop.color)
        ));
    }
    out.push_str("</linearGradient>");
}

fn text_run(out: &mut String, x: i32, y: i32, style: &TextStyle, segments: &[TextSegment]) {
    out.push_str(&format!(
        r#"<text x="{x}" y="{y}" font-family="{}" font-size="{}" font-weight="{}" fill="{}" text-anchor="{}">"#,
        escape_xml(&font_family_attr(&style.font_family)),
        style.font_size,
        style.font_weight,
        escape_xml(&style.color),
        style.anchor.text_anchor()
    ));
    let last = segments.len().saturating_sub(1);
    for (i, seg) in segments.iter().enumerate() {
        // 片段间的空格放在前一片段末尾，避免被空白折叠吞掉
        let text = if i < last {
            format!("{} ", seg.text)
        } else {
            seg.text.clone()
        };
        match &seg.color {
            Some(color) => {
                out.push_str(&format!(
                    r#"<tspan fill="{}">{}</tspan>"#,
                    escape_xml(color),
                    escape_xml(&text)
                ));
            }
            None => {
                out.push_str(&format!("<tspan>{}</tspan>", escape_xml(&text)));
            }
        }
    }
    out.push_str("</text>");
}

/// 将绘制计划渲染为完整 SVG 文档
pub fn render_svg(
    plan: &ScenePlan,
    images: &SceneImages,
    fonts: &FontCatalog,
    options: SvgOptions,
) -> String {
    let mut defs = String::new();
    if options.embed_fonts {
        let css = font_face_css(plan, fonts);
        if !css.is_empty() {
            defs.push_str(&format!("<style>{css}</style>"));
        }
    }

    let mut body = String::new();
    let mut gradient_count = 0usize;
    for op in plan.ops() {
        match op {
            DrawOp::FillRect {
                x,
                y,
                width,
                height,
                color,
                radius,
            } => {
                body.push_str(&format!(
                    r#"<rect x="{x}" y="{y}" width="{width}" height="{height}" rx="{radius}" fill="{}"/>"#,
                    escape_xml(color)
                ));
            }
            DrawOp::LinearGradientRect {
                x,
                y,
                width,
                height,
                stops,
            } => {
                let id = format!("grad{gradient_count}");
                gradient_count += 1;
                gradient_def(&mut defs, &id, stops);
                body.push_str(&format!(
                    r#"<rect x="{x}" y="{y}" width="{width}" height="{height}" fill="url(#{id})"/>"#
                ));
            }
            DrawOp::StrokeRect {
                x,
                y,
                width,
                height,
                color,
                stroke_width,
            } => {
                body.push_str(&format!(
                    r#"<rect x="{x}" y="{y}" width="{width}" height="{height}" fill="none" stroke="{}" stroke-width="{stroke_width}"/>"#,
                    escape_xml(color)
                ));
            }
            DrawOp::TextRun {
                x,
                y,
                style,
                segments,
            } => text_run(&mut body, *x, *y, style, segments),
            DrawOp::Line {
                x1,
                y1,
                x2,
                y2,
                color,
                width,
            } => {
                body.push_str(&format!(
                    r#"<line x1="{x1}" y1="{y1}" x2="{x2}" y2="{y2}" stroke="{}" stroke-width="{width}" stroke-linecap="round"/>"#,
                    escape_xml(color)
                ));
            }
            DrawOp::ImageSlot {
                x,
                y,
                width,
                height,
                source,
            } => match images.fill_for(*source) {
                Some(SlotFill::Href(href)) => {
                    let aspect = match source {
                        SlotSource::BaseImage => "xMidYMid slice",
                        SlotSource::Logo => "xMidYMid meet",
                    };
                    body.push_str(&format!(
                        r#"<image x="{x}" y="{y}" width="{width}" height="{height}" preserveAspectRatio="{aspect}" href="{}"/>"#,
                        escape_xml(&href)
                    ));
                }
                Some(SlotFill::Solid(color)) => {
                    body.push_str(&format!(
                        r#"<rect x="{x}" y="{y}" width="{width}" height="{height}" fill="{}"/>"#,
                        escape_xml(&color)
                    ));
                }
                None => {}
            },
        }
    }

    let mut svg = String::with_capacity(body.len() + defs.len() + 256);
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = plan.width(),
        h = plan.height()
    ));
    if !defs.is_empty() {
        svg.push_str(&format!("<defs>{defs}</defs>"));
    }
    svg.push_str(&body);
    svg.push_str("</svg>");
    svg
}
