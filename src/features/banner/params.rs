use std::collections::HashMap;

use reqwest::Url;

use super::types::{
    Background, BadgeSpec, HorizontalAlign, ImageSource, LayoutMode, LogoPosition, LogoSpec,
    MAX_DIMENSION, MAX_HIGHLIGHT_COLORS, MIN_DIMENSION, OutputFormat, RenderRequest,
};
use crate::error::AppError;

/// 标题长度上限（字符数）
pub const MAX_TITLE_CHARS: usize = 300;
pub const DEFAULT_BADGE_FONT_SIZE: f64 = 18.0;
pub const DEFAULT_BADGE_BACKGROUND: &str = "#E11D48";
pub const DEFAULT_BADGE_COLOR: &str = "#FFFFFF";
pub const DEFAULT_LOGO_WIDTH: u32 = 120;
pub const DEFAULT_QUALITY: u8 = 85;

/// 渲染参数中可识别的键；`url=` 之后出现的其它键视为底图 URL 的一部分。
pub const KNOWN_PARAMS: &[&str] = &[
    "title",
    "website",
    "design",
    "w",
    "h",
    "val",
    "hl",
    "wc",
    "bc",
    "lc",
    "sb",
    "lines",
    "keywords",
    "titleColor",
    "titleBgColor",
    "titleBgGradient",
    "borderEnabled",
    "borderWidth",
    "borderInset",
    "logoUrl",
    "logoPosition",
    "logoSize",
    "topText",
    "topPosition",
    "topColors",
    "topSize",
    "titleFontSize",
    "titleAlign",
    "websiteFontSize",
    "websiteAlign",
    "url",
    "mode",
    "format",
    "quality",
];

/// 已拆分的原始请求参数（键区分大小写，重复键取第一次出现的值）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    values: HashMap<String, String>,
}

impl RequestParams {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_insert_with(|| value.into());
    }

    /// 去除首尾空白后的非空值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// POST 请求体中的 params 对象：字符串原样保留，数字与布尔转为文本，数组以逗号拼接。
    pub fn from_json(map: &HashMap<String, serde_json::Value>) -> Self {
        let mut params = Self::default();
        for (key, value) in map {
            if let Some(text) = json_to_text(value) {
                params.insert(key.clone(), text);
            }
        }
        params
    }

    fn parse_u32(&self, key: &str) -> Option<u32> {
        let raw = self.get(key)?;
        raw.parse::<u32>().ok().or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.round() as u32)
        })
    }

    fn parse_f64(&self, key: &str) -> Option<f64> {
        self.get(key)
            .and_then(|v| v.trim_end_matches("px").parse::<f64>().ok())
            .filter(|f| f.is_finite() && *f > 0.0)
    }

    fn parse_bool(&self, key: &str) -> Option<bool> {
        self.get(key)
            .and_then(|v| match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            })
    }

    fn list(&self, key: &str) -> Vec<String> {
        self.get(key).map(split_list).unwrap_or_default()
    }

    fn color(&self, key: &str) -> Option<String> {
        self.get(key).map(normalize_color)
    }
}

/// 逗号分隔列表；括号内的逗号不拆分，`rgba(0,0,0,0.5)` 保持为一项
fn split_list(raw: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&raw[start..]);
    items
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn json_to_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Array(items) => Some(
            items
                .iter()
                .filter_map(json_to_text)
                .collect::<Vec<_>>()
                .join(","),
        ),
        serde_json::Value::Object(_) => None,
    }
}

/// 将原始查询串拆分为渲染参数。
///
/// 底图 URL 本身常带未编码的查询串（`url=https://cdn/x.jpg?w=1&sig=abc`），
/// 浏览器会把它拆成多个顶层参数。这里把 `url=` 之后出现的未知键重新拼回底图 URL；
/// 已知键（如 `title`）仍按渲染参数处理。
pub fn decompose_request_params(raw_query: &str) -> RequestParams {
    let mut params = RequestParams::default();
    let raw = raw_query.trim_start_matches('?');
    if raw.is_empty() {
        return params;
    }

    let pairs: Vec<(String, String)> = match Url::parse(&format!("http://localhost/?{raw}")) {
        Ok(parsed) => parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        Err(e) => {
            tracing::debug!("查询串解析失败: {}", e);
            return params;
        }
    };

    let mut image_url: Option<String> = None;
    let mut trailing: Vec<(String, String)> = Vec::new();
    for (key, value) in pairs {
        if key == "url" && image_url.is_none() {
            image_url = Some(value);
            continue;
        }
        if image_url.is_some() && !KNOWN_PARAMS.contains(&key.as_str()) {
            trailing.push((key, value));
            continue;
        }
        params.insert(key, value);
    }

    if let Some(url) = image_url {
        params.insert("url", reattach_query(url, &trailing));
    }
    params
}

fn reattach_query(url: String, trailing: &[(String, String)]) -> String {
    if trailing.is_empty() {
        return url;
    }
    match Url::parse(&url) {
        Ok(mut parsed) => {
            {
                let mut query = parsed.query_pairs_mut();
                for (k, v) in trailing {
                    query.append_pair(k, v);
                }
            }
            parsed.to_string()
        }
        Err(_) => {
            let mut out = url;
            for (k, v) in trailing {
                out.push(if out.contains('?') { '&' } else { '?' });
                out.push_str(k);
                out.push('=');
                out.push_str(v);
            }
            out
        }
    }
}

/// 颜色参数：裸十六进制补 `#`，其余（`rgba(...)`、颜色名）原样保留。
pub fn normalize_color(raw: &str) -> String {
    let trimmed = raw.trim();
    let is_bare_hex = matches!(trimmed.len(), 3 | 4 | 6 | 8)
        && trimmed.chars().all(|c| c.is_ascii_hexdigit());
    if is_bare_hex {
        format!("#{trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// 图片引用：http(s) 视为远程地址，其余按内联数据处理
pub fn image_source_from(reference: &str) -> ImageSource {
    let trimmed = reference.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        ImageSource::Url(trimmed.to_string())
    } else {
        ImageSource::Inline(trimmed.to_string())
    }
}

fn clamp_dimension(value: Option<u32>, fallback: u32) -> u32 {
    value.unwrap_or(fallback).clamp(MIN_DIMENSION, MAX_DIMENSION)
}

/// 解析为类型化渲染请求。数值解析失败时回退默认值；只有标题缺失/过长会报错。
///
/// `inline_image` 为 POST 请求体中的底图数据，优先于 `url` 参数。
pub fn parse_render_request(
    params: &RequestParams,
    default_mode: LayoutMode,
    inline_image: Option<&str>,
) -> Result<RenderRequest, AppError> {
    let mode = params
        .get("mode")
        .and_then(LayoutMode::parse)
        .unwrap_or(default_mode);

    let title = params
        .get("title")
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    if title.is_empty() && mode == LayoutMode::BottomAnchored {
        return Err(AppError::Validation("title 不能为空".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::Validation(format!(
            "title 过长（最多 {MAX_TITLE_CHARS} 个字符）"
        )));
    }

    let mut req = RenderRequest::new(title, mode);
    req.website = params.get("website").map(str::to_string);
    if let Some(design) = params.get("design") {
        req.theme_id = design.to_string();
    }
    req.canvas_width = clamp_dimension(params.parse_u32("w"), req.canvas_width);
    req.canvas_height = clamp_dimension(params.parse_u32("h"), req.canvas_height);
    req.cache_hint = params.get("val").map(str::to_string);

    req.highlight_colors = params
        .list("hl")
        .iter()
        .map(|c| normalize_color(c))
        .take(MAX_HIGHLIGHT_COLORS)
        .collect();
    req.website_color = params.color("wc");
    req.line_color = params.color("lc");
    req.title_color = params.color("titleColor");
    req.custom_keywords = params.list("keywords");
    req.show_decorative_lines = params.parse_bool("lines").unwrap_or(false);

    let gradient: Vec<String> = params
        .list("titleBgGradient")
        .iter()
        .map(|c| normalize_color(c))
        .collect();
    req.title_background = if !gradient.is_empty() {
        Some(Background::Gradient(gradient))
    } else {
        params.color("titleBgColor").map(Background::Solid)
    };

    if let Some(color) = params.color("bc") {
        req.border.color = color;
    }
    // sb 与 borderEnabled 都可开启边框
    req.border.enabled = params.parse_bool("borderEnabled").unwrap_or(false)
        || params.parse_bool("sb").unwrap_or(false);
    if let Some(width) = params.parse_u32("borderWidth") {
        req.border.width_px = width.clamp(1, 100);
    }
    if let Some(inset) = params.parse_u32("borderInset") {
        req.border.inset_px = inset.min(500);
    }

    req.logo = params.get("logoUrl").map(|url| LogoSpec {
        source: image_source_from(url),
        position: params
            .get("logoPosition")
            .and_then(LogoPosition::parse)
            .unwrap_or_default(),
        target_width: params
            .parse_u32("logoSize")
            .unwrap_or(DEFAULT_LOGO_WIDTH)
            .clamp(16, 1024),
    });

    req.top_badge = params.get("topText").map(|text| {
        let colors = params.list("topColors");
        BadgeSpec {
            text: text.to_string(),
            position: params
                .get("topPosition")
                .and_then(HorizontalAlign::parse)
                .unwrap_or_default(),
            background: colors
                .first()
                .map(|c| normalize_color(c))
                .unwrap_or_else(|| DEFAULT_BADGE_BACKGROUND.to_string()),
            color: colors
                .get(1)
                .map(|c| normalize_color(c))
                .unwrap_or_else(|| DEFAULT_BADGE_COLOR.to_string()),
            font_size: params
                .parse_f64("topSize")
                .unwrap_or(DEFAULT_BADGE_FONT_SIZE)
                .clamp(10.0, 96.0),
        }
    });

    req.title_font_size = params
        .parse_f64("titleFontSize")
        .map(|s| s.clamp(12.0, 200.0));
    req.website_font_size = params
        .parse_f64("websiteFontSize")
        .map(|s| s.clamp(8.0, 120.0));
    if let Some(align) = params.get("titleAlign").and_then(HorizontalAlign::parse) {
        req.title_align = align;
    }
    if let Some(align) = params.get("websiteAlign").and_then(HorizontalAlign::parse) {
        req.website_align = align;
    }

    req.background_image = inline_image
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| ImageSource::Inline(s.to_string()))
        .or_else(|| params.get("url").map(image_source_from));

    if let Some(format) = params.get("format").and_then(OutputFormat::parse) {
        req.format = format;
    }
    req.quality = params
        .parse_u32("quality")
        .map(|q| q.clamp(1, 100) as u8)
        .unwrap_or(DEFAULT_QUALITY);

    Ok(req)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reattaches_unknown_keys_after_url() {
        let params = decompose_request_params(
            "title=Hello+World&url=https://cdn.example.com/a.jpg?w=800&sig=abc&design=neon",
        );
        assert_eq!(params.get("title"), Some("Hello World"));
        assert_eq!(params.get("design"), Some("neon"));
        assert_eq!(
            params.get("url"),
            Some("https://cdn.example.com/a.jpg?w=800&sig=abc")
        );
        assert_eq!(params.get("w"), None);
    }

    #[test]
    fn keys_before_url_are_not_reattached() {
        let params = decompose_request_params("token=x&url=https://cdn.example.com/a.jpg&t=1");
        assert_eq!(params.get("token"), Some("x"));
        assert_eq!(
            params.get("url"),
            Some("https://cdn.example.com/a.jpg?t=1")
        );
    }

    #[test]
    fn empty_query_yields_no_params() {
        assert!(decompose_request_params("").is_empty());
        assert!(decompose_request_params("?").is_empty());
    }

    #[test]
    fn parses_overrides_and_clamps_dimensions() {
        let params = decompose_request_params(
            "title=Big%20Sale&w=99999&h=abc&hl=ff0000,00ff00&lines=true&borderEnabled=1\
             &borderInset=0&topText=NEW&topColors=000,fff&titleAlign=left&format=png&quality=300",
        );
        let req = parse_render_request(&params, LayoutMode::BottomAnchored, None).expect("parse");
        assert_eq!(req.canvas_width, MAX_DIMENSION);
        assert_eq!(req.canvas_height, 630);
        assert_eq!(req.highlight_colors, vec!["#ff0000", "#00ff00"]);
        assert!(req.show_decorative_lines);
        assert!(req.border.enabled);
        assert_eq!(req.border.inset_px, 0);
        let badge = req.top_badge.expect("badge");
        assert_eq!((badge.background.as_str(), badge.color.as_str()), ("#000", "#fff"));
        assert_eq!(badge.font_size, DEFAULT_BADGE_FONT_SIZE);
        assert_eq!(req.title_align, HorizontalAlign::Left);
        assert_eq!(req.format, OutputFormat::Png);
        assert_eq!(req.quality, 100);
    }

    #[test]
    fn gradient_wins_over_solid_background() {
        let mut params = RequestParams::default();
        params.insert("title", "x");
        params.insert("titleBgColor", "#111");
        params.insert("titleBgGradient", "#000, rgba(0,0,0,0.5)");
        let req = parse_render_request(&params, LayoutMode::BottomAnchored, None).expect("parse");
        assert_eq!(
            req.title_background,
            Some(Background::Gradient(vec![
                "#000".to_string(),
                "rgba(0,0,0,0.5)".to_string()
            ]))
        );
    }

    #[test]
    fn alpha_colors_survive_list_splitting() {
        let params = decompose_request_params(
            "title=x&hl=rgba(255,0,0,0.8),%2300ff00&topText=NEW&topColors=hsla(0,0%25,0%25,0.6),fff",
        );
        let req = parse_render_request(&params, LayoutMode::BottomAnchored, None).expect("parse");
        assert_eq!(req.highlight_colors, vec!["rgba(255,0,0,0.8)", "#00ff00"]);
        let badge = req.top_badge.expect("badge");
        assert_eq!(badge.background, "hsla(0,0%,0%,0.6)");
        assert_eq!(badge.color, "#fff");
    }

    #[test]
    fn sb_turns_on_border_and_lines_turn_on_decorations() {
        let params = decompose_request_params("title=x&sb=1");
        let req = parse_render_request(&params, LayoutMode::BottomAnchored, None).expect("parse");
        assert!(req.border.enabled);
        assert!(!req.show_decorative_lines);

        let params = decompose_request_params("title=x&lines=on");
        let req = parse_render_request(&params, LayoutMode::BottomAnchored, None).expect("parse");
        assert!(!req.border.enabled);
        assert!(req.show_decorative_lines);
    }

    #[test]
    fn empty_title_is_rejected_outside_quote_mode() {
        let params = RequestParams::default();
        let err = parse_render_request(&params, LayoutMode::BottomAnchored, None)
            .expect_err("empty title");
        assert!(matches!(err, AppError::Validation(_)));
        let quote = parse_render_request(&params, LayoutMode::CenteredQuote, None).expect("quote");
        assert!(quote.title.is_empty());
        assert_eq!(quote.canvas_width, 1080);
    }

    #[test]
    fn mode_parameter_overrides_route_default() {
        let params = decompose_request_params("title=Hi&mode=quote");
        let req = parse_render_request(&params, LayoutMode::BottomAnchored, None).expect("parse");
        assert_eq!(req.layout_mode, LayoutMode::CenteredQuote);
    }

    #[test]
    fn inline_image_takes_precedence_over_url() {
        let params = decompose_request_params("title=Hi&url=https://cdn.example.com/a.jpg");
        let req = parse_render_request(&params, LayoutMode::BottomAnchored, Some("aGVsbG8="))
            .expect("parse");
        assert_eq!(
            req.background_image,
            Some(ImageSource::Inline("aGVsbG8=".into()))
        );
        let req = parse_render_request(&params, LayoutMode::BottomAnchored, None).expect("parse");
        assert_eq!(
            req.background_image,
            Some(ImageSource::Url("https://cdn.example.com/a.jpg".into()))
        );
    }

    #[test]
    fn json_params_become_text() {
        let mut map = HashMap::new();
        map.insert("title".to_string(), serde_json::json!("Hello"));
        map.insert("w".to_string(), serde_json::json!(800));
        map.insert("sb".to_string(), serde_json::json!(true));
        map.insert("hl".to_string(), serde_json::json!(["#111", "#222"]));
        map.insert("logoUrl".to_string(), serde_json::Value::Null);
        let params = RequestParams::from_json(&map);
        assert_eq!(params.get("w"), Some("800"));
        assert_eq!(params.get("sb"), Some("true"));
        assert_eq!(params.get("hl"), Some("#111,#222"));
        assert_eq!(params.get("logoUrl"), None);
    }

    #[test]
    fn normalizes_bare_hex_colors() {
        assert_eq!(normalize_color("FFD700"), "#FFD700");
        assert_eq!(normalize_color("#abc"), "#abc");
        assert_eq!(normalize_color("rgba(0,0,0,0.5)"), "rgba(0,0,0,0.5)");
        assert_eq!(normalize_color("white"), "white");
    }
}
