use serde::Serialize;

/// 默认主题 ID（未知主题统一回退到该主题）
pub const DEFAULT_THEME_ID: &str = "default";

/// 标准字宽系数（平均字形宽度 / 字号）
pub const STANDARD_CHAR_WIDTH: f64 = 0.55;
/// 窄体/展示字体的字宽系数
pub const CONDENSED_CHAR_WIDTH: f64 = 0.45;

/// 渐变色标（offset 取值 0.0..=1.0）
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct GradientStop {
    pub offset: f32,
    pub color: String,
}

impl GradientStop {
    pub fn new(offset: f32, color: impl Into<String>) -> Self {
        Self {
            offset: offset.clamp(0.0, 1.0),
            color: color.into(),
        }
    }
}

/// 设计主题：一组命名的视觉默认值。
///
/// 主题在注册表构建完成后不可变，调用方只能拿到共享引用。
#[derive(Debug, Clone, Serialize)]
pub struct DesignTheme {
    pub id: &'static str,
    pub display_name: &'static str,
    pub title_color: &'static str,
    pub website_color: &'static str,
    pub gradient_stops: Vec<GradientStop>,
    pub title_font_size: f64,
    pub website_font_size: f64,
    pub font_weight: u16,
    pub font_family: &'static str,
    /// 折行估算使用的字宽系数
    pub char_width_factor: f64,
    /// 自动缩放字号下限
    pub min_font_size: f64,
    /// 默认强调色（请求未指定 hl 时使用）
    pub highlight_colors: Vec<&'static str>,
    /// 是否不绘制标题区背景
    pub transparent_background: bool,
    /// 是否启用关键词强调
    pub enable_highlight: bool,
    /// 标题下方是否绘制强调短线（会加大标题与网址的间距）
    pub accent_line: bool,
}

/// 主题注册表：进程启动时构建一次，之后只读。
#[derive(Debug)]
pub struct ThemeRegistry {
    themes: Vec<DesignTheme>,
    default_index: usize,
}

impl ThemeRegistry {
    /// 构建内置主题目录
    pub fn builtin() -> Self {
        let mut builder = ThemeRegistryBuilder::default();
        for theme in builtin_themes() {
            builder = builder.register(theme);
        }
        builder.build()
    }

    /// 按 ID 解析主题；未知 ID 回退到 `default`，不会报错。
    pub fn resolve(&self, id: &str) -> &DesignTheme {
        self.get(id)
            .unwrap_or_else(|| &self.themes[self.default_index])
    }

    /// 按 ID 精确查找（忽略大小写与首尾空白）
    pub fn get(&self, id: &str) -> Option<&DesignTheme> {
        let id = id.trim();
        self.themes.iter().find(|t| t.id.eq_ignore_ascii_case(id))
    }

    /// 默认主题
    pub fn default_theme(&self) -> &DesignTheme {
        &self.themes[self.default_index]
    }

    /// 按注册顺序列出全部主题
    pub fn list(&self) -> &[DesignTheme] {
        &self.themes
    }
}

/// 注册表构建器：重复 ID 以后注册者为准。
#[derive(Default)]
pub struct ThemeRegistryBuilder {
    themes: Vec<DesignTheme>,
}

impl ThemeRegistryBuilder {
    pub fn register(mut self, theme: DesignTheme) -> Self {
        if let Some(existing) = self.themes.iter_mut().find(|t| t.id == theme.id) {
            tracing::warn!("主题 {} 重复注册，后者覆盖前者", theme.id);
            *existing = theme;
        } else {
            self.themes.push(theme);
        }
        self
    }

    /// 完成构建；缺少 `default` 主题时补入内置默认主题。
    pub fn build(mut self) -> ThemeRegistry {
        let default_index = match self.themes.iter().position(|t| t.id == DEFAULT_THEME_ID) {
            Some(idx) => idx,
            None => {
                self.themes.insert(0, default_theme());
                0
            }
        };
        ThemeRegistry {
            themes: self.themes,
            default_index,
        }
    }
}

fn default_theme() -> DesignTheme {
    DesignTheme {
        id: DEFAULT_THEME_ID,
        display_name: "Default",
        title_color: "#FFFFFF",
        website_color: "#D0D0D0",
        gradient_stops: vec![
            GradientStop::new(0.0, "rgba(0,0,0,0)"),
            GradientStop::new(0.35, "rgba(0,0,0,0.55)"),
            GradientStop::new(1.0, "rgba(0,0,0,0.85)"),
        ],
        title_font_size: 48.0,
        website_font_size: 24.0,
        font_weight: 700,
        font_family: "Inter",
        char_width_factor: STANDARD_CHAR_WIDTH,
        min_font_size: 28.0,
        highlight_colors: vec!["#FFD700", "#FF6B6B", "#4ECDC4"],
        transparent_background: false,
        enable_highlight: true,
        accent_line: false,
    }
}

fn builtin_themes() -> Vec<DesignTheme> {
    let base = default_theme();
    vec![
        base.clone(),
        DesignTheme {
            id: "modern",
            display_name: "Modern",
            title_color: "#FFFFFF",
            website_color: "#A5B4FC",
            gradient_stops: vec![
                GradientStop::new(0.0, "rgba(30,27,75,0.70)"),
                GradientStop::new(1.0, "rgba(49,46,129,0.95)"),
            ],
            font_family: "Montserrat",
            font_weight: 800,
            highlight_colors: vec!["#FACC15", "#F472B6", "#34D399"],
            accent_line: true,
            ..base.clone()
        },
        DesignTheme {
            id: "minimal",
            display_name: "Minimal",
            title_color: "#111111",
            website_color: "#555555",
            gradient_stops: vec![GradientStop::new(1.0, "rgba(255,255,255,0.92)")],
            title_font_size: 44.0,
            website_font_size: 22.0,
            font_weight: 600,
            highlight_colors: vec!["#E11D48", "#2563EB"],
            enable_highlight: false,
            ..base.clone()
        },
        DesignTheme {
            id: "bold",
            display_name: "Bold",
            title_color: "#FFFFFF",
            website_color: "#FDE68A",
            gradient_stops: vec![
                GradientStop::new(0.0, "rgba(220,38,38,0.85)"),
                GradientStop::new(1.0, "rgba(127,29,29,0.95)"),
            ],
            title_font_size: 56.0,
            website_font_size: 26.0,
            font_weight: 900,
            font_family: "Bebas Neue",
            char_width_factor: CONDENSED_CHAR_WIDTH,
            min_font_size: 32.0,
            highlight_colors: vec!["#FDE047", "#FFFFFF", "#FB923C"],
            ..base.clone()
        },
        DesignTheme {
            id: "elegant",
            display_name: "Elegant",
            title_color: "#F5E6C8",
            website_color: "#C9A96E",
            gradient_stops: vec![
                GradientStop::new(0.0, "rgba(17,17,17,0.60)"),
                GradientStop::new(0.5, "rgba(17,17,17,0.85)"),
                GradientStop::new(1.0, "rgba(0,0,0,0.95)"),
            ],
            title_font_size: 46.0,
            font_weight: 500,
            font_family: "Playfair Display",
            highlight_colors: vec!["#D4AF37", "#E5C07B"],
            accent_line: true,
            ..base.clone()
        },
        DesignTheme {
            id: "neon",
            display_name: "Neon",
            title_color: "#F0ABFC",
            website_color: "#67E8F9",
            gradient_stops: vec![
                GradientStop::new(0.0, "rgba(15,23,42,0.75)"),
                GradientStop::new(1.0, "rgba(2,6,23,0.95)"),
            ],
            font_family: "Orbitron",
            font_weight: 700,
            char_width_factor: 0.6,
            highlight_colors: vec!["#22D3EE", "#A3E635", "#F472B6"],
            ..base.clone()
        },
        DesignTheme {
            id: "news",
            display_name: "News",
            title_color: "#FFFFFF",
            website_color: "#FECACA",
            gradient_stops: vec![GradientStop::new(1.0, "rgba(185,28,28,0.95)")],
            title_font_size: 52.0,
            font_weight: 800,
            font_family: "Oswald",
            char_width_factor: CONDENSED_CHAR_WIDTH,
            min_font_size: 30.0,
            highlight_colors: vec!["#FDE047", "#FFFFFF"],
            accent_line: true,
            ..base.clone()
        },
        DesignTheme {
            id: "quote",
            display_name: "Quote",
            title_color: "#FFFFFF",
            website_color: "#E5E7EB",
            gradient_stops: vec![
                GradientStop::new(0.0, "rgba(0,0,0,0.45)"),
                GradientStop::new(1.0, "rgba(0,0,0,0.65)"),
            ],
            title_font_size: 54.0,
            website_font_size: 28.0,
            font_weight: 600,
            font_family: "Lora",
            min_font_size: 30.0,
            highlight_colors: vec!["#FBBF24", "#93C5FD"],
            ..base.clone()
        },
        DesignTheme {
            id: "transparent",
            display_name: "Transparent",
            gradient_stops: Vec::new(),
            transparent_background: true,
            ..base
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_theme_falls_back_to_default() {
        let registry = ThemeRegistry::builtin();
        let theme = registry.resolve("nonexistent");
        assert_eq!(theme.id, DEFAULT_THEME_ID);
        assert!(std::ptr::eq(theme, registry.default_theme()));
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let registry = ThemeRegistry::builtin();
        assert_eq!(registry.resolve(" Bold ").id, "bold");
        assert!(registry.get("BOLD").is_some());
    }

    #[test]
    fn builder_inserts_default_when_missing() {
        let registry = ThemeRegistryBuilder::default()
            .register(DesignTheme {
                id: "custom",
                ..default_theme()
            })
            .build();
        assert_eq!(registry.default_theme().id, DEFAULT_THEME_ID);
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn builtin_themes_have_sane_fonts() {
        let registry = ThemeRegistry::builtin();
        for theme in registry.list() {
            assert!(theme.min_font_size <= theme.title_font_size, "{}", theme.id);
            assert!(theme.char_width_factor > 0.0, "{}", theme.id);
            assert!(
                theme
                    .gradient_stops
                    .windows(2)
                    .all(|w| w[0].offset <= w[1].offset),
                "{}",
                theme.id
            );
        }
    }
}
