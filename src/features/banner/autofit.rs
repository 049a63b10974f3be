use super::theme::DesignTheme;
use super::wrap::{WrapResult, wrap};

/// 行数阈值：折行结果达到 `min_lines` 行时，字号按 `scale` 缩小。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitStep {
    pub min_lines: usize,
    pub scale: f64,
}

/// 默认阈值表（≥3 / ≥4 / ≥5 行）
pub const DEFAULT_FIT_STEPS: [FitStep; 3] = [
    FitStep {
        min_lines: 3,
        scale: 0.85,
    },
    FitStep {
        min_lines: 4,
        scale: 0.75,
    },
    FitStep {
        min_lines: 5,
        scale: 0.65,
    },
];

/// 自动字号：一次查表、至多一次重排，不做迭代收敛。
#[derive(Debug, Clone)]
pub struct AutoFitSizer {
    pub char_width_factor: f64,
    pub min_font_size: f64,
    pub steps: Vec<FitStep>,
}

impl AutoFitSizer {
    pub fn new(char_width_factor: f64, min_font_size: f64, steps: Vec<FitStep>) -> Self {
        Self {
            char_width_factor,
            min_font_size,
            steps,
        }
    }

    pub fn for_theme(theme: &DesignTheme) -> Self {
        Self::new(
            theme.char_width_factor,
            theme.min_font_size,
            DEFAULT_FIT_STEPS.to_vec(),
        )
    }

    /// 给定行数对应的缩放比例；取所有命中阈值中的最小值，保证随行数单调不增。
    pub fn scale_for(&self, line_count: usize) -> f64 {
        self.steps
            .iter()
            .filter(|s| line_count >= s.min_lines)
            .map(|s| s.scale)
            .fold(1.0_f64, f64::min)
            .min(1.0)
    }

    /// 给定行数对应的目标字号（不低于下限，不高于基准字号）
    pub fn font_size_for(&self, base_font_size_px: f64, line_count: usize) -> f64 {
        let floor = self.min_font_size.min(base_font_size_px);
        (base_font_size_px * self.scale_for(line_count))
            .round()
            .clamp(floor, base_font_size_px)
    }

    pub fn fit(&self, text: &str, max_width_px: f64, base_font_size_px: f64) -> WrapResult {
        let first = wrap(text, max_width_px, base_font_size_px, self.char_width_factor);
        let size = self.font_size_for(base_font_size_px, first.line_count());
        if size >= base_font_size_px {
            return first;
        }
        tracing::debug!(
            "标题 {} 行，字号 {} -> {}",
            first.line_count(),
            base_font_size_px,
            size
        );
        wrap(text, max_width_px, size, self.char_width_factor)
    }
}
