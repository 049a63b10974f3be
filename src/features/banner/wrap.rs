use serde::Serialize;
use unicode_width::UnicodeWidthStr;

/// 折行结果中的单个词
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrapToken {
    pub text: String,
    pub is_last_word_of_line: bool,
}

/// 一行折行结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrappedLine {
    pub tokens: Vec<WrapToken>,
}

impl WrappedLine {
    fn from_words(words: &[&str]) -> Self {
        let last = words.len().saturating_sub(1);
        Self {
            tokens: words
                .iter()
                .enumerate()
                .map(|(i, w)| WrapToken {
                    text: (*w).to_string(),
                    is_last_word_of_line: i == last,
                })
                .collect(),
        }
    }

    /// 以单个空格拼接的整行文本
    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn word_count(&self) -> usize {
        self.tokens.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WrapResult {
    pub lines: Vec<WrappedLine>,
    pub font_size_used: f64,
}

impl WrapResult {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line_texts(&self) -> Vec<String> {
        self.lines.iter().map(WrappedLine::text).collect()
    }

    /// 展平为词序列（与原文空白归一化后的词序一致）
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .flat_map(|l| l.tokens.iter().map(|t| t.text.as_str()))
    }
}

/// 每行可容纳的估算字符数：`floor(max_width / (font_size * factor))`，至少为 1。
pub fn char_budget(max_width_px: f64, font_size_px: f64, char_width_factor: f64) -> usize {
    let glyph = font_size_px * char_width_factor;
    if !glyph.is_finite() || glyph <= 0.0 || !max_width_px.is_finite() {
        return 1;
    }
    ((max_width_px / glyph).floor() as usize).max(1)
}

/// 按平均字宽贪心折行。
///
/// 不截断、不加省略号；超出单行预算的长词单独成行。
pub fn wrap(
    text: &str,
    max_width_px: f64,
    font_size_px: f64,
    char_width_factor: f64,
) -> WrapResult {
    let budget = char_budget(max_width_px, font_size_px, char_width_factor);
    let mut lines = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_width = 0usize;

    for word in text.split_whitespace() {
        let word_width = word.width();
        if current.is_empty() {
            if word_width > budget {
                lines.push(WrappedLine::from_words(&[word]));
                continue;
            }
            current.push(word);
            current_width = word_width;
            continue;
        }

        let candidate = current_width + 1 + word_width;
        if candidate <= budget {
            current.push(word);
            current_width = candidate;
            continue;
        }

        lines.push(WrappedLine::from_words(&current));
        current.clear();
        if word_width > budget {
            lines.push(WrappedLine::from_words(&[word]));
            current_width = 0;
        } else {
            current.push(word);
            current_width = word_width;
        }
    }
    if !current.is_empty() {
        lines.push(WrappedLine::from_words(&current));
    }

    WrapResult {
        lines,
        font_size_used: font_size_px,
    }
}
