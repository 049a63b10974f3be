use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Serialize, Serializer};

use super::wrap::WrapResult;

/// 候选短语进入选择的最低分；没有任何候选达到该分数时走旧版单词匹配。
const MIN_PHRASE_SCORE: f64 = 5.0;
/// 关键词表命中的基础权重
const KEYWORD_WEIGHT: u32 = 5;
/// 普通词基础权重
const BASE_WEIGHT: u32 = 2;
/// 请求自带关键词的权重
const CUSTOM_KEYWORD_WEIGHT: u32 = 10;
/// 单词短语翻倍所需的最低权重
const STRONG_WORD_WEIGHT: u32 = 8;
const MAX_PHRASE_WORDS: usize = 3;
const MAX_PHRASE_CHARS: usize = 18;

/// 清洗时剥离的标点噪声
const NOISE_CHARS: &[char] = &[
    '!', '?', '.', ',', ';', ':', '"', '\'', '“', '”', '‘', '’', '(', ')', '[', ']', '{', '}',
    '…', '*', '#',
];

/// 独立成词时视为分段符的破折号
const DASH_WORDS: &[&str] = &["-", "–", "—"];

/// 标题中的一段连续词，`color_index` 为所属短语在已选短语中的名次。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighlightSegment {
    pub text: String,
    pub highlighted: bool,
    /// 未强调时序列化为 -1
    #[serde(serialize_with = "serialize_color_index")]
    pub color_index: Option<usize>,
}

fn serialize_color_index<S: Serializer>(index: &Option<usize>, s: S) -> Result<S::Ok, S::Error> {
    match index {
        Some(i) => s.serialize_u64(*i as u64),
        None => s.serialize_i8(-1),
    }
}

impl HighlightSegment {
    fn new(text: String, color_index: Option<usize>) -> Self {
        Self {
            text,
            highlighted: color_index.is_some(),
            color_index,
        }
    }
}

/// 打分所需的词表
#[derive(Debug, Clone, Default)]
pub struct HighlightLexicon {
    impact_weights: HashMap<String, u32>,
    stopwords: HashSet<String>,
    semantic_pairs: HashSet<(String, String)>,
    keywords: Vec<String>,
}

impl HighlightLexicon {
    pub fn builtin() -> Self {
        let impact_weights = [
            ("FREE", 10),
            ("BREAKING", 9),
            ("SALE", 8),
            ("SAVE", 8),
            ("DEAL", 8),
            ("DEALS", 8),
            ("DISCOUNT", 8),
            ("EXCLUSIVE", 8),
            ("AMAZING", 7),
            ("BEST", 7),
            ("NEW", 7),
            ("LIMITED", 7),
            ("SECRET", 7),
            ("SECRETS", 7),
            ("ULTIMATE", 7),
            ("GUARANTEED", 7),
            ("BONUS", 7),
            ("REVEALED", 7),
            ("WIN", 7),
            ("NOW", 6),
            ("TODAY", 6),
            ("OFF", 6),
            ("HOT", 6),
            ("TOP", 6),
            ("FAST", 6),
            ("EASY", 6),
            ("PROVEN", 6),
            ("INSTANT", 6),
            ("POWERFUL", 6),
            ("ESSENTIAL", 6),
        ];
        let stopwords = [
            "A", "AN", "THE", "AND", "OR", "BUT", "OF", "TO", "IN", "ON", "AT", "FOR", "WITH",
            "BY", "FROM", "UP", "IS", "ARE", "WAS", "WERE", "BE", "IT", "ITS", "THIS", "THAT",
            "YOUR", "YOU", "OUR", "WE", "MY", "AS", "INTO", "ABOUT", "SO", "IF", "THAN", "THEN",
            "DO", "DOES", "WILL", "CAN",
        ];
        let semantic_pairs = [
            ("LIMITED", "TIME"),
            ("LIMITED", "OFFER"),
            ("FREE", "SHIPPING"),
            ("FREE", "TRIAL"),
            ("BEST", "SELLER"),
            ("BLACK", "FRIDAY"),
            ("CYBER", "MONDAY"),
            ("BREAKING", "NEWS"),
            ("FLASH", "SALE"),
            ("BIG", "SALE"),
            ("NEW", "ARRIVALS"),
            ("HOT", "DEALS"),
            ("TOP", "PICKS"),
            ("MUST", "READ"),
            ("MUST", "HAVE"),
            ("ONE", "DAY"),
        ];
        let keywords = [
            "SALE", "FREE", "NEW", "BEST", "TOP", "HOT", "DEAL", "OFFER", "DISCOUNT", "SAVE",
            "LIMITED", "EXCLUSIVE", "NOW", "TODAY", "GUIDE", "TIPS", "SECRETS", "HOW", "WHY",
            "ULTIMATE", "PRO", "EXPERT", "BONUS", "WIN", "NEWS",
        ];

        Self {
            impact_weights: impact_weights
                .iter()
                .map(|(w, s)| ((*w).to_string(), *s))
                .collect(),
            stopwords: stopwords.iter().map(|w| (*w).to_string()).collect(),
            semantic_pairs: semantic_pairs
                .iter()
                .map(|(a, b)| ((*a).to_string(), (*b).to_string()))
                .collect(),
            keywords: keywords.iter().map(|w| (*w).to_string()).collect(),
        }
    }

    pub fn with_weight(mut self, word: &str, weight: u32) -> Self {
        self.impact_weights.insert(word.to_uppercase(), weight);
        self
    }

    pub fn with_stopword(mut self, word: &str) -> Self {
        self.stopwords.insert(word.to_uppercase());
        self
    }

    pub fn with_pair(mut self, first: &str, second: &str) -> Self {
        self.semantic_pairs
            .insert((first.to_uppercase(), second.to_uppercase()));
        self
    }

    pub fn with_keyword(mut self, word: &str) -> Self {
        self.keywords.push(word.to_uppercase());
        self
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    start: usize,
    end: usize,
    score: f64,
}

/// 单个请求的打分上下文（合并请求关键词）
struct ScoringContext<'a> {
    lexicon: &'a HighlightLexicon,
    custom: HashSet<String>,
}

impl ScoringContext<'_> {
    fn is_stopword(&self, word: &str) -> bool {
        self.lexicon.stopwords.contains(word)
    }

    fn is_keyword(&self, word: &str) -> bool {
        self.custom.contains(word) || self.lexicon.keywords.iter().any(|k| k == word)
    }

    /// 未计长度奖励的基础权重；停用词与空词返回 None
    fn base_weight(&self, word: &str) -> Option<u32> {
        if word.is_empty() || self.is_stopword(word) {
            return None;
        }
        let explicit = self.lexicon.impact_weights.get(word).copied();
        let weight = match (explicit, self.custom.contains(word)) {
            (Some(w), true) => w.max(CUSTOM_KEYWORD_WEIGHT),
            (None, true) => CUSTOM_KEYWORD_WEIGHT,
            (Some(w), false) => w,
            (None, false) if self.is_keyword(word) => KEYWORD_WEIGHT,
            (None, false) => BASE_WEIGHT,
        };
        Some(weight)
    }

    fn word_score(&self, word: &str) -> Option<(u32, f64)> {
        let base = self.base_weight(word)?;
        let len = word.chars().count();
        let mut score = f64::from(base);
        if len >= 6 {
            score += 1.0;
        }
        if len >= 8 {
            score += 1.0;
        }
        Some((base, score))
    }

    fn phrase_score(&self, words: &[String]) -> f64 {
        let mut total = 0.0;
        let mut weighted = 0usize;
        let mut strongest = 0u32;
        for word in words {
            if let Some((base, score)) = self.word_score(word) {
                total += score;
                weighted += 1;
                strongest = strongest.max(base);
            }
        }
        if weighted == 0 {
            return 0.0;
        }

        match words.len() {
            1 if strongest >= STRONG_WORD_WEIGHT => total *= 2.0,
            1 => {}
            2 => {
                let pair = (words[0].clone(), words[1].clone());
                total *= if self.lexicon.semantic_pairs.contains(&pair) {
                    2.2
                } else {
                    0.7
                };
            }
            _ => total *= 0.5,
        }

        if words.join(" ").chars().count() > MAX_PHRASE_CHARS {
            total -= 3.0;
        }
        total
    }
}

/// 关键词/短语强调打分器
#[derive(Debug, Clone)]
pub struct HighlightScorer {
    lexicon: HighlightLexicon,
}

impl Default for HighlightScorer {
    fn default() -> Self {
        Self::new(HighlightLexicon::builtin())
    }
}

impl HighlightScorer {
    pub fn new(lexicon: HighlightLexicon) -> Self {
        Self { lexicon }
    }

    /// 对标题打分并切分为强调/普通片段。
    ///
    /// 片段以单个空格拼接后等于空白归一化后的原文；至多 `max_highlights` 个颜色序号。
    pub fn score(
        &self,
        text: &str,
        max_highlights: usize,
        custom_keywords: &[String],
    ) -> Vec<HighlightSegment> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let mut tags: Vec<Option<usize>> = vec![None; words.len()];
        if max_highlights > 0 {
            let ctx = ScoringContext {
                lexicon: &self.lexicon,
                custom: custom_keywords
                    .iter()
                    .map(|k| clean_word(k))
                    .filter(|k| !k.is_empty())
                    .collect(),
            };
            let cleaned: Vec<String> = words.iter().map(|w| clean_word(w)).collect();
            let candidates = collect_candidates(&ctx, &words, &cleaned);

            if candidates.iter().any(|c| c.score >= MIN_PHRASE_SCORE) {
                select_phrases(candidates, max_highlights, &mut tags);
            } else {
                select_legacy_keywords(&ctx, &cleaned, max_highlights, &mut tags);
            }
        }

        build_segments(&words, &tags)
    }
}

/// 去除标点噪声并转大写
fn clean_word(word: &str) -> String {
    word.trim_matches(|c: char| NOISE_CHARS.contains(&c) || c.is_whitespace())
        .to_uppercase()
}

/// 按 `:` 与独立破折号切分为词下标区间，右侧段在前。
fn split_segments(words: &[&str]) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut start = 0usize;
    for (idx, word) in words.iter().enumerate() {
        if DASH_WORDS.contains(word) {
            if start < idx {
                segments.push((start, idx));
            }
            start = idx + 1;
        } else if word.ends_with(':') {
            segments.push((start, idx + 1));
            start = idx + 1;
        }
    }
    if start < words.len() {
        segments.push((start, words.len()));
    }
    segments.reverse();
    segments
}

fn collect_candidates(
    ctx: &ScoringContext<'_>,
    words: &[&str],
    cleaned: &[String],
) -> Vec<Candidate> {
    let mut out = Vec::new();
    for (seg_start, seg_end) in split_segments(words) {
        for start in seg_start..seg_end {
            for len in 1..=MAX_PHRASE_WORDS {
                let end = start + len;
                if end > seg_end {
                    break;
                }
                let score = ctx.phrase_score(&cleaned[start..end]);
                if score > 0.0 {
                    out.push(Candidate { start, end, score });
                }
            }
        }
    }
    out
}

/// 分数降序（稳定排序，平分按扫描顺序），贪心选择互不重叠的短语。
fn select_phrases(mut candidates: Vec<Candidate>, max: usize, tags: &mut [Option<usize>]) {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut rank = 0usize;
    for c in candidates {
        if rank >= max {
            break;
        }
        if c.score < MIN_PHRASE_SCORE {
            break;
        }
        if tags[c.start..c.end].iter().any(Option::is_some) {
            continue;
        }
        for tag in &mut tags[c.start..c.end] {
            *tag = Some(rank);
        }
        rank += 1;
    }
}

/// 旧版逻辑：按阅读顺序匹配关键词表（允许前缀匹配，如 DEALS → DEAL）
fn select_legacy_keywords(
    ctx: &ScoringContext<'_>,
    cleaned: &[String],
    max: usize,
    tags: &mut [Option<usize>],
) {
    let mut rank = 0usize;
    for (idx, word) in cleaned.iter().enumerate() {
        if rank >= max {
            break;
        }
        if word.is_empty() || ctx.is_stopword(word) {
            continue;
        }
        let matched = ctx
            .lexicon
            .keywords
            .iter()
            .chain(ctx.custom.iter())
            .any(|k| word == k || word.starts_with(k.as_str()));
        if matched {
            tags[idx] = Some(rank);
            rank += 1;
        }
    }
}

fn build_segments(words: &[&str], tags: &[Option<usize>]) -> Vec<HighlightSegment> {
    let mut segments: Vec<HighlightSegment> = Vec::new();
    let mut buf: Vec<&str> = Vec::new();
    let mut current: Option<usize> = None;

    for (word, tag) in words.iter().zip(tags) {
        if !buf.is_empty() && *tag != current {
            segments.push(HighlightSegment::new(buf.join(" "), current));
            buf.clear();
        }
        current = *tag;
        buf.push(*word);
    }
    if !buf.is_empty() {
        segments.push(HighlightSegment::new(buf.join(" "), current));
    }
    segments
}

/// 将整句片段按折行边界重新切分，每行一组片段。
pub fn split_segments_by_lines(
    segments: &[HighlightSegment],
    wrap: &WrapResult,
) -> Vec<Vec<HighlightSegment>> {
    let mut tagged = segments
        .iter()
        .flat_map(|s| s.text.split(' ').map(move |_| s.color_index));

    wrap.lines
        .iter()
        .map(|line| {
            let words: Vec<&str> = line.tokens.iter().map(|t| t.text.as_str()).collect();
            let tags: Vec<Option<usize>> =
                words.iter().map(|_| tagged.next().flatten()).collect();
            build_segments(&words, &tags)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::banner::wrap::wrap;

    fn scorer() -> HighlightScorer {
        HighlightScorer::default()
    }

    fn highlighted(segments: &[HighlightSegment]) -> Vec<(&str, usize)> {
        segments
            .iter()
            .filter_map(|s| s.color_index.map(|c| (s.text.as_str(), c)))
            .collect()
    }

    #[test]
    fn right_hand_segment_wins_ties() {
        let segments = scorer().score("AMAZING SALE: SAVE UP TO 50", 2, &[]);
        assert_eq!(highlighted(&segments), vec![("SALE:", 1), ("SAVE", 0)]);
        assert_eq!(segments.first().map(|s| s.text.as_str()), Some("AMAZING"));
        assert_eq!(segments.last().map(|s| s.text.as_str()), Some("UP TO 50"));
    }

    #[test]
    fn known_pairs_are_highlighted_as_phrase() {
        let segments = scorer().score("Huge Black Friday savings", 1, &[]);
        assert_eq!(highlighted(&segments), vec![("Black Friday", 0)]);
    }

    #[test]
    fn preserves_original_casing_and_punctuation() {
        let text = "Get   the (Free) shipping deal!";
        let segments = scorer().score(text, 3, &[]);
        let joined = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(joined, "Get the (Free) shipping deal!");
        assert!(segments.iter().any(|s| s.text.contains("(Free)") && s.highlighted));
    }

    #[test]
    fn respects_max_highlights_and_partitions_words() {
        let texts = [
            "FREE SALE NEW DEAL BEST OFFER TODAY NOW",
            "nothing special here at all",
            "BREAKING NEWS - LIMITED TIME OFFER: SAVE BIG",
            "",
        ];
        for text in texts {
            for max in 0..4 {
                let segments = scorer().score(text, max, &[]);
                let mut indices: Vec<usize> =
                    segments.iter().filter_map(|s| s.color_index).collect();
                indices.sort_unstable();
                indices.dedup();
                assert!(indices.len() <= max, "{text:?} max={max}");
                let words: usize = segments
                    .iter()
                    .map(|s| s.text.split_whitespace().count())
                    .sum();
                assert_eq!(words, text.split_whitespace().count());
                assert!(segments.iter().all(|s| s.highlighted == s.color_index.is_some()));
            }
        }
    }

    #[test]
    fn plain_text_without_keywords_stays_plain() {
        let segments = scorer().score("the cat sat on it", 2, &[]);
        assert_eq!(segments.len(), 1);
        assert!(!segments[0].highlighted);
    }

    #[test]
    fn falls_back_to_keyword_prefix_matching() {
        // OFFERS 不在权重表中（基础分 2+1），只有前缀匹配的旧逻辑能命中
        let segments = scorer().score("the offers", 2, &[]);
        assert_eq!(highlighted(&segments), vec![("offers", 0)]);
    }

    #[test]
    fn custom_keywords_take_priority() {
        let custom = vec!["rust".to_string()];
        let segments = scorer().score("Learn Rust with the best guide", 1, &custom);
        assert_eq!(highlighted(&segments), vec![("Rust", 0)]);
    }

    #[test]
    fn extended_lexicon_changes_selection() {
        let text = "the cat sat on it";
        assert!(highlighted(&scorer().score(text, 1, &[])).is_empty());

        let weighted = HighlightScorer::new(HighlightLexicon::builtin().with_weight("cat", 9));
        assert_eq!(highlighted(&weighted.score(text, 1, &[])), vec![("cat", 0)]);

        let paired = HighlightScorer::new(
            HighlightLexicon::builtin()
                .with_weight("cat", 9)
                .with_pair("cat", "sat"),
        );
        assert_eq!(highlighted(&paired.score(text, 1, &[])), vec![("cat sat", 0)]);

        let keyworded = HighlightScorer::new(
            HighlightLexicon::builtin()
                .with_stopword("cat")
                .with_keyword("sat"),
        );
        assert_eq!(highlighted(&keyworded.score(text, 1, &[])), vec![("sat", 0)]);
    }

    #[test]
    fn long_phrases_are_penalised() {
        let ctx = ScoringContext {
            lexicon: &HighlightLexicon::builtin(),
            custom: HashSet::new(),
        };
        let short = ctx.phrase_score(&["BEST".into(), "SELLER".into()]);
        let long = ctx.phrase_score(&["BESTSELLING".into(), "EXTRAORDINARY".into()]);
        assert!((short - (7.0 + 3.0) * 2.2).abs() < 1e-9);
        assert!((long - ((4.0 + 4.0) * 0.7 - 3.0)).abs() < 1e-9);
    }

    #[test]
    fn is_deterministic() {
        let text = "NEW: The Ultimate Guide to FREE Tools - Save Time Today";
        let a = scorer().score(text, 3, &[]);
        let b = scorer().score(text, 3, &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn splits_segments_on_line_boundaries() {
        let text = "AMAZING SALE: SAVE UP TO 50";
        let segments = scorer().score(text, 2, &[]);
        let wrapped = wrap(text, 300.0, 48.0, 0.55);
        let per_line = split_segments_by_lines(&segments, &wrapped);
        assert_eq!(per_line.len(), wrapped.line_count());
        for (line, segs) in wrapped.lines.iter().zip(&per_line) {
            let joined = segs
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            assert_eq!(joined, line.text());
        }
        // 第二行为 "SALE: SAVE"，两个词分属不同短语
        assert_eq!(
            per_line[1],
            vec![
                HighlightSegment::new("SALE:".into(), Some(1)),
                HighlightSegment::new("SAVE".into(), Some(0)),
            ]
        );
    }

    #[test]
    fn plain_segments_serialize_with_negative_index() {
        let plain = serde_json::to_value(HighlightSegment::new("ON".into(), None)).expect("json");
        assert_eq!(plain["color_index"], -1);
        assert_eq!(plain["highlighted"], false);
        let hot = serde_json::to_value(HighlightSegment::new("SALE".into(), Some(1))).expect("json");
        assert_eq!(hot["color_index"], 1);
    }
}
