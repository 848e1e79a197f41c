//! 情感分析模块
//!
//! 基于词典的极性打分：命中词的极性取平均，结果落在 [-1, 1]。
//! 支持简单否定（"not good"）和程度副词（"very good"）。

use crate::types::SentimentLabel;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static WORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z]+(?:'[a-z]+)?").expect("word pattern is valid"));

/// 否定词之后的极性乘以该系数
const NEGATION_FACTOR: f64 = -0.5;

/// 情感分析结果
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentAnalysis {
    /// 情感分数 [-1.0, 1.0]
    pub score: f64,
    pub label: SentimentLabel,
}

/// 情感分析器
pub struct SentimentAnalyzer {
    polarity: HashMap<String, f64>,
    intensifiers: HashMap<String, f64>,
    negations: Vec<String>,
}

impl SentimentAnalyzer {
    pub fn new() -> Self {
        let mut analyzer = Self {
            polarity: HashMap::new(),
            intensifiers: HashMap::new(),
            negations: Vec::new(),
        };

        analyzer.initialize_dictionaries();
        analyzer
    }

    fn initialize_dictionaries(&mut self) {
        // 正面词汇
        let positive_words = [
            ("good", 0.7),
            ("great", 0.8),
            ("excellent", 1.0),
            ("amazing", 0.6),
            ("wonderful", 1.0),
            ("best", 1.0),
            ("better", 0.5),
            ("happy", 0.8),
            ("love", 0.5),
            ("nice", 0.6),
            ("beautiful", 0.85),
            ("success", 0.6),
            ("successful", 0.75),
            ("win", 0.8),
            ("positive", 0.23),
            ("growth", 0.4),
            ("improve", 0.4),
            ("benefit", 0.4),
            ("hope", 0.3),
            ("perfect", 1.0),
            ("fantastic", 0.4),
            ("glad", 0.5),
            ("pleasant", 0.73),
            ("strong", 0.43),
            ("safe", 0.5),
            ("easy", 0.43),
            ("right", 0.29),
            ("fun", 0.3),
            ("interesting", 0.5),
            ("true", 0.35),
        ];

        // 负面词汇
        let negative_words = [
            ("bad", -0.7),
            ("terrible", -1.0),
            ("awful", -1.0),
            ("horrible", -1.0),
            ("worst", -1.0),
            ("worse", -0.4),
            ("sad", -0.5),
            ("hate", -0.8),
            ("poor", -0.4),
            ("wrong", -0.5),
            ("fail", -0.5),
            ("failure", -0.6),
            ("loss", -0.4),
            ("crisis", -0.6),
            ("danger", -0.6),
            ("dangerous", -0.6),
            ("angry", -0.5),
            ("negative", -0.3),
            ("pain", -0.5),
            ("problem", -0.3),
            ("difficult", -0.5),
            ("weak", -0.38),
            ("ugly", -0.7),
            ("fear", -0.6),
            ("broken", -0.4),
            ("dead", -0.2),
            ("sick", -0.71),
            ("false", -0.4),
            ("hard", -0.29),
            ("evil", -1.0),
        ];

        for (word, score) in positive_words.into_iter().chain(negative_words) {
            self.polarity.insert(word.to_string(), score);
        }

        let intensifiers = [
            ("very", 1.3),
            ("really", 1.2),
            ("extremely", 1.5),
            ("so", 1.2),
            ("too", 1.1),
            ("quite", 1.1),
            ("slightly", 0.7),
            ("somewhat", 0.8),
        ];
        for (word, factor) in intensifiers {
            self.intensifiers.insert(word.to_string(), factor);
        }

        self.negations = ["not", "no", "never", "isn't", "wasn't", "don't", "doesn't", "didn't"]
            .iter()
            .map(|w| w.to_string())
            .collect();
    }

    /// 分析一段文本
    pub fn analyze(&self, text: &str) -> SentimentAnalysis {
        let text = text.to_lowercase();
        let words: Vec<&str> = WORD_PATTERN.find_iter(&text).map(|m| m.as_str()).collect();

        let mut total = 0.0;
        let mut hits = 0usize;

        for (i, word) in words.iter().enumerate() {
            let Some(&polarity) = self.polarity.get(*word) else {
                continue;
            };

            let mut value = polarity;
            let mut negated = false;

            // 只看前两个词：修饰词和否定词
            for prev in words[i.saturating_sub(2)..i].iter().rev() {
                if let Some(&factor) = self.intensifiers.get(*prev) {
                    value *= factor;
                } else if self.negations.iter().any(|n| n == prev) {
                    negated = true;
                }
            }
            if negated {
                value *= NEGATION_FACTOR;
            }

            total += value.clamp(-1.0, 1.0);
            hits += 1;
        }

        let score = if hits == 0 {
            0.0
        } else {
            (total / hits as f64).clamp(-1.0, 1.0)
        };

        SentimentAnalysis {
            score,
            label: SentimentLabel::from_score(score),
        }
    }

    /// 分析新闻：标题 + 正文
    pub fn analyze_article(&self, title: &str, content: &str) -> SentimentAnalysis {
        self.analyze(&format!("{title} {content}"))
    }
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_sentiment() {
        let analyzer = SentimentAnalyzer::new();
        let result = analyzer.analyze("What a great and wonderful day, the results are excellent!");

        assert!(result.score > 0.1, "score = {}", result.score);
        assert_eq!(result.label, SentimentLabel::Positive);
    }

    #[test]
    fn test_negative_sentiment() {
        let analyzer = SentimentAnalyzer::new();
        let result = analyzer.analyze("A terrible failure, the worst crisis in years.");

        assert!(result.score < -0.1, "score = {}", result.score);
        assert_eq!(result.label, SentimentLabel::Negative);
    }

    #[test]
    fn test_neutral_when_no_lexicon_words() {
        let analyzer = SentimentAnalyzer::new();
        let result = analyzer.analyze("sunt aut facere repellat provident occaecati");

        assert_eq!(result.score, 0.0);
        assert_eq!(result.label, SentimentLabel::Neutral);
    }

    #[test]
    fn test_empty_text() {
        let analyzer = SentimentAnalyzer::new();
        assert_eq!(analyzer.analyze("").score, 0.0);
    }

    #[test]
    fn test_negation_flips_polarity() {
        let analyzer = SentimentAnalyzer::new();
        let plain = analyzer.analyze("good").score;
        let negated = analyzer.analyze("not good").score;

        assert!(plain > 0.0);
        assert!(negated < 0.0);
    }

    #[test]
    fn test_intensifier_strengthens() {
        let analyzer = SentimentAnalyzer::new();
        let plain = analyzer.analyze("good").score;
        let strong = analyzer.analyze("very good").score;

        assert!(strong > plain);
    }

    #[test]
    fn test_score_bounded() {
        let analyzer = SentimentAnalyzer::new();
        for text in [
            "extremely very excellent perfect best",
            "extremely very evil terrible worst",
            "not not not bad",
        ] {
            let score = analyzer.analyze(text).score;
            assert!((-1.0..=1.0).contains(&score), "{text}: {score}");
        }
    }

    #[test]
    fn test_analyze_article_uses_title_and_content() {
        let analyzer = SentimentAnalyzer::new();

        assert_eq!(
            analyzer.analyze_article("Great news today", "Nothing else here").label,
            SentimentLabel::Positive
        );
        assert_eq!(
            analyzer.analyze_article("Nothing in the title", "a terrible day").label,
            SentimentLabel::Negative
        );
    }
}
