use crate::config::ClassifierRule;

/// Scope assigned when no rule matches
pub const FALLBACK_SCOPE: &str = "other";

/// Guesses a scope for content that has no owning source
///
/// Rules are checked in order; the first rule with a keyword contained in
/// the text (case-insensitive) wins.
#[derive(Debug, Clone)]
pub struct ScopeClassifier {
    rules: Vec<ClassifierRule>,
}

impl ScopeClassifier {
    pub fn new(rules: Vec<ClassifierRule>) -> Self {
        Self { rules }
    }

    /// Uses the configured rules, or the built-in ones when none are given
    pub fn from_config(rules: &[ClassifierRule]) -> Self {
        if rules.is_empty() {
            Self::default()
        } else {
            Self::new(rules.to_vec())
        }
    }

    pub fn classify(&self, text: &str) -> String {
        let haystack = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| {
                rule.keywords
                    .iter()
                    .any(|keyword| haystack.contains(&keyword.to_lowercase()))
            })
            .map(|rule| rule.scope.clone())
            .unwrap_or_else(|| FALLBACK_SCOPE.to_string())
    }
}

impl Default for ScopeClassifier {
    fn default() -> Self {
        let rule = |scope: &str, keywords: &[&str]| ClassifierRule {
            scope: scope.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        };

        Self::new(vec![
            rule("ai", &["人工智能", "AI", "机器学习", "深度学习", "LLM", "GPT"]),
            rule("tech", &["科技", "技术", "软件", "硬件", "互联网"]),
            rule("finance", &["金融", "财经", "股票", "投资", "银行"]),
            rule("healthcare", &["医疗", "健康", "医药", "生物"]),
            rule("energy", &["能源", "电力", "新能源", "石油"]),
        ])
    }
}
