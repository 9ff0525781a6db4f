//! Merchant → category classification.
//!
//! Evaluation order: user rules (highest priority first), then the built-in
//! keyword table against the merchant, then the same table against the free-text
//! hint, then an entity categorizer suggestion if it clears the floor.
//! The first hit wins.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{Category, Suggestion};

/// Built-in keyword table. Earlier rows win, so more specific categories come
/// first (`parking` must reach Transportation before Entertainment sees `park`).
/// Keywords match whole normalized tokens: `bar` matches "Joe's Bar" but not
/// "Barnes".
pub const KEYWORD_RULES: &[(Category, &[&str])] = &[
    (
        Category::Groceries,
        &[
            "grocery", "groceries", "supermarket", "market", "walmart", "target", "costco",
            "whole foods", "trader joe", "kroger", "safeway", "albertsons", "aldi", "fresh",
            "organic", "produce",
        ],
    ),
    (
        Category::FoodAndDining,
        &[
            "restaurant", "cafe", "coffee", "food", "dining", "pizza", "burger", "sushi", "bar",
            "pub", "diner", "grill", "kitchen", "bistro", "eatery", "mcdonald", "mcdonalds",
            "starbucks", "subway", "chipotle", "taco", "bakery",
        ],
    ),
    (
        Category::Healthcare,
        &[
            "hospital", "clinic", "doctor", "medical", "pharmacy", "cvs", "walgreens", "health",
            "dental", "vision", "medicine", "prescription", "insurance", "lab", "urgent care",
        ],
    ),
    (
        Category::Travel,
        &[
            "hotel", "motel", "airbnb", "resort", "booking", "expedia", "travel", "vacation",
            "trip", "marriott", "hilton", "hyatt", "rental car", "cruise", "tour",
        ],
    ),
    (
        Category::Transportation,
        &[
            "uber", "lyft", "taxi", "gas", "fuel", "parking", "transit", "metro", "bus", "train",
            "airline", "airlines", "flight", "car rental", "toll", "auto", "shell", "chevron",
            "exxon", "bp", "mobil",
        ],
    ),
    (
        Category::Utilities,
        &[
            "electric", "water", "utility", "utilities", "power", "internet", "cable", "phone",
            "mobile", "telecom", "att", "verizon", "t mobile", "comcast", "spectrum",
        ],
    ),
    (
        Category::Education,
        &[
            "school", "university", "college", "tuition", "education", "books", "textbook",
            "course", "training", "learning", "udemy", "coursera", "class", "seminar", "workshop",
        ],
    ),
    (
        Category::Entertainment,
        &[
            "movie", "theater", "theatre", "cinema", "netflix", "spotify", "game", "concert",
            "ticket", "show", "museum", "park", "amusement", "entertainment", "streaming",
            "subscription", "hulu", "disney",
        ],
    ),
    (
        Category::Shopping,
        &[
            "amazon", "ebay", "mall", "store", "shop", "retail", "clothing", "fashion", "apparel",
            "shoes", "electronics", "best buy", "apple store", "nike", "adidas", "zara", "h m",
            "department",
        ],
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Confidence reported for a keyword or user-rule hit on the merchant.
    pub rule_confidence: u8,
    /// Confidence reported for a keyword hit found only in the free-text hint.
    pub hint_confidence: u8,
    /// Whether to consult the entity categorizer when no rule matches.
    pub entity_fallback: bool,
    /// Entity suggestions must score strictly above this to be accepted.
    pub entity_confidence_floor: u8,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rule_confidence: 80,
            hint_confidence: 60,
            entity_fallback: true,
            entity_confidence_floor: 60,
        }
    }
}

/// External hint source, e.g. an entity-detection service.
pub trait EntityCategorizer {
    fn suggest_category(&self, text: &str) -> Option<Suggestion>;
}

/// A suggestion captured upstream acts as a categorizer that always answers
/// with itself.
impl EntityCategorizer for Suggestion {
    fn suggest_category(&self, _text: &str) -> Option<Suggestion> {
        Some(*self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Contains,
    StartsWith,
    Regex,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::Regex => "regex",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "contains" => Some(Self::Contains),
            "starts_with" => Some(Self::StartsWith),
            "regex" => Some(Self::Regex),
            _ => None,
        }
    }
}

/// User-defined rule, stored per user.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomRule {
    pub id: i64,
    pub pattern: String,
    pub match_type: MatchType,
    pub category: Category,
    pub priority: i64,
}

/// A rule with its pattern prepared for matching.
#[derive(Debug, Clone)]
struct CompiledRule {
    rule: CustomRule,
    pattern_upper: String,
    regex: Option<Regex>,
}

impl CompiledRule {
    fn new(rule: CustomRule) -> Self {
        let regex = match rule.match_type {
            MatchType::Regex => match Regex::new(&rule.pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(rule = rule.id, pattern = %rule.pattern, error = %e, "invalid rule regex, rule never matches");
                    None
                }
            },
            _ => None,
        };
        Self {
            pattern_upper: rule.pattern.to_uppercase(),
            rule,
            regex,
        }
    }

    fn matches(&self, merchant: &str) -> bool {
        match self.rule.match_type {
            MatchType::Contains => merchant.to_uppercase().contains(&self.pattern_upper),
            MatchType::StartsWith => merchant.to_uppercase().starts_with(&self.pattern_upper),
            MatchType::Regex => self.regex.as_ref().is_some_and(|re| re.is_match(merchant)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMethod {
    CustomRule(i64),
    Keyword,
    Hint,
    Entity,
    Default,
}

impl ClassificationMethod {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CustomRule(_) => "rule",
            Self::Keyword => "keywords",
            Self::Hint => "hint",
            Self::Entity => "entity",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub confidence: u8,
    pub method: ClassificationMethod,
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
    custom_rules: Vec<CompiledRule>,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            custom_rules: Vec::new(),
        }
    }

    /// Attach user rules. Higher priority is evaluated first, ties by rule id.
    pub fn with_custom_rules(mut self, mut rules: Vec<CustomRule>) -> Self {
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
        self.custom_rules = rules.into_iter().map(CompiledRule::new).collect();
        self
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn classify(
        &self,
        merchant: &str,
        text_hint: Option<&str>,
        entity: Option<&dyn EntityCategorizer>,
    ) -> Classification {
        let merchant = merchant.trim();

        if !merchant.is_empty() {
            if let Some(compiled) = self.custom_rules.iter().find(|r| r.matches(merchant)) {
                return Classification {
                    category: compiled.rule.category,
                    confidence: self.config.rule_confidence,
                    method: ClassificationMethod::CustomRule(compiled.rule.id),
                };
            }
        }

        if let Some(category) = keyword_category(merchant) {
            return Classification {
                category,
                confidence: self.config.rule_confidence,
                method: ClassificationMethod::Keyword,
            };
        }

        if let Some(category) = text_hint.and_then(keyword_category) {
            return Classification {
                category,
                confidence: self.config.hint_confidence,
                method: ClassificationMethod::Hint,
            };
        }

        if self.config.entity_fallback {
            let text = if merchant.is_empty() {
                text_hint.unwrap_or("")
            } else {
                merchant
            };
            if let Some(suggestion) = entity.and_then(|e| e.suggest_category(text)) {
                if suggestion.confidence > self.config.entity_confidence_floor {
                    return Classification {
                        category: suggestion.category,
                        confidence: suggestion.confidence.min(100),
                        method: ClassificationMethod::Entity,
                    };
                }
            }
        }

        Classification {
            category: Category::Other,
            confidence: 0,
            method: ClassificationMethod::Default,
        }
    }
}

/// Lowercase, turn every non-alphanumeric run into a single space.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// First category in `KEYWORD_RULES` with a keyword present in `text`.
pub fn keyword_category(text: &str) -> Option<Category> {
    let tokens: Vec<String> = normalize(text).split(' ').map(str::to_string).collect();
    if tokens.iter().all(|t| t.is_empty()) {
        return None;
    }
    KEYWORD_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| contains_phrase(&tokens, kw)))
        .map(|(category, _)| *category)
}

fn contains_phrase(tokens: &[String], keyword: &str) -> bool {
    let phrase: Vec<&str> = keyword.split(' ').collect();
    if phrase.is_empty() || phrase.len() > tokens.len() {
        return false;
    }
    tokens
        .windows(phrase.len())
        .any(|w| w.iter().zip(&phrase).all(|(t, p)| t == p))
}
