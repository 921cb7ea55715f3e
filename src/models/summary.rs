use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const FALLBACK_MODEL_VERSION: &str = "fallback";
pub const FALLBACK_IMPORTANCE: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Strategy,
    Technology,
    Personnel,
    Finance,
    Partnership,
    Regulatory,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Strategy,
        Category::Technology,
        Category::Personnel,
        Category::Finance,
        Category::Partnership,
        Category::Regulatory,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Strategy => "strategy",
            Category::Technology => "technology",
            Category::Personnel => "personnel",
            Category::Finance => "finance",
            Category::Partnership => "partnership",
            Category::Regulatory => "regulatory",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// Model-generated fields attached to one representative item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub translated_title: String,
    pub summary: String,
    pub headline: String,
    pub importance: u8,
    pub categories: Vec<Category>,
    pub model_version: String,
}

impl ArticleSummary {
    /// Deterministic output used whenever the model call fails.
    pub fn fallback(title: &str, company_name: &str) -> Self {
        Self {
            translated_title: title.to_string(),
            summary: format!("News article about {company_name}."),
            headline: title.chars().take(50).collect(),
            importance: FALLBACK_IMPORTANCE,
            categories: vec![Category::Other],
            model_version: FALLBACK_MODEL_VERSION.to_string(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.model_version == FALLBACK_MODEL_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parsing_is_case_insensitive() {
        assert_eq!("Finance".parse::<Category>(), Ok(Category::Finance));
        assert_eq!(" regulatory ".parse::<Category>(), Ok(Category::Regulatory));
        assert!("gossip".parse::<Category>().is_err());
    }

    #[test]
    fn fallback_keeps_title_and_names_company() {
        let summary = ArticleSummary::fallback("Acme opens Berlin office", "Acme");
        assert_eq!(summary.translated_title, "Acme opens Berlin office");
        assert!(summary.summary.contains("Acme"));
        assert_eq!(summary.importance, 50);
        assert_eq!(summary.categories, vec![Category::Other]);
        assert!(summary.is_fallback());
    }
}
