use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of upstream a feed URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rss,
    Social,
    Search,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Rss => "rss",
            SourceKind::Social => "social",
            SourceKind::Search => "search",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rss" => Ok(SourceKind::Rss),
            "social" => Ok(SourceKind::Social),
            "search" => Ok(SourceKind::Search),
            other => Err(format!("unknown source kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub kind: SourceKind,
    pub url: String,
}

impl FeedSource {
    pub fn new(kind: SourceKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
        }
    }
}

/// A watched competitor. Owned by the admin surface, read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub feeds: Vec<FeedSource>,
    pub priority: i32,
    pub is_active: bool,
    /// Extra topical hints passed to enrichment prompts.
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCompany {
    pub name: String,
    pub feeds: Vec<FeedSource>,
    pub priority: i32,
    pub is_active: bool,
    pub context: Option<String>,
}
