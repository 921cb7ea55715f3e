use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How overflow content is posted after the main report message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStrategy {
    #[default]
    Overflow,
    None,
}

impl ThreadStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadStrategy::Overflow => "overflow",
            ThreadStrategy::None => "none",
        }
    }
}

impl FromStr for ThreadStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overflow" => Ok(ThreadStrategy::Overflow),
            "none" => Ok(ThreadStrategy::None),
            other => Err(format!("unknown thread strategy: {other}")),
        }
    }
}

impl fmt::Display for ThreadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub channel_id: String,
    pub channel_name: Option<String>,
    pub thread_strategy: ThreadStrategy,
    /// User mentioned at the top of every report.
    pub mention_user_id: Option<String>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationSettings {
    pub mention_handle: String,
    pub fallback_channel: String,
}
