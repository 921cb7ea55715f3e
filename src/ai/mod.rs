mod client;
mod enricher;

pub use client::{
    parse_json_reply, truncate_chars, ClaudeClient, CompletionRequest, LanguageModel,
    UnconfiguredModel,
};
pub use enricher::{EnrichmentEngine, EnrichmentInput};
