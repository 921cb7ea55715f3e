mod collector;
mod dedup;

pub use collector::{CollectionOrchestrator, CollectionSummary, CompanySelection};
pub use dedup::Deduplicator;
