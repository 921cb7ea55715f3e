mod aggregator;
mod format;

pub use aggregator::ReportAggregator;
