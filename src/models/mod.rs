mod article;
mod company;
mod logs;
mod raw_item;
mod settings;
mod summary;

pub use article::{ArticleQuery, EnrichedArticle, SourceLink};
pub use company::{Company, FeedSource, NewCompany, SourceKind};
pub use logs::{CollectionLog, CollectionStatus, DeliveryLog, DeliveryStatus, ReportKind};
pub use raw_item::RawItem;
pub use settings::{ChannelSettings, EscalationSettings, ThreadStrategy};
pub use summary::{ArticleSummary, Category};
