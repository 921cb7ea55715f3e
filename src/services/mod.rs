mod delivery;
mod escalation;
mod slack;

pub use delivery::{DeliveryEngine, ReportMessage, RetryPolicy};
pub use escalation::Escalator;
pub use slack::{
    ChatClient, ChatError, OutgoingMessage, PostedMessage, SlackClient, UnconfiguredChat,
};
