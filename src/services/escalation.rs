use std::sync::Arc;

use super::slack::{ChatClient, OutgoingMessage};
use crate::ai::truncate_chars;
use crate::db::Repository;

const MAX_ERROR_CHARS: usize = 500;

/// Proactive operator notification for collection and delivery failures.
/// Never fails its caller: problems are logged and dropped.
pub struct Escalator {
    chat: Arc<dyn ChatClient>,
    repository: Arc<Repository>,
}

impl Escalator {
    pub fn new(chat: Arc<dyn ChatClient>, repository: Arc<Repository>) -> Self {
        Self { chat, repository }
    }

    pub async fn escalate(&self, context: &str, error: &str) {
        tracing::error!(context, error, "Escalating pipeline failure");

        let settings = match self.repository.get_escalation_settings().await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                tracing::warn!(context, "No escalation settings configured, operator not notified");
                return;
            }
            Err(e) => {
                tracing::warn!(context, error = %e, "Could not read escalation settings");
                return;
            }
        };

        let text = format!(
            "{} :rotating_light: [{}] {}",
            settings.mention_handle,
            context,
            truncate_chars(error, MAX_ERROR_CHARS)
        );
        let message = OutgoingMessage::new(settings.fallback_channel, text);

        if let Err(e) = self.chat.post_message(&message).await {
            tracing::warn!(context, error = %e, "Failed to post escalation message");
        }
    }
}
