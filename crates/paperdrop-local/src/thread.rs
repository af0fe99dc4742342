//! Thread responder: answers follow-up questions from replayed thread history.
//!
//! Role inference: a message bearing a bot id replays as an assistant turn
//! with its literal text. The first user message carrying a link attachment is
//! substituted with the freshly downloaded document text; later links replay
//! as plain text. All other user messages replay with Slack markup stripped.

use crate::templates::{run_template, ChatAssistant};
use once_cell::sync::Lazy;
use paperdrop_core::{ChatModel, ChatTurn, ContentDownloader, Messenger, Result, ThreadAnswer};
use regex::Regex;
use tracing::{debug, warn};

/// Only the newest messages of long threads are replayed.
const HISTORY_WINDOW: usize = 30;

static SLACK_MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Remove angle-bracket delimited Slack tokens (mentions, link markup).
pub fn strip_markup(text: &str) -> String {
    SLACK_MARKUP.replace_all(text, "").to_string()
}

pub struct ThreadResponder<'a> {
    downloader: &'a dyn ContentDownloader,
    model: &'a dyn ChatModel,
    messenger: &'a dyn Messenger,
    model_id: String,
}

impl<'a> ThreadResponder<'a> {
    pub fn new(
        downloader: &'a dyn ContentDownloader,
        model: &'a dyn ChatModel,
        messenger: &'a dyn Messenger,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            downloader,
            model,
            messenger,
            model_id: model_id.into(),
        }
    }

    /// Answer the latest message of a thread using its replayed history.
    ///
    /// `current_text` is the triggering message; it is the sole turn when no
    /// history is retrievable. The returned `question` is the markup-stripped
    /// literal text of the newest raw message (not the substituted document
    /// text), so persisted Q/A rows stay human-readable.
    pub async fn answer(
        &self,
        channel: &str,
        thread_ts: &str,
        current_text: &str,
    ) -> Result<ThreadAnswer> {
        let replies = self.messenger.get_thread_replies(channel, thread_ts).await?;
        if !replies.ok {
            warn!(channel, thread_ts, "thread history unavailable, answering from current message only");
            let question = strip_markup(current_text);
            let turns = vec![ChatTurn::user(question.clone())];
            let answer =
                run_template(self.model, &ChatAssistant::new(&self.model_id), turns.as_slice())
                    .await?;
            return Ok(ThreadAnswer {
                question,
                answer,
                source_url: None,
            });
        }

        let skip = replies.messages.len().saturating_sub(HISTORY_WINDOW);
        let recent = &replies.messages[skip..];

        let mut turns = Vec::with_capacity(recent.len());
        let mut source_url: Option<String> = None;
        for message in recent {
            if message.bot_id.is_some() {
                turns.push(ChatTurn::assistant(message.text.clone()));
                continue;
            }
            if source_url.is_none() {
                let link = message
                    .attachments
                    .first()
                    .and_then(|a| a.original_url.clone());
                if let Some(url) = link {
                    debug!(url, "substituting linked document for thread message");
                    let content = self.downloader.download_content(&url).await?;
                    turns.push(ChatTurn::user(content));
                    source_url = Some(url);
                    continue;
                }
            }
            turns.push(ChatTurn::user(strip_markup(&message.text)));
        }

        let question = recent
            .last()
            .map(|m| strip_markup(&m.text))
            .unwrap_or_else(|| strip_markup(current_text));

        if source_url.is_none() {
            warn!(channel, thread_ts, "no source link found in thread messages");
        }

        let answer =
            run_template(self.model, &ChatAssistant::new(&self.model_id), turns.as_slice())
                .await?;
        Ok(ThreadAnswer {
            question,
            answer,
            source_url,
        })
    }
}
