use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("download failed: {0}")]
    Download(String),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("messaging failed: {0}")]
    Messaging(String),
    #[error("store failed: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// One turn of a chat-completion conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_SYSTEM.to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_ASSISTANT.to_string(),
            content: content.into(),
        }
    }
}

/// Per-call model settings. Immutable; built by each template and passed into
/// every completion call (no client-level mutable defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub model: String,
    pub max_tokens: Option<u64>,
    pub temperature: Option<f64>,
    /// Completion timeout. Model calls are slow but finite; keep this generous.
    pub timeout_ms: u64,
}

impl LlmSettings {
    pub fn new(model: impl Into<String>, max_tokens: u64) -> Self {
        Self {
            model: model.into(),
            max_tokens: Some(max_tokens),
            temperature: None,
            timeout_ms: 120_000,
        }
    }
}

/// The completed result record for one summarized source.
///
/// `summary` keys are `"<id>: <question text>"` for the fixed ids Q1..Q8; the
/// ids sort lexicographically in question order, so map iteration order equals
/// question order. Constructed once per main-message event, never partially.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub category: Vec<String>,
    pub brief_digest: String,
    pub url: String,
    pub summary: BTreeMap<String, String>,
}

/// A single question/answer pair appended to an existing record from a thread
/// follow-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadExchange {
    pub question: String,
    pub answer: String,
}

/// Link attachment on a thread message (the shape Slack reports).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attachment {
    pub original_url: Option<String>,
}

/// One message of a thread's reply history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub text: String,
    /// Present when the message was posted by a bot; drives role inference.
    pub bot_id: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Reply history for one thread. `ok == false` means the history could not be
/// retrieved; callers fall back to the triggering message alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadReplies {
    pub ok: bool,
    #[serde(default)]
    pub messages: Vec<ThreadMessage>,
}

/// Result of answering a thread follow-up.
///
/// `source_url` is the first link found in the thread, or `None` when the
/// thread concerns no downloadable source (a valid, non-error outcome).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadAnswer {
    pub question: String,
    pub answer: String,
    pub source_url: Option<String>,
}

/// Content acquisition: URL in, normalized plain text out.
#[async_trait::async_trait]
pub trait ContentDownloader: Send + Sync {
    async fn download_content(&self, url: &str) -> Result<String>;
}

/// Chat-completion inference over an ordered turn list.
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, turns: &[ChatTurn], settings: &LlmSettings) -> Result<String>;
}

/// Outbound notifications and thread history (the messaging platform seam).
#[async_trait::async_trait]
pub trait Messenger: Send + Sync {
    async fn post_message(&self, channel: &str, text: &str, thread_ts: Option<&str>)
        -> Result<()>;
    async fn get_thread_replies(&self, channel: &str, thread_ts: &str) -> Result<ThreadReplies>;
}

/// Durable storage keyed by source URL. Lookup-by-URL scans the existing record
/// set; no index is assumed.
#[async_trait::async_trait]
pub trait PaperStore: Send + Sync {
    async fn persist_new(&self, paper: &Paper) -> Result<()>;
    async fn persist_update(&self, source_url: &str, exchange: &ThreadExchange) -> Result<()>;
}

/// One LLM call template: a pure prompt builder plus a total postprocessor.
///
/// The invocation protocol is uniform across tasks: `preprocess` builds the turn
/// list, the model produces raw text, `postprocess` turns it into a typed result.
/// `postprocess` must never fail; unparsable output degrades to the template's
/// documented default instead.
pub trait CallTemplate {
    type Input: ?Sized;
    type Output;

    fn settings(&self) -> LlmSettings;
    fn preprocess(&self, input: &Self::Input) -> Vec<ChatTurn>;
    fn postprocess(&self, completion: &str) -> Self::Output;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_map_iterates_in_question_order() {
        let mut summary = BTreeMap::new();
        // Inserted out of order on purpose.
        summary.insert("Q3: c".to_string(), "3".to_string());
        summary.insert("Q1: a".to_string(), "1".to_string());
        summary.insert("Q2: b".to_string(), "2".to_string());
        let keys: Vec<&str> = summary.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["Q1: a", "Q2: b", "Q3: c"]);
    }

    #[test]
    fn thread_replies_deserializes_with_missing_optional_fields() {
        let raw = r#"{"ok": true, "messages": [{"text": "hi"}]}"#;
        let replies: ThreadReplies = serde_json::from_str(raw).unwrap();
        assert!(replies.ok);
        assert_eq!(replies.messages.len(), 1);
        assert!(replies.messages[0].bot_id.is_none());
        assert!(replies.messages[0].attachments.is_empty());
    }

    #[test]
    fn paper_round_trips_through_json() {
        let mut summary = BTreeMap::new();
        summary.insert("Q1: a".to_string(), "answer".to_string());
        let paper = Paper {
            title: "T".to_string(),
            category: vec!["LLM".to_string()],
            brief_digest: "d".to_string(),
            url: "https://arxiv.org/abs/2310.00001".to_string(),
            summary,
        };
        let s = serde_json::to_string(&paper).unwrap();
        let back: Paper = serde_json::from_str(&s).unwrap();
        assert_eq!(back.title, "T");
        assert_eq!(back.summary.len(), 1);
    }
}
