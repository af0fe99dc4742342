//! Mention-event boundary. Dispatches a channel mention to the summary
//! pipeline and a thread mention to the thread responder, posting results
//! back and persisting records.
//!
//! This layer never propagates an error to the caller: user-visible failures
//! turn into a short notice in the channel, persistence failures are logged
//! and swallowed. A delivery platform retries on error, and a retried
//! summarization run costs real money.

use crate::pipeline::SummaryPipeline;
use crate::thread::ThreadResponder;
use paperdrop_core::{ChatModel, ContentDownloader, Messenger, PaperStore, ThreadExchange};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

const NOTICE_NO_URL: &str = "URLが見つかりませんでした。";
const NOTICE_DOWNLOAD_FAILED: &str = "コンテンツのダウンロードに失敗しました。";
const NOTICE_PROCESSING_FAILED: &str = "コンテンツの処理に失敗しました。";

/// An app-mention event, already unwrapped from the delivery envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct MentionEvent {
    pub channel: String,
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub blocks: Value,
}

impl MentionEvent {
    /// True when the mention was typed inside an existing thread rather than
    /// at channel top level.
    pub fn is_thread_reply(&self) -> bool {
        match &self.thread_ts {
            Some(parent) => parent != &self.ts,
            None => false,
        }
    }
}

/// Walk the rich-text block tree for the first link element with a
/// non-empty url.
pub fn extract_url_from_blocks(blocks: &Value) -> Option<String> {
    let blocks = blocks.as_array()?;
    for block in blocks {
        let Some(outer) = block.get("elements").and_then(Value::as_array) else {
            continue;
        };
        for section in outer {
            let Some(inner) = section.get("elements").and_then(Value::as_array) else {
                continue;
            };
            for element in inner {
                if element.get("type").and_then(Value::as_str) != Some("link") {
                    continue;
                }
                if let Some(url) = element.get("url").and_then(Value::as_str) {
                    let url = url.trim();
                    if !url.is_empty() {
                        return Some(url.to_string());
                    }
                }
            }
        }
    }
    None
}

pub struct EventHandler {
    messenger: Arc<dyn Messenger>,
    downloader: Arc<dyn ContentDownloader>,
    model: Arc<dyn ChatModel>,
    store: Arc<dyn PaperStore>,
    model_id: String,
}

impl EventHandler {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        downloader: Arc<dyn ContentDownloader>,
        model: Arc<dyn ChatModel>,
        store: Arc<dyn PaperStore>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            messenger,
            downloader,
            model,
            store,
            model_id: model_id.into(),
        }
    }

    pub async fn handle_mention(&self, event: &MentionEvent) {
        if event.is_thread_reply() {
            self.handle_thread_mention(event).await;
        } else {
            self.handle_channel_mention(event).await;
        }
    }

    /// Replies to a channel mention all land in a thread under the mention
    /// itself, keeping the channel readable.
    async fn handle_channel_mention(&self, event: &MentionEvent) {
        let reply_ts = Some(event.ts.as_str());
        let Some(url) = extract_url_from_blocks(&event.blocks) else {
            warn!(channel = event.channel, "mention carried no link");
            self.notify(&event.channel, NOTICE_NO_URL, reply_ts).await;
            return;
        };
        info!(url, channel = event.channel, "summarizing linked document");

        let text = match self.downloader.download_content(&url).await {
            Ok(text) => text,
            Err(e) => {
                error!(url, error = %e, "download failed");
                self.notify(&event.channel, NOTICE_DOWNLOAD_FAILED, reply_ts).await;
                return;
            }
        };

        let pipeline = SummaryPipeline::new(self.model.as_ref(), &self.model_id);
        let output = match pipeline.process(&text).await {
            Ok(output) => output,
            Err(e) => {
                error!(url, error = %e, "summarization failed");
                self.notify(&event.channel, NOTICE_PROCESSING_FAILED, reply_ts).await;
                return;
            }
        };

        let paper = output.into_paper(&url);
        self.notify(
            &event.channel,
            &format!("{}\n{}", paper.title, paper.url),
            reply_ts,
        )
        .await;
        for (question, answer) in &paper.summary {
            self.notify(&event.channel, &format!("{question}\n\n{answer}"), reply_ts)
                .await;
        }

        if let Err(e) = self.store.persist_new(&paper).await {
            error!(url = paper.url, error = %e, "failed to persist summary record");
        }
    }

    async fn handle_thread_mention(&self, event: &MentionEvent) {
        let Some(thread_ts) = event.thread_ts.as_deref() else {
            return;
        };
        let responder = ThreadResponder::new(
            self.downloader.as_ref(),
            self.model.as_ref(),
            self.messenger.as_ref(),
            &self.model_id,
        );
        let exchange = match responder.answer(&event.channel, thread_ts, &event.text).await {
            Ok(exchange) => exchange,
            Err(e) => {
                error!(channel = event.channel, thread_ts, error = %e, "thread answer failed");
                self.notify(&event.channel, NOTICE_PROCESSING_FAILED, Some(thread_ts))
                    .await;
                return;
            }
        };

        if let Err(e) = self
            .messenger
            .post_message(&event.channel, &exchange.answer, Some(thread_ts))
            .await
        {
            error!(channel = event.channel, error = %e, "failed to post thread answer");
        }

        if let Some(source_url) = &exchange.source_url {
            let record = ThreadExchange {
                question: exchange.question.clone(),
                answer: exchange.answer.clone(),
            };
            if let Err(e) = self.store.persist_update(source_url, &record).await {
                error!(source_url, error = %e, "failed to persist thread exchange");
            }
        } else {
            warn!(channel = event.channel, thread_ts, "no source url, skipping persistence");
        }
    }

    /// Best-effort post; failures are logged, not raised.
    async fn notify(&self, channel: &str, text: &str, thread_ts: Option<&str>) {
        if let Err(e) = self.messenger.post_message(channel, text, thread_ts).await {
            error!(channel, error = %e, "failed to post message");
        }
    }
}
