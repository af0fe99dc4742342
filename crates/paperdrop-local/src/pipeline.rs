//! Pipeline orchestrator: document text in, complete result record out.
//!
//! Strictly sequential: title, then one summarizer call per catalog question,
//! then category on the original text, then the brief digest on the *merged
//! summary* (the digest must reflect the distilled summary, not raw source
//! noise). The first transport error aborts the remaining steps; no partial
//! record is ever produced.

use crate::templates::{
    model_from_env, question_ids, run_template, BrieflySummarizer, CategoryClassifier,
    ContentSummarizer, TitleExtractor,
};
use paperdrop_core::{ChatModel, Paper, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub title: String,
    pub summary: BTreeMap<String, String>,
    pub category: Vec<String>,
    pub brief_digest: String,
}

impl PipelineOutput {
    /// Assemble the immutable result record for `url`.
    pub fn into_paper(self, url: impl Into<String>) -> Paper {
        Paper {
            title: self.title,
            category: self.category,
            brief_digest: self.brief_digest,
            url: url.into(),
            summary: self.summary,
        }
    }
}

pub struct SummaryPipeline<'a> {
    model: &'a dyn ChatModel,
    model_id: String,
}

impl<'a> SummaryPipeline<'a> {
    pub fn new(model: &'a dyn ChatModel, model_id: impl Into<String>) -> Self {
        Self {
            model,
            model_id: model_id.into(),
        }
    }

    pub fn from_env(model: &'a dyn ChatModel) -> Self {
        Self::new(model, model_from_env())
    }

    pub async fn process(&self, text: &str) -> Result<PipelineOutput> {
        debug!(chars = text.len(), "pipeline start");
        let title = run_template(self.model, &TitleExtractor::new(&self.model_id), text).await?;

        let mut summary = BTreeMap::new();
        for id in question_ids() {
            let template = ContentSummarizer::for_question(&self.model_id, id);
            let (key, answer) = run_template(self.model, &template, text).await?;
            summary.insert(key, answer);
        }

        let category =
            run_template(self.model, &CategoryClassifier::new(&self.model_id), text).await?;

        let merged = merged_summary_text(&summary);
        let brief_digest = run_template(
            self.model,
            &BrieflySummarizer::new(&self.model_id),
            merged.as_str(),
        )
        .await?;

        debug!(title, categories = category.len(), "pipeline complete");
        Ok(PipelineOutput {
            title,
            summary,
            category,
            brief_digest,
        })
    }
}

/// Serialized form of the merged summary handed to the brief digest step.
fn merged_summary_text(summary: &BTreeMap<String, String>) -> String {
    let map: serde_json::Map<String, Value> = summary
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    serde_json::to_string_pretty(&Value::Object(map)).unwrap_or_default()
}
