//! LLM call templates: one template per task, each a pure prompt builder plus
//! a total postprocessor over the structured-response codec.
//!
//! Every template demands a JSON object from the model and recovers a typed
//! result from whatever comes back. Postprocessing never fails: a missing or
//! malformed field degrades to the template's documented default ("No Title",
//! empty answer, ["No Category"], "No Summary", "No Response").

use crate::codec::extract_json_object;
use paperdrop_core::{CallTemplate, ChatModel, ChatTurn, LlmSettings, Result};
use serde_json::{json, Value};

/// The fixed question set, in presentation order. Process lifetime, never
/// mutated; `Paper.summary` keys are derived from exactly these entries.
pub const QUESTION_CATALOG: &[(&str, &str)] = &[
    ("Q1", "何に関する論文か、専門外の研究者向けに詳しく説明してください。"),
    ("Q2", "論文の内容を、背景、新規性、方法などに分けて詳しく説明してください。"),
    ("Q3", "本研究の手法について特筆すべき部分を、詳しく説明してください。"),
    ("Q4", "本研究の成果や知見について特筆すべき部分を、詳しく説明してください。"),
    ("Q5", "本研究の限界について特筆すべき部分を、詳しく説明してください。"),
    ("Q6", "この論文中の記載で曖昧な部分を、詳しく説明してください。"),
    (
        "Q7",
        "引用されている論文の中で特筆すべきものを列挙し、本研究との関連性や違いを詳しく説明してください。",
    ),
    (
        "Q8",
        "本研究で用いたデータセットを網羅的に列挙し、名前やURLなどがあればそれらも含めて詳しく説明してください。",
    ),
];

pub fn question_ids() -> impl Iterator<Item = &'static str> {
    QUESTION_CATALOG.iter().map(|(id, _)| *id)
}

pub fn question_text(id: &str) -> &'static str {
    QUESTION_CATALOG
        .iter()
        .find(|(q, _)| *q == id)
        .map(|(_, text)| *text)
        .unwrap_or("No Question")
}

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub fn model_from_env() -> String {
    std::env::var("PAPERDROP_OPENAI_COMPAT_MODEL")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

/// Pretty-printed JSON block embedded into system prompts as the demanded
/// output shape.
fn format_block(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Uniform invocation protocol: preprocess -> completion -> postprocess.
pub async fn run_template<T>(
    model: &dyn ChatModel,
    template: &T,
    input: &T::Input,
) -> Result<T::Output>
where
    T: CallTemplate + Sync,
    T::Input: Sync,
{
    let turns = template.preprocess(input);
    let completion = model.complete(&turns, &template.settings()).await?;
    Ok(template.postprocess(&completion))
}

/// Extracts the paper title from full document text.
pub struct TitleExtractor {
    model: String,
}

impl TitleExtractor {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

impl CallTemplate for TitleExtractor {
    type Input = str;
    type Output = String;

    fn settings(&self) -> LlmSettings {
        LlmSettings::new(&self.model, 512)
    }

    fn preprocess(&self, text: &str) -> Vec<ChatTurn> {
        let output_format = json!({"title": "(string) Title of the content"});
        let system = format!(
            "あなたは研究論文のタイトル抽出AIである。以下の形式に従い論文タイトルを抽出せよ。\n{}",
            format_block(&output_format)
        );
        vec![
            ChatTurn::system(system),
            ChatTurn::user(format!("テキストからタイトルを抽出せよ:\n{text}")),
        ]
    }

    fn postprocess(&self, completion: &str) -> String {
        extract_json_object(completion)
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| "No Title".to_string())
    }
}

/// Answers one catalog question about the document. Constructed per question
/// id; the output pair is the merged-summary key and the answer.
pub struct ContentSummarizer {
    model: String,
    question: String,
}

impl ContentSummarizer {
    pub fn for_question(model: impl Into<String>, question_id: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            question: question_id.into(),
        }
    }

    /// The merged-summary key for this question: `"<id>: <question text>"`.
    pub fn summary_key(&self) -> String {
        format!("{}: {}", self.question, question_text(&self.question))
    }
}

impl CallTemplate for ContentSummarizer {
    type Input = str;
    type Output = (String, String);

    fn settings(&self) -> LlmSettings {
        LlmSettings::new(&self.model, 2048)
    }

    fn preprocess(&self, text: &str) -> Vec<ChatTurn> {
        let mut shape = serde_json::Map::new();
        shape.insert(
            self.question.clone(),
            Value::String(format!(
                "(string) Answer to {} in markdown format",
                self.question
            )),
        );
        let output_format = Value::Object(shape);
        let system = format!(
            "与えられる文章を読み、以下の問いに答えて下さい。\n\
             {}: {}\n\
             # 注意\n\
             - 出力は日本語で行うこと。その他の言語は一切認めません。ただし、専門用語と思われる単語はそのままでも良い。\n\
             - 可能な限り詳細に出力すること。だたし、最大300字程度とする。\n\
             - 敬語は使用しないこと。「〜である」、「〜だ」のような形式にすること。\n\
             - markdown形式は使用しないこと。特に、**bold** と __italics__ は使用しないこと。\n\
             - 見やすいように改行を入れること。箇条書きは・を使って表現すること。\n\
             以下の番号の質問に対して、以下の形式で回答してください。\n\
             # 出力形式\n\
             {}",
            self.question,
            question_text(&self.question),
            format_block(&output_format)
        );
        vec![
            ChatTurn::system(system),
            ChatTurn::user(format!("please summarize the following text:\n{text}")),
        ]
    }

    fn postprocess(&self, completion: &str) -> (String, String) {
        let answer = extract_json_object(completion)
            .get(&self.question)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        (self.summary_key(), answer)
    }
}

/// Classifies the document into the closed category label set. Membership is
/// prompt-defined, not enforced here.
pub struct CategoryClassifier {
    model: String,
}

impl CategoryClassifier {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

impl CallTemplate for CategoryClassifier {
    type Input = str;
    type Output = Vec<String>;

    fn settings(&self) -> LlmSettings {
        LlmSettings::new(&self.model, 512)
    }

    fn preprocess(&self, text: &str) -> Vec<ChatTurn> {
        let output_format = json!({
            "category": "(list) [Transfer Learning, Representation Learning, Self Supervised Learning, \
                         Generative Model, Audio, Theory, LLM, Agent, Survey, Robotics, NLP, CV, \
                         World Model, Foundation Model, Reinforcement Learning, Brain-Inspired Intelligence]"
        });
        let system = format!(
            "あなたは論文分類の専門AIである。以下のテキストから適切なカテゴリを判定せよ。\n出力形式:\n{}",
            format_block(&output_format)
        );
        vec![
            ChatTurn::system(system),
            ChatTurn::user(format!("テキストからカテゴリを抽出せよ:\n{text}")),
        ]
    }

    fn postprocess(&self, completion: &str) -> Vec<String> {
        // Models answer with either a real JSON array or a stringified
        // bracketed list; both shapes must decode without escalating.
        let decoded = extract_json_object(completion);
        let labels = match decoded.get("category") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>(),
            Some(Value::String(s)) => s
                .trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        };
        if labels.is_empty() {
            vec!["No Category".to_string()]
        } else {
            labels
        }
    }
}

/// Produces the one-sentence display digest (<= 60 characters, Japanese,
/// noun-ending, no terminal punctuation) from the merged summary text.
pub struct BrieflySummarizer {
    model: String,
}

impl BrieflySummarizer {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

impl CallTemplate for BrieflySummarizer {
    type Input = str;
    type Output = String;

    fn settings(&self) -> LlmSettings {
        LlmSettings::new(&self.model, 512)
    }

    fn preprocess(&self, merged_summary: &str) -> Vec<ChatTurn> {
        let few_shot = [
            json!({"summary": "スマートフォンで音声を別の声に変換する高速モデル「LLVC」"}),
            json!({"summary": "3.2兆トークンで学習された130億パラメータの大規模言語モデル「Skywork」"}),
            json!({"summary": "OpenAIの文字起こしAI「Whisper」を軽量化したモデル「Distil-Whisper」"}),
        ];
        let examples = few_shot
            .iter()
            .map(format_block)
            .collect::<Vec<_>>()
            .join("\n");
        let system = format!(
            "あなたは論文要約AIである。以下の制約に従い、論文内容を60文字以内・1文で要約せよ。\n例:\n{examples}"
        );
        vec![
            ChatTurn::system(system),
            ChatTurn::user(format!("以下のテキストを要約せよ:\n{merged_summary}")),
        ]
    }

    fn postprocess(&self, completion: &str) -> String {
        extract_json_object(completion)
            .get("summary")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| "No Summary".to_string())
    }
}

/// Open-ended chat over replayed thread history. Identity postprocess; the
/// completion text passes through unmodified.
pub struct ChatAssistant {
    model: String,
}

impl ChatAssistant {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

impl CallTemplate for ChatAssistant {
    type Input = [ChatTurn];
    type Output = String;

    fn settings(&self) -> LlmSettings {
        LlmSettings::new(&self.model, 4096)
    }

    fn preprocess(&self, turns: &[ChatTurn]) -> Vec<ChatTurn> {
        let system = "あなたはAI研究の専門家である。論文の内容に関するやりとりを踏まえて、ユーザーの質問に回答しなさい。\n\
                      # 注意\n\
                      - 出力は日本語で行うこと。その他の言語は一切認めません。ただし、専門用語と思われる単語はそのままでも良い。\n\
                      - 可能な限り詳細に出力すること。だたし、最大300字程度とする。\n\
                      - markdown形式は使用しないこと。特に、**bold** と __italics__ は使用しないこと。\n\
                      - 見やすいように改行を入れること。箇条書きは・を使って表現すること。";
        let mut out = Vec::with_capacity(turns.len() + 1);
        out.push(ChatTurn::system(system));
        out.extend(turns.iter().cloned());
        out
    }

    fn postprocess(&self, completion: &str) -> String {
        if completion.is_empty() {
            "No Response".to_string()
        } else {
            completion.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_eight_ordered_questions() {
        let ids: Vec<&str> = question_ids().collect();
        assert_eq!(ids, vec!["Q1", "Q2", "Q3", "Q4", "Q5", "Q6", "Q7", "Q8"]);
        assert_eq!(question_text("Q9"), "No Question");
    }

    #[test]
    fn title_extractor_defaults_on_missing_key() {
        let tpl = TitleExtractor::new(DEFAULT_MODEL);
        assert_eq!(tpl.postprocess(r#"{"foo": "bar"}"#), "No Title");
        assert_eq!(tpl.postprocess("complete garbage"), "No Title");
        assert_eq!(
            tpl.postprocess(r#"here you go: {"title": "Attention Is All You Need"}"#),
            "Attention Is All You Need"
        );
    }

    #[test]
    fn title_extractor_prompt_embeds_output_shape() {
        let tpl = TitleExtractor::new(DEFAULT_MODEL);
        let turns = tpl.preprocess("doc text");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, "system");
        assert!(turns[0].content.contains("\"title\""));
        assert!(turns[1].content.ends_with("doc text"));
    }

    #[test]
    fn summarizer_keys_answers_by_id_and_question_text() {
        let tpl = ContentSummarizer::for_question(DEFAULT_MODEL, "Q1");
        let (key, answer) = tpl.postprocess(r#"{"Q1": "要約である。"}"#);
        assert_eq!(key, format!("Q1: {}", question_text("Q1")));
        assert_eq!(answer, "要約である。");
    }

    #[test]
    fn summarizer_defaults_to_empty_answer_on_decode_failure() {
        let tpl = ContentSummarizer::for_question(DEFAULT_MODEL, "Q2");
        let (key, answer) = tpl.postprocess("not an object");
        assert_eq!(key, format!("Q2: {}", question_text("Q2")));
        assert_eq!(answer, "");
    }

    #[test]
    fn summarizer_prompt_embeds_exactly_its_own_question() {
        let tpl = ContentSummarizer::for_question(DEFAULT_MODEL, "Q3");
        let turns = tpl.preprocess("text");
        assert!(turns[0].content.contains(question_text("Q3")));
        assert!(!turns[0].content.contains(question_text("Q4")));
        assert!(turns[0].content.contains("\"Q3\""));
    }

    #[test]
    fn classifier_parses_stringified_list_with_trimming() {
        let tpl = CategoryClassifier::new(DEFAULT_MODEL);
        let labels = tpl.postprocess(r#"{"category": "[LLM,  CV , Survey]"}"#);
        assert_eq!(labels, vec!["LLM", "CV", "Survey"]);
    }

    #[test]
    fn classifier_parses_real_json_array() {
        let tpl = CategoryClassifier::new(DEFAULT_MODEL);
        let labels = tpl.postprocess(r#"{"category": ["Generative Model", " Audio "]}"#);
        assert_eq!(labels, vec!["Generative Model", "Audio"]);
    }

    #[test]
    fn classifier_defaults_on_missing_key() {
        let tpl = CategoryClassifier::new(DEFAULT_MODEL);
        assert_eq!(tpl.postprocess(r#"{"foo": "bar"}"#), vec!["No Category"]);
        assert_eq!(tpl.postprocess(r#"{"category": "[]"}"#), vec!["No Category"]);
    }

    #[test]
    fn brief_digest_extracts_summary_field() {
        let tpl = BrieflySummarizer::new(DEFAULT_MODEL);
        let digest = tpl.postprocess(r#"{"summary": "画像生成を高速化する新手法「X」"}"#);
        assert_eq!(digest, "画像生成を高速化する新手法「X」");
        assert!(!digest.contains('\n'));
        assert!(digest.chars().count() <= 60);
    }

    #[test]
    fn brief_digest_defaults_on_missing_key() {
        let tpl = BrieflySummarizer::new(DEFAULT_MODEL);
        assert_eq!(tpl.postprocess(r#"{"foo": "bar"}"#), "No Summary");
    }

    #[test]
    fn brief_digest_prompt_contains_few_shot_examples() {
        let tpl = BrieflySummarizer::new(DEFAULT_MODEL);
        let turns = tpl.preprocess("merged summary");
        assert!(turns[0].content.contains("Distil-Whisper"));
        assert!(turns[0].content.contains("LLVC"));
        assert!(turns[0].content.contains("Skywork"));
    }

    #[test]
    fn chat_assistant_prepends_system_and_keeps_order() {
        let tpl = ChatAssistant::new(DEFAULT_MODEL);
        let history = vec![ChatTurn::user("q1"), ChatTurn::assistant("a1")];
        let turns = tpl.preprocess(&history);
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, "system");
        assert_eq!(turns[1].content, "q1");
        assert_eq!(turns[2].role, "assistant");
    }

    #[test]
    fn chat_assistant_defaults_on_empty_completion() {
        let tpl = ChatAssistant::new(DEFAULT_MODEL);
        assert_eq!(tpl.postprocess(""), "No Response");
        assert_eq!(tpl.postprocess("回答である。"), "回答である。");
    }
}
