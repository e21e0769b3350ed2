//! LLM renderer backed by an OpenAI-compatible chat completion API.
//!
//! Sends a slimmed IR payload to the model: meta essentials, the quality and
//! entity sections, and for each change only its id, type, and summary. The
//! system prompt forbids inventing facts and requires every claim to cite a
//! `[CHG-XXXX]` id, so the model can only arrange what the pipeline already
//! established.

use std::env;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ir::DiffIr;

const DEEPSEEK_API_URL: &str = "https://api.deepseek.com/chat/completions";
const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";

/// Default chat model for report generation.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

const TEMPERATURE: f64 = 0.2;
const MAX_TOKENS: u32 = 1200;

const SYSTEM_PROMPT: &str = "\
You are an architecture-change reporting assistant.

Hard rules (must follow):
1) You MUST NOT invent any facts. Only use information present in the provided diff IR content.
2) Every statement about a change MUST cite at least one Change ID in the form [CHG-XXXX]. If you cannot cite a Change ID, do not write that statement.
3) Do NOT infer code-level or behavioral impact unless the diff explicitly states it. Prefer neutral wording like \"reassigned\" / \"aligned\" / \"mapped\".
4) Only the provided fields may be used; do not mention missing fields or infer from their absence.
5) Output must be valid Markdown. Use concise, technical language. Do not echo the input JSON.

Required output structure:
- Title line: \"Architecture Change Report: <version_a> -> <version_b>\"
- Section 1: \"Overview\" (2-4 bullets, each citing a Change ID)
- Section 2: \"Detected Changes\" (grouped: added modules / removed modules / changed modules)
- Section 3: \"Reliability notes\" (bullets)
- Section 4: \"Appendix: Change Index\" (CHG id -> one-line summary)
";

/// Slimmed IR payload sent to the chat model.
#[derive(Debug, Serialize)]
struct SlimIr {
    meta: SlimMeta,
    quality: Value,
    entities: Value,
    changes: Vec<SlimChange>,
}

#[derive(Debug, Serialize)]
struct SlimMeta {
    repo: String,
    version_a: String,
    version_b: String,
    generated_at: String,
}

#[derive(Debug, Serialize)]
struct SlimChange {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    summary: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatError {
    error: ChatErrorDetail,
}

#[derive(Deserialize)]
struct ChatErrorDetail {
    message: String,
}

fn slim_ir(ir: &DiffIr) -> Result<SlimIr, String> {
    let quality = serde_json::to_value(&ir.quality)
        .map_err(|e| format!("Failed to serialize quality section: {e}"))?;
    let entities = serde_json::to_value(&ir.entities)
        .map_err(|e| format!("Failed to serialize entities section: {e}"))?;
    Ok(SlimIr {
        meta: SlimMeta {
            repo: ir.meta.repo.clone(),
            version_a: ir.meta.version_a.clone(),
            version_b: ir.meta.version_b.clone(),
            generated_at: ir.meta.generated_at.clone(),
        },
        quality,
        entities,
        changes: ir
            .changes
            .iter()
            .map(|ev| SlimChange {
                id: ev.id.clone(),
                kind: ev.kind.as_str().to_string(),
                summary: ev.summary.clone(),
            })
            .collect(),
    })
}

/// Renders the Markdown report by asking the chat model.
///
/// # Errors
///
/// Returns an error if `DEEPSEEK_API_KEY` is not set, the request fails, or
/// the response cannot be parsed.
pub fn render_markdown_llm(ir: &DiffIr, model: &str) -> Result<String, String> {
    let payload = slim_ir(ir)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {e}"))?;
    runtime.block_on(complete(&payload, model))
}

async fn complete(payload: &SlimIr, model: &str) -> Result<String, String> {
    let api_key = env::var(API_KEY_ENV)
        .map_err(|_| format!("{API_KEY_ENV} environment variable not set"))?;

    let payload_json = serde_json::to_string_pretty(payload)
        .map_err(|e| format!("Failed to serialize IR payload: {e}"))?;
    let user_prompt = format!(
        "Generate a Markdown architecture change report strictly based on the following diff IR JSON.\n\ndiff_ir.json:\n{payload_json}"
    );

    let body = ChatRequest {
        model,
        messages: vec![
            ChatMessage { role: "system", content: SYSTEM_PROMPT },
            ChatMessage { role: "user", content: &user_prompt },
        ],
        stream: false,
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
    };

    let response = Client::new()
        .post(DEEPSEEK_API_URL)
        .bearer_auth(&api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| format!("Chat API request failed: {e}"))?;

    let status = response.status();
    let response_text =
        response.text().await.map_err(|e| format!("Failed to read chat API response: {e}"))?;

    if !status.is_success() {
        let msg = serde_json::from_str::<ChatError>(&response_text)
            .map(|e| e.error.message)
            .unwrap_or(response_text);
        return Err(format!("Chat API error ({}): {msg}", status.as_u16()));
    }

    let api_response: ChatResponse = serde_json::from_str(&response_text)
        .map_err(|e| format!("Failed to parse chat API response: {e}"))?;

    let text = api_response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{
        AlignmentMeta, ChangeDetail, ChangeEvent, ChangeType, EntitySection, EventIdAllocator,
        InputPaths, ModuleDiffMeta, QualitySection, RunMeta, SemanticsMeta,
    };

    #[test]
    fn slim_payload_keeps_only_id_type_summary_per_change() {
        let mut ids = EventIdAllocator::new();
        let ir = DiffIr {
            meta: RunMeta {
                repo: "libuv".into(),
                version_a: "vA".into(),
                version_b: "vB".into(),
                generated_at: "2026-01-01T00:00:00+00:00".into(),
                run_id: "test".into(),
                a2a: AlignmentMeta {
                    engine: "greedy".into(),
                    global_similarity: 1.0,
                    min_edge_weight: 0.0,
                },
                module_diff: ModuleDiffMeta {
                    min_file_delta: 1,
                    top_k_files: 8,
                    min_jaccard_to_accept: 0.0,
                },
                inputs: InputPaths::default(),
                semantics: SemanticsMeta::default(),
                denoise: None,
            },
            quality: QualitySection::default(),
            entities: EntitySection::default(),
            changes: vec![ChangeEvent::new(
                ids.next_id(),
                ChangeType::ModuleAdded,
                0.95,
                "Module added: net#1 (name=net, files=3).".into(),
                ChangeDetail::ModuleLifecycle {
                    module_uid: "net#1".into(),
                    module_name: "net".into(),
                    file_count: 3,
                    architecture_significance: None,
                },
                vec![],
            )],
        };
        let slim = slim_ir(&ir).expect("slim");
        let v = serde_json::to_value(&slim).expect("to_value");
        assert_eq!(v["changes"][0]["id"], "CHG-0001");
        assert_eq!(v["changes"][0]["type"], "module_added");
        assert!(v["changes"][0].get("detail").is_none());
        assert!(v["changes"][0].get("confidence").is_none());
        assert_eq!(v["meta"]["repo"], "libuv");
    }
}
