use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pipeline::capability::{
    Embedder, ExtractedAnswer, QuestionAnswerer, SummaryOptions, Summarizer,
};
use crate::pipeline::prompts;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Sampling settings for one chat completion.
#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// OpenAI-compatible client backing the embed, summarize and answer capabilities.
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    summary_model: String,
    qa_model: String,
    embed_model: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn from_env() -> Result<Self> {
        let base_url = dotenv::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:1234/v1".to_string());
        let model =
            dotenv::var("LLM_MODEL").unwrap_or_else(|_| "qwen/qwen3-8b".to_string());
        let summary_model =
            dotenv::var("LLM_SUMMARY_MODEL").unwrap_or_else(|_| model.clone());
        let qa_model = dotenv::var("LLM_QA_MODEL").unwrap_or_else(|_| model.clone());
        let embed_model = dotenv::var("LLM_EMBED_MODEL")
            .unwrap_or_else(|_| "text-embedding-nomic-embed-text-v1.5".to_string());
        let api_key = dotenv::var("LLM_API_KEY").ok().filter(|k| !k.is_empty());
        let timeout_secs = match dotenv::var("LLM_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .context("LLM_TIMEOUT_SECS must be a whole number of seconds")?,
            Err(_) => 120,
        };
        anyhow::ensure!(timeout_secs > 0, "LLM_TIMEOUT_SECS must be positive");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            summary_model,
            qa_model,
            embed_model,
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve an API route (`chat/completions`, `embeddings`) from the base URL.
    fn endpoint(&self, route: &str) -> String {
        resolve_endpoint(&self.base_url, route)
    }

    async fn post_json(&self, route: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let mut req = self.client.post(self.endpoint(route)).json(body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.send().await.context("LLM request failed")?;
        let status = resp.status();
        let text = resp.text().await.context("Failed to read LLM response")?;
        anyhow::ensure!(
            status.is_success(),
            "LLM server returned {}: {}",
            status,
            text.chars().take(300).collect::<String>()
        );
        serde_json::from_str(&text).context("Failed to parse LLM JSON")
    }

    /// Non-streaming chat completion.
    pub async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        options: ChatOptions,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });
        let json = self.post_json("chat/completions", &body).await?;

        // Extract content from choices[0].message.content (handle null)
        let content = json["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .unwrap_or("")
            .to_string();

        Ok(content)
    }
}

#[async_trait]
impl Embedder for LlmClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.embed_model,
            "input": text,
        });
        let json = self.post_json("embeddings", &body).await?;
        parse_embedding(&json)
    }
}

#[async_trait]
impl Summarizer for LlmClient {
    async fn summarize(&self, text: &str, options: &SummaryOptions) -> Result<String> {
        let messages = vec![
            Message::system(prompts::SUMMARY_SYSTEM_PROMPT),
            Message::user(prompts::summary_request(text, options)),
        ];
        let chat_options = ChatOptions {
            temperature: if options.sample { 0.7 } else { 0.0 },
            // Words to tokens, with headroom for the model's own formatting.
            max_tokens: (options.max_length as u32).saturating_mul(2).max(64),
        };
        let raw = self.chat(&messages, &self.summary_model, chat_options).await?;
        let summary = clamp_words(&strip_reasoning(&raw), options.max_length);
        debug!(
            input_words = text.split_whitespace().count(),
            summary_words = summary.split_whitespace().count(),
            "chunk summarized"
        );
        Ok(summary)
    }
}

#[async_trait]
impl QuestionAnswerer for LlmClient {
    async fn answer(&self, question: &str, context: &str) -> Result<ExtractedAnswer> {
        let messages = vec![
            Message::system(prompts::ANSWER_SYSTEM_PROMPT),
            Message::user(prompts::answer_request(question, context)),
        ];
        let chat_options = ChatOptions {
            temperature: 0.0,
            max_tokens: 256,
        };
        let raw = self.chat(&messages, &self.qa_model, chat_options).await?;
        Ok(parse_answer(&strip_reasoning(&raw)))
    }
}

fn resolve_endpoint(base_url: &str, route: &str) -> String {
    let base = base_url.trim_end_matches('/');
    for known in ["/chat/completions", "/embeddings"] {
        if let Some(root) = base.strip_suffix(known) {
            return format!("{}/{}", root, route);
        }
    }
    if base.ends_with("/v1") {
        format!("{}/{}", base, route)
    } else {
        format!("{}/v1/{}", base, route)
    }
}

fn parse_embedding(json: &serde_json::Value) -> Result<Vec<f32>> {
    let values = json["data"]
        .get(0)
        .and_then(|d| d["embedding"].as_array())
        .context("Embedding response missing data[0].embedding")?;
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .context("Embedding contains a non-numeric value")
        })
        .collect()
}

/// Drop `<think>...</think>` blocks some local models emit before the answer.
fn strip_reasoning(raw: &str) -> String {
    let mut out = raw.to_string();
    while let Some(start) = out.find("<think>") {
        let end = out[start..].find("</think>");
        match end {
            Some(rel_end) => out.replace_range(start..start + rel_end + "</think>".len(), ""),
            None => out.truncate(start),
        }
    }
    out.trim().to_string()
}

fn clamp_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Deserialize)]
struct AnswerReply {
    answer: String,
    #[serde(default)]
    confidence: f32,
}

/// Parse the QA model's JSON reply, tolerating code fences and plain-text replies.
fn parse_answer(raw: &str) -> ExtractedAnswer {
    let trimmed = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    match serde_json::from_str::<AnswerReply>(trimmed) {
        Ok(reply) => ExtractedAnswer {
            text: reply.answer.trim().to_string(),
            confidence: reply.confidence.clamp(0.0, 1.0),
            span: None,
        },
        Err(_) => ExtractedAnswer {
            text: trimmed.to_string(),
            confidence: 0.0,
            span: None,
        },
    }
}
