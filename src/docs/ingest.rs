use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::{debug, info};

use super::types::Document;

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// On-disk shapes written by the chat-history exporter.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExportFile {
    Chat(ChatExport),
    Plain(Vec<PlainRecord>),
}

#[derive(Debug, Deserialize)]
struct ChatExport {
    #[serde(default)]
    name: Option<String>,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    text: MessageText,
}

#[derive(Debug, Deserialize)]
struct PlainRecord {
    #[serde(default)]
    id: Option<serde_json::Value>,
    content: String,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

/// Message bodies are either a plain string or a list of rich-text segments.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageText {
    Plain(String),
    Rich(Vec<TextSegment>),
}

impl Default for MessageText {
    fn default() -> Self {
        MessageText::Plain(String::new())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextSegment {
    Plain(String),
    Entity {
        #[serde(default)]
        text: String,
    },
}

impl MessageText {
    fn flatten(&self) -> String {
        match self {
            MessageText::Plain(s) => s.clone(),
            MessageText::Rich(segments) => segments
                .iter()
                .map(|seg| match seg {
                    TextSegment::Plain(s) => s.as_str(),
                    TextSegment::Entity { text } => text.as_str(),
                })
                .collect(),
        }
    }
}

fn parse_date(raw: Option<&str>) -> Option<NaiveDateTime> {
    raw.and_then(|d| NaiveDateTime::parse_from_str(d, DATE_FORMAT).ok())
}

fn source_id(raw: Option<&serde_json::Value>) -> Option<String> {
    match raw? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Hands out document ids: the export's own id, or `#position` when it has none.
/// Repeated export ids get the position appended.
#[derive(Default)]
struct IdAllocator {
    seen: HashSet<String>,
}

impl IdAllocator {
    fn allocate(&mut self, raw: Option<&serde_json::Value>, position: usize) -> String {
        let id = match source_id(raw) {
            Some(id) if !self.seen.contains(&id) => id,
            Some(id) => format!("{}#{}", id, position),
            None => format!("#{}", position),
        };
        self.seen.insert(id.clone());
        id
    }
}

fn build_document(id: String, text: &str, from: Option<&str>, date: Option<&str>) -> Document {
    let from = from.map(str::trim).filter(|f| !f.is_empty());
    let content = match from {
        Some(author) => format!("{}: {}", author, text),
        None => text.to_string(),
    };
    let mut doc = Document::new(content).with_id(id);
    if let Some(author) = from {
        doc = doc.with_author(author);
    }
    if let Some(sent_at) = parse_date(date) {
        doc = doc.with_sent_at(sent_at);
    }
    doc
}

/// Parse an export already read into memory.
pub fn parse_export(raw: &str) -> Result<Vec<Document>> {
    let export: ExportFile =
        serde_json::from_str(raw).context("Unrecognized chat export format")?;

    let mut ids = IdAllocator::default();
    let docs: Vec<Document> = match export {
        ExportFile::Chat(chat) => {
            debug!(
                name = chat.name.as_deref().unwrap_or("unnamed"),
                messages = chat.messages.len(),
                "Parsing chat export"
            );
            chat.messages
                .iter()
                .enumerate()
                .filter(|(_, m)| m.kind.as_deref().map_or(true, |k| k == "message"))
                .filter_map(|(position, m)| {
                    let text = m.text.flatten();
                    if text.trim().is_empty() {
                        return None;
                    }
                    let id = ids.allocate(m.id.as_ref(), position);
                    Some(build_document(id, &text, m.from.as_deref(), m.date.as_deref()))
                })
                .collect()
        }
        ExportFile::Plain(records) => records
            .iter()
            .enumerate()
            .filter_map(|(position, r)| {
                if r.content.trim().is_empty() {
                    return None;
                }
                let id = ids.allocate(r.id.as_ref(), position);
                Some(build_document(id, &r.content, r.from.as_deref(), r.date.as_deref()))
            })
            .collect(),
    };

    Ok(docs)
}

/// Load documents from a chat export JSON file.
pub async fn load_export(path: &Path) -> Result<Vec<Document>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read chat export {}", path.display()))?;
    let docs = parse_export(&raw)?;
    info!(path = %path.display(), count = docs.len(), "Chat export loaded");
    Ok(docs)
}
