use anyhow::Result;

use super::short_id;
use crate::docs::Corpus;
use crate::state::AppState;

/// List loaded documents, newest first, grouped by author.
pub fn sources(state: &AppState, limit: usize) -> Result<()> {
    println!("{}", render_sources(&state.corpus, limit));
    Ok(())
}

fn render_sources(corpus: &Corpus, limit: usize) -> String {
    if corpus.is_empty() {
        return "No documents loaded. Check the --data path.".to_string();
    }

    let mut output = format!("**Loaded Documents** ({} total)\n\n", corpus.len());
    for (author, docs) in corpus.by_author(limit) {
        output.push_str(&format!("**From: {}**\n", author));
        for doc in docs {
            let sent = doc
                .sent_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "undated".to_string());
            output.push_str(&format!(
                "  - {} ({} words) — `{}`\n    {}\n",
                sent,
                doc.word_count(),
                short_id(&doc.id),
                preview(&doc.normalized, 80)
            ));
        }
        output.push('\n');
    }
    output
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}
