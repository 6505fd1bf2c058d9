use super::capability::SummaryOptions;

pub const SUMMARY_SYSTEM_PROMPT: &str = r#"You summarize excerpts of chat conversations.

Rules:
- Write plain prose. No headings, bullet points, or preamble such as "Here is a summary".
- Keep names, numbers, dates, and technical terms exactly as they appear.
- Only state what the excerpt says. Do not add outside knowledge or opinions.
- Stay within the requested length."#;

pub const ANSWER_SYSTEM_PROMPT: &str = r#"You are an extractive question answering model.

Given a question and a context passage, copy the shortest span of the context that answers the question.
- The answer MUST be copied verbatim from the context. Never paraphrase.
- If the context does not answer the question, use an empty string.
- Reply with a single JSON object and nothing else:
{"answer": "<span copied from the context>", "confidence": <number between 0 and 1>}"#;

pub fn summary_request(text: &str, options: &SummaryOptions) -> String {
    format!(
        "Summarize the following excerpt in {} to {} words.\n\nExcerpt:\n{}",
        options.min_length, options.max_length, text
    )
}

pub fn answer_request(question: &str, context: &str) -> String {
    format!("Question: {}\n\nContext:\n{}", question, context)
}
