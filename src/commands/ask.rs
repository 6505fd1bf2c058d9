use std::process::ExitCode;

use anyhow::Result;
use serde_json::json;
use tracing::info;

use super::short_id;
use crate::error::PipelineError;
use crate::pipeline::PipelineResponse;
use crate::state::AppState;

const NO_RELEVANT_MESSAGE: &str = "No relevant documents found.";

/// Ask a question about the loaded documents.
///
/// Pipeline errors are reported here, once, and turned into a failing exit code.
/// "No relevant documents" is an answer, not a failure.
pub async fn ask(state: &AppState, question: &str, as_json: bool) -> Result<ExitCode> {
    info!(question, documents = state.corpus.len(), "Query started");

    let result = state.pipeline.run(question, state.corpus.documents()).await;

    match (&result, as_json) {
        (Ok(response), false) => println!("{}", render_text(response)),
        (Ok(response), true) => println!("{}", serde_json::to_string_pretty(&render_json(response))?),
        (Err(PipelineError::NoRelevantDocuments { .. }), false) => println!("{}", NO_RELEVANT_MESSAGE),
        (Err(e), false) => eprintln!("{}", render_error_text(e)),
        (Err(e), true) => println!("{}", serde_json::to_string_pretty(&render_json_error(question, e))?),
    }

    if is_failure(&result) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn is_failure(result: &Result<PipelineResponse, PipelineError>) -> bool {
    !matches!(result, Ok(_) | Err(PipelineError::NoRelevantDocuments { .. }))
}

fn render_text(response: &PipelineResponse) -> String {
    let answer = &response.answer;
    let mut full = format!(
        "**Q:** {}\n**A:** {}\n\n{} of {} answer(s) agree | {} relevant of {} document(s)",
        response.question,
        answer.text,
        answer.vote_count,
        answer.total_candidates,
        response.relevant,
        response.considered
    );
    if answer.contested {
        full.push_str("\n(tied vote: kept the answer from the earliest document)");
    }
    if !response.failures.is_empty() {
        full.push_str(&format!("\n\n**Skipped {} document(s):**\n", response.failures.len()));
        for failure in &response.failures {
            full.push_str(&format!(
                "- `{}`: {}\n",
                short_id(&failure.document_id),
                failure.error
            ));
        }
    }
    full
}

fn render_error_text(err: &PipelineError) -> String {
    let mut full = format!("Error: {}", err);
    for failure in err.failures() {
        full.push_str(&format!("\n- `{}`: {}", short_id(&failure.document_id), failure.error));
    }
    full
}

fn render_json(response: &PipelineResponse) -> serde_json::Value {
    json!({
        "question": response.question,
        "answer": response.answer.text,
        "vote_count": response.answer.vote_count,
        "contested": response.answer.contested,
        "supporting_documents": response.answer.supporting_documents,
        "candidates": response.candidates,
        "failures": response.failures,
    })
}

fn render_json_error(question: &str, err: &PipelineError) -> serde_json::Value {
    let error = match err {
        PipelineError::NoRelevantDocuments { .. } => NO_RELEVANT_MESSAGE.to_string(),
        other => format!("Error occurred: {}", other),
    };
    let mut body = json!({ "question": question, "error": error });
    if !err.failures().is_empty() {
        body["failures"] = json!(err.failures());
    }
    body
}
