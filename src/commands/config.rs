use anyhow::Result;

use crate::state::{AppState, PipelineConfig};

/// Show the effective pipeline configuration.
pub fn config(state: &AppState) -> Result<()> {
    println!("{}", render_config(&state.config));
    Ok(())
}

fn render_config(config: &PipelineConfig) -> String {
    format!(
        "**Pipeline Configuration:**\n\
         `similarity_threshold`: {}\n\
         `chunk_size`: {}\n\
         `summary_max_length`: {}\n\
         `summary_min_length`: {}\n\
         `max_concurrency`: {}\n\
         `task_timeout`: {}s\n\
         `cache_embeddings`: {}\n\
         `strip_stop_words`: {}\n\
         `exclusive_capabilities`: {}",
        config.similarity_threshold,
        config.chunk_size,
        config.summary_max_length,
        config.summary_min_length,
        config.max_concurrency,
        config.task_timeout.as_secs(),
        config.cache_embeddings,
        config.strip_stop_words,
        config.exclusive_capabilities
    )
}
