use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("gzip: {0}")]
    Gzip(#[source] std::io::Error),

    #[error("input line {line}: {source}")]
    InvalidLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("framing: {0}")]
    Framing(#[from] crate::framing::FramingError),

    #[error("chunking: {0}")]
    Chunk(#[from] reassembly::HeaderError),

    #[error("checkpoint: {0}")]
    Checkpoint(#[from] stream_api::StreamError),

    #[error("{0}")]
    Pipeline(#[from] pipeline::PipelineError),
}

impl AppError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
