#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("config ({field}): {detail}")]
    InvalidConfig { field: &'static str, detail: String },
}
