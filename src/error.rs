use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{path} not found. Run the {stage} stage first.")]
    MissingInput { path: String, stage: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
