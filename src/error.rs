// Errors returned by the matrix primitives, the classifier and the data loaders

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("shape mismatch in {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    #[error("{vectors} reference vectors but {labels} labels")]
    LabelCountMismatch { vectors: usize, labels: usize },

    #[error("k must be at least 1, got {0}")]
    InvalidK(usize),

    #[error("row {row} has {got} columns, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("record {record}: {message}")]
    Parse { record: usize, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
