/// An error type for the evaluation crate.
#[derive(thiserror::Error, Debug)]
pub enum EvalError {
    /// Predictions and targets do not describe the same number of images.
    #[error("Got {predictions} predictions but {targets} targets")]
    MismatchedBatch {
        /// Number of prediction records.
        predictions: usize,
        /// Number of target records.
        targets: usize,
    },

    /// A prediction or target record has inconsistent field lengths.
    #[error("Invalid record {index}: {reason}")]
    InvalidRecord {
        /// Position of the record in its batch.
        index: usize,
        /// What is wrong with the record.
        reason: String,
    },

    /// A single record has inconsistent field lengths.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// The evaluator configuration is unusable.
    #[error("Invalid evaluation config: {0}")]
    InvalidConfig(String),

    /// Error reading or writing an evaluation file.
    #[error("error accessing evaluation file")]
    Io(#[from] std::io::Error),

    /// Error decoding or encoding an evaluation file.
    #[error("error decoding evaluation file")]
    Json(#[from] serde_json::Error),
}
