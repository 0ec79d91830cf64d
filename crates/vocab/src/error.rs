use thiserror::Error;

#[derive(Error, Debug)]
pub enum VocabError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing special token {0} in loaded vocabulary")]
    MissingSpecial(&'static str),

    #[error("Vocabulary ids are not contiguous at id {0}")]
    NonContiguousIds(u32),
}

pub type Result<T> = std::result::Result<T, VocabError>;
