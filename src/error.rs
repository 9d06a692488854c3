use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Language not supported: {0}")]
    UnsupportedLanguage(String),

    #[error("Classification transport error: {0}")]
    Transport(String),

    #[error("Classification schema error: {0}")]
    Schema(String),

    #[error("Store corruption: {0}")]
    StoreCorruption(String),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
