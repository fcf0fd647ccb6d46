use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum FormularyError {
    #[error("Drug not found: {0}")]
    DrugNotFound(Uuid),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway error ({status}): {message}")]
    Gateway { status: u16, message: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Config error: {0}")]
    Config(String),

    /// A failure already rendered for display, such as a failed write outcome.
    #[error("{0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, FormularyError>;
