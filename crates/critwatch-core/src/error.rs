use thiserror::Error;

#[derive(Debug, Error)]
pub enum CritwatchError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid tracked project '{label}': {reason}")]
    InvalidProject { label: String, reason: String },

    #[error("board list not found: {0}")]
    ListNotFound(String),

    #[error("{service} returned HTTP {status} for {url}")]
    Api {
        service: &'static str,
        status: u16,
        url: String,
    },

    #[error("mail error: {0}")]
    Mail(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CritwatchError>;
