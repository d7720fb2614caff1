use thiserror::Error;

/// Ошибки движка правил
#[derive(Debug, Error)]
pub enum AclError {
    /// One or more rule invariants are violated, clauses joined by "; "
    #[error("malformed rule: {0}")]
    Malformed(String),

    #[error("rule already exists: {0}")]
    AlreadyExists(String),

    #[error("rule {0} does not exist")]
    NotFound(i32),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Failure reported by the persistence collaborator
    #[error("rule store error: {0}")]
    Store(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AclError>;
