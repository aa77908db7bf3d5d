use std::fmt;

/// Errors raised while reading or writing on-disk identity material.
#[derive(thiserror::Error, Debug)]
pub enum IdentityError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed identity file: {0}")]
    Malformed(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IdentityError {
    pub fn malformed(msg: impl fmt::Display) -> Self {
        Self::Malformed(msg.to_string())
    }
}
