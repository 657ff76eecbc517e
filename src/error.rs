use std::io;

use thiserror::Error;

use crate::post_parser::ParseError;

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("{0}")]
    Validation(String),

    #[error("no such post exists: {0}")]
    NotFound(String),

    #[error("failed to parse file: {0}")]
    Metadata(#[from] ParseError),

    #[error("storage failure: {0}")]
    Storage(#[from] io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BlogError {
    /// HTTP status used when the error reaches a client.
    pub fn status_code(&self) -> u16 {
        match self {
            BlogError::Validation(_) => 400,
            BlogError::NotFound(_) => 404,
            BlogError::Metadata(_) => 400,
            BlogError::Storage(_) => 500,
            BlogError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(BlogError::Validation("bad slug".to_string()).status_code(), 400);
        assert_eq!(BlogError::NotFound("x".to_string()).status_code(), 404);
        assert_eq!(BlogError::Metadata(ParseError::InvalidDate("2023-13-1".to_string())).status_code(), 400);
        assert_eq!(BlogError::Storage(io::Error::new(io::ErrorKind::Other, "disk")).status_code(), 500);
        assert_eq!(BlogError::Internal("sitemap".to_string()).status_code(), 500);
    }

    #[test]
    fn test_messages() {
        let err = BlogError::Metadata(ParseError::InvalidDate("value should be a string".to_string()));
        assert_eq!(err.to_string(), "failed to parse file: invalid date: value should be a string");

        let err = BlogError::Internal("failed to encode index: eof".to_string());
        assert_eq!(err.to_string(), "internal error: failed to encode index: eof");
    }
}
