//! Error types for nmm

use thiserror::Error;

/// nmm error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Array archive (npz) read/write error
    #[error("NPZ error: {0}")]
    Npz(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        let e = Error::Validation("p1 must be in [0, 1]".to_string());
        assert_eq!(e.to_string(), "Validation error: p1 must be in [0, 1]");
        let e = Error::Computation("negative variance".to_string());
        assert!(e.to_string().starts_with("Computation error"));
    }

    #[test]
    fn test_io_conversion() {
        fn open_missing() -> Result<std::fs::File> {
            Ok(std::fs::File::open("/definitely/not/a/real/path.npz")?)
        }
        assert!(matches!(open_missing(), Err(Error::Io(_))));
    }
}
