use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("File does not exist: {0}")]
    NotFound(String),

    #[error("Unsupported media: {0}")]
    Unsupported(String),

    #[error("Decode failure: {0}")]
    Decode(String),

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns `true` when the error means the requested file is missing or
    /// cannot be opened at all.
    pub fn is_not_found(&self) -> bool {
        match self {
            BridgeError::NotFound(_) => true,
            BridgeError::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_covers_io_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(BridgeError::from(io).is_not_found());
        assert!(BridgeError::NotFound("a.m4a".into()).is_not_found());
        assert!(!BridgeError::Decode("bad packet".into()).is_not_found());
    }
}
