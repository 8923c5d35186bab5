use thiserror::Error;

/// HTTP status the Messages API uses for "overloaded, try again".
pub const OVERLOADED_STATUS: u16 = 529;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider still overloaded after {attempts} attempts")]
    Overloaded { attempts: u32 },

    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response body: {0}")]
    InvalidBody(String),

    #[error("No scripted reply left after {0} requests")]
    Exhausted(usize),
}

impl ProviderError {
    pub fn is_overloaded(&self) -> bool {
        matches!(self, ProviderError::Status { status, .. } if *status == OVERLOADED_STATUS)
    }

    /// Overload and transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        self.is_overloaded() || matches!(self, ProviderError::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overloaded_status_is_retryable() {
        let err = ProviderError::Status {
            status: 529,
            body: "overloaded".into(),
        };
        assert!(err.is_overloaded());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        for status in [400, 401, 404, 500] {
            let err = ProviderError::Status {
                status,
                body: String::new(),
            };
            assert!(!err.is_retryable(), "status {status} should not retry");
        }
        assert!(!ProviderError::InvalidBody("x".into()).is_retryable());
    }
}
