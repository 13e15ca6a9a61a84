use thiserror::Error;

/// Failure to obtain a credential from any secure-storage source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("No Claude credential found in the keychain. Run `claude` to log in.")]
    NoCredential,
}

/// Outcome classes of a usage fetch.
///
/// `CredentialExpired` is kept apart from the rest because callers present it
/// as "inactive, re-authenticate" rather than as a failure.
#[derive(Error, Debug)]
pub enum UsageError {
    #[error("No Claude credential found in the keychain")]
    NoCredential,
    #[error("Session expired. Run `claude` to re-authenticate")]
    CredentialExpired,
    #[error("Invalid response from API (HTTP {status})")]
    InvalidResponse { status: u16 },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Decoding error: {0}")]
    Decoding(#[from] serde_json::Error),
}

impl UsageError {
    pub fn is_credential_expired(&self) -> bool {
        matches!(self, Self::CredentialExpired)
    }

    /// Short machine-readable class name, used in logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoCredential => "no_credential",
            Self::CredentialExpired => "credential_expired",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Network(_) => "network_error",
            Self::Decoding(_) => "decoding_error",
        }
    }
}

impl From<CredentialError> for UsageError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NoCredential => Self::NoCredential,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_error_maps_to_no_credential() {
        let err: UsageError = CredentialError::NoCredential.into();
        assert!(matches!(err, UsageError::NoCredential));
        assert_eq!(err.kind(), "no_credential");
    }

    #[test]
    fn only_expired_is_flagged_as_expired() {
        assert!(UsageError::CredentialExpired.is_credential_expired());
        assert!(!UsageError::NoCredential.is_credential_expired());
        assert!(!UsageError::InvalidResponse { status: 500 }.is_credential_expired());
        assert!(!UsageError::Network("refused".into()).is_credential_expired());
    }

    #[test]
    fn invalid_response_message_includes_status() {
        let err = UsageError::InvalidResponse { status: 503 };
        assert!(err.to_string().contains("503"));
    }
}
