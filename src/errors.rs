use serde::Serialize;

/// All application errors, categorized by domain.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ── Configuration ──
    #[error("Unknown logic kind: {0} (expected crossover, threshold or custom)")]
    UnknownLogicKind(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input ──
    #[error("Input is not valid UTF-8 text: {0}")]
    InvalidInput(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read file: {0}")]
    FileRead(String),

    #[error("Failed to write file: {0}")]
    FileWrite(String),

    // ── Serialization ──
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ── General ──
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Serializable error response for UI shells.
#[derive(Debug, Serialize, Clone)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        let code = match err {
            AppError::UnknownLogicKind(_) => "UNKNOWN_LOGIC_KIND",
            AppError::MissingField(_) => "MISSING_FIELD",
            AppError::InvalidConfig(_) => "INVALID_CONFIG",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::FileNotFound(_) => "FILE_NOT_FOUND",
            AppError::FileRead(_) => "FILE_READ",
            AppError::FileWrite(_) => "FILE_WRITE",
            AppError::Serialization(_) => "SERIALIZATION",
            AppError::Internal(_) => "INTERNAL",
        };
        ErrorResponse {
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

// Allow AppError to be handed to a UI shell as JSON.
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let response = ErrorResponse::from(self);
        response.serialize(serializer)
    }
}

// ── Conversions from external errors ──

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileRead(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_codes() {
        let err = AppError::UnknownLogicKind("momentum".into());
        let resp = ErrorResponse::from(&err);
        assert_eq!(resp.code, "UNKNOWN_LOGIC_KIND");
        assert!(resp.message.contains("momentum"));
    }

    #[test]
    fn test_serializes_as_error_response() {
        let err = AppError::MissingField("logicConfig.kind".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "MISSING_FIELD");
        assert_eq!(json["message"], "Missing required field: logicConfig.kind");
    }
}
