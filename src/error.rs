//! Error types for the chat client.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while configuring the client or running a chat turn.
#[derive(Debug, Error)]
pub enum ChatError {
    /// No API key in the environment or the config file.
    #[error("Missing API key. Set {env_var} in your environment or add `api_key` to the config file.")]
    MissingApiKey { env_var: String },

    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with an error status or an error chunk.
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    /// The selected model was retired upstream.
    #[error("Model `{model}` has been decommissioned")]
    ModelDecommissioned { model: String },

    /// The response stream could not be decoded.
    #[error("Malformed response stream: {0}")]
    StreamFormat(String),

    /// Attachment is not a PNG or JPEG image.
    #[error("Unsupported image type `{0}` (expected png, jpg or jpeg)")]
    UnsupportedImage(String),

    /// Attachment could not be read.
    #[error("Failed to read attachment {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ChatError {
    /// Whether the error must stop the program instead of being shown inline.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChatError::MissingApiKey { .. })
    }

    /// Targeted advice shown next to the error message, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ChatError::ModelDecommissioned { .. } => Some(
                "The selected model is outdated. Please switch to llama-3.3-70b-versatile.",
            ),
            ChatError::Api { status: 401, .. } => Some("Check that your API key is valid."),
            _ => None,
        }
    }

    /// Build an error from a non-success HTTP body.
    ///
    /// OpenAI-compatible APIs wrap failures as `{"error": {"message", "code"}}`;
    /// bodies that don't parse are kept verbatim.
    pub fn from_api_body(status: u16, model: &str, body: &str) -> Self {
        let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
        let error = parsed.as_ref().and_then(|v| v.get("error"));

        let code = error
            .and_then(|e| e.get("code"))
            .and_then(|c| c.as_str())
            .unwrap_or_default();
        if code == "model_decommissioned" || body.contains("model_decommissioned") {
            return ChatError::ModelDecommissioned {
                model: model.to_string(),
            };
        }

        let message = error
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.trim().to_string());

        ChatError::Api { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decommissioned_code_is_detected() {
        let body = r#"{"error":{"message":"The model `mixtral-8x7b-32768` has been decommissioned","type":"invalid_request_error","code":"model_decommissioned"}}"#;
        let err = ChatError::from_api_body(400, "mixtral-8x7b-32768", body);
        assert!(matches!(err, ChatError::ModelDecommissioned { ref model } if model == "mixtral-8x7b-32768"));
        assert!(err.hint().is_some());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_api_message_is_extracted() {
        let body = r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        let err = ChatError::from_api_body(401, "llama-3.3-70b-versatile", body);
        match &err {
            ChatError::Api { status, message } => {
                let status = *status;
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid API Key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.hint(), Some("Check that your API key is valid."));
    }

    #[test]
    fn test_plain_body_is_kept() {
        let err = ChatError::from_api_body(502, "m", "  Bad Gateway \n");
        assert_eq!(err.to_string(), "Bad Gateway (HTTP 502)");
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let err = ChatError::MissingApiKey {
            env_var: "GROQ_API_KEY".to_string(),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }
}
