//! Error types for discovery operations.
//!
//! [`XdsError`] is the single error type crossing the engine boundary. Every
//! variant carries a fixed [`kind`](XdsError::kind) tag that is safe to put in
//! a response payload, and maps onto both an HTTP status and a gRPC status so
//! any transport can carry the outcome.

use http::StatusCode;

/// Generic detail returned for render failures outside debug mode.
const RENDER_FAILED: &str = "failed to render configuration";

/// Comprehensive error type for discovery operations.
///
/// Configuration errors are fatal and surface at startup. Everything else is
/// a per-request failure that the engine converts into a protocol outcome.
///
/// # Example
///
/// ```rust
/// use xds_core::{AuthError, XdsError};
///
/// let err: XdsError = AuthError::InvalidCredential.into();
/// assert_eq!(err.kind(), "invalid_credential");
/// assert_eq!(err.status_code().as_u16(), 401);
/// ```
#[derive(Debug, thiserror::Error)]
pub enum XdsError {
    /// The system cannot serve correctly with its current configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Credential verification failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Template output failed structural validation.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The request itself is malformed.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// Why the request was rejected.
        reason: String,
    },

    /// No template band serves the requested resource type.
    #[error("unknown resource type: {resource_type}")]
    UnknownResourceType {
        /// The selector the client asked for.
        resource_type: String,
    },

    /// A source backend failed to produce instance records.
    #[error("source error: {message}")]
    SourceError {
        /// Description of the failure.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Unexpected internal error.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl XdsError {
    /// Create an internal error from any error type.
    pub fn internal<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a source error from any error type.
    pub fn source_failure<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::SourceError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Fixed tag identifying the error class in response payloads.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            XdsError::Configuration(_) => "configuration_error",
            XdsError::Auth(err) => err.kind(),
            XdsError::Render(_) => "render_error",
            XdsError::InvalidRequest { .. } => "bad_request",
            XdsError::UnknownResourceType { .. } => "unknown_resource_type",
            XdsError::SourceError { .. } => "source_error",
            XdsError::Internal { .. } => "internal_error",
        }
    }

    /// HTTP status this error maps to.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            XdsError::Auth(AuthError::MalformedCredential { .. }) => StatusCode::BAD_REQUEST,
            XdsError::Auth(_) => StatusCode::UNAUTHORIZED,
            XdsError::InvalidRequest { .. } | XdsError::UnknownResourceType { .. } => {
                StatusCode::BAD_REQUEST
            }
            XdsError::Render(_)
            | XdsError::Configuration(_)
            | XdsError::SourceError { .. }
            | XdsError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error prevents the system from serving at all.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, XdsError::Configuration(_))
    }

    /// Message that may be shown to the caller.
    ///
    /// Client errors always carry their own message. Server-side failures
    /// only expose their detail when `debug` is set.
    #[must_use]
    pub fn public_detail(&self, debug: bool) -> String {
        match self {
            XdsError::Auth(_)
            | XdsError::InvalidRequest { .. }
            | XdsError::UnknownResourceType { .. } => self.to_string(),
            XdsError::Render(_) if !debug => RENDER_FAILED.to_string(),
            XdsError::Configuration(_) | XdsError::SourceError { .. } | XdsError::Internal { .. }
                if !debug =>
            {
                "internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Per-request credential failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The request carries no credential field.
    #[error("discovery request from {node_id} is missing auth field")]
    MissingCredential {
        /// Identity of the requesting node.
        node_id: String,
    },

    /// The credential could not be decrypted or matches no accepted secret.
    #[error("the authentication provided was invalid")]
    InvalidCredential,

    /// The credential is structurally broken.
    #[error("the authentication provided was malformed [reason: {reason}]")]
    MalformedCredential {
        /// Reason reported by the decryption layer.
        reason: String,
    },
}

impl AuthError {
    /// Fixed tag identifying the failure.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingCredential { .. } => "missing_credential",
            AuthError::InvalidCredential => "invalid_credential",
            AuthError::MalformedCredential { .. } => "malformed_credential",
        }
    }
}

/// Template output failed to parse or validate as structured configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The rendered document is not valid YAML/JSON.
    #[error("{}", parse_message(message, *line, *column))]
    Parse {
        /// Parser message.
        message: String,
        /// 1-based line of the failure, when known.
        line: Option<usize>,
        /// 1-based column of the failure, when known.
        column: Option<usize>,
    },

    /// The document parsed but does not have the expected shape.
    #[error("invalid rendered document: {reason}")]
    InvalidDocument {
        /// What was wrong with the document.
        reason: String,
    },

    /// The renderer itself failed.
    #[error("renderer failed: {message}")]
    Renderer {
        /// Renderer-supplied message.
        message: String,
    },
}

impl RenderError {
    /// Create a renderer failure.
    pub fn renderer(message: impl Into<String>) -> Self {
        Self::Renderer {
            message: message.into(),
        }
    }

    /// Create an invalid document error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            reason: reason.into(),
        }
    }
}

fn parse_message(message: &str, line: Option<usize>, column: Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => {
            format!("parse error at line {line} column {column}: {message}")
        }
        (Some(line), None) => format!("parse error at line {line}: {message}"),
        _ => format!("parse error: {message}"),
    }
}

/// Convert to tonic::Status for gRPC responses.
impl From<XdsError> for tonic::Status {
    fn from(err: XdsError) -> Self {
        let message = err.public_detail(false);
        match &err {
            XdsError::Auth(AuthError::MalformedCredential { .. })
            | XdsError::InvalidRequest { .. }
            | XdsError::UnknownResourceType { .. } => tonic::Status::invalid_argument(message),
            XdsError::Auth(_) => tonic::Status::unauthenticated(message),
            XdsError::SourceError { .. } => tonic::Status::unavailable(message),
            XdsError::Render(_) | XdsError::Configuration(_) | XdsError::Internal { .. } => {
                tonic::Status::internal(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_unauthorized_or_bad_request() {
        let missing: XdsError = AuthError::MissingCredential {
            node_id: "envoy-1".into(),
        }
        .into();
        assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);
        assert!(missing.to_string().contains("envoy-1"));

        let invalid: XdsError = AuthError::InvalidCredential.into();
        assert_eq!(invalid.status_code(), StatusCode::UNAUTHORIZED);

        let malformed: XdsError = AuthError::MalformedCredential {
            reason: "bad base64".into(),
        }
        .into();
        assert_eq!(malformed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(malformed.kind(), "malformed_credential");
        assert!(malformed.to_string().contains("bad base64"));
    }

    #[test]
    fn render_detail_hidden_outside_debug() {
        let err: XdsError = RenderError::Parse {
            message: "did not find expected key".into(),
            line: Some(3),
            column: Some(7),
        }
        .into();

        assert_eq!(err.public_detail(false), RENDER_FAILED);
        let detail = err.public_detail(true);
        assert!(detail.contains("line 3 column 7"));
        assert_eq!(err.kind(), "render_error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_to_status() {
        let status: tonic::Status = XdsError::invalid_request("bad build_version").into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: tonic::Status = XdsError::from(AuthError::InvalidCredential).into();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);

        let status: tonic::Status = XdsError::from(RenderError::renderer("boom")).into();
        assert_eq!(status.code(), tonic::Code::Internal);
        assert!(!status.message().contains("boom"));
    }

    #[test]
    fn source_error_is_unavailable() {
        let err = XdsError::SourceError {
            message: "registry unreachable".into(),
            source: Some(Box::new(std::io::Error::other("connection refused"))),
        };
        assert_eq!(err.kind(), "source_error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(std::error::Error::source(&err).is_some());

        let status: tonic::Status = err.into();
        assert_eq!(status.code(), tonic::Code::Unavailable);
    }

    #[test]
    fn internal_error_helper() {
        let io_err = std::io::Error::other("disk on fire");
        let err = XdsError::internal("operation failed", io_err);
        assert!(matches!(err, XdsError::Internal { .. }));
        assert_eq!(err.public_detail(false), "internal server error");
        assert!(!err.is_fatal());
        assert!(XdsError::Configuration("no default band".into()).is_fatal());
    }
}
