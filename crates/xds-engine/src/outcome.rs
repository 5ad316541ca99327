//! Protocol outcomes and transport-neutral replies.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use serde::Serialize;
use xds_core::{DiscoveryResponse, VersionFingerprint, XdsError};

use crate::context::RequestContext;

/// Header carrying the version the client reported.
pub const CLIENT_VERSION_HEADER: &str = "x-xds-client-version";
/// Header carrying the comma-joined requested resource names.
pub const REQUESTED_RESOURCES_HEADER: &str = "x-xds-requested-resources";
/// Header carrying the requested resource type.
pub const REQUESTED_TYPE_HEADER: &str = "x-xds-requested-type";
/// Header carrying the version the server computed.
pub const RESPONSE_VERSION_HEADER: &str = "x-xds-response-version";
/// Header carrying the correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Result of one discovery request.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryOutcome {
    /// The client already holds this version; nothing was rendered.
    Unchanged {
        /// The matching version.
        version: VersionFingerprint,
    },
    /// New configuration.
    Updated(DiscoveryResponse),
    /// The template rendered no resources.
    Empty {
        /// Version computed for the request.
        version: VersionFingerprint,
    },
}

impl DiscoveryOutcome {
    /// Metric and log label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            DiscoveryOutcome::Unchanged { .. } => "unchanged",
            DiscoveryOutcome::Updated(_) => "updated",
            DiscoveryOutcome::Empty { .. } => "empty",
        }
    }

    /// Status a request/response transport reports for this outcome.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            DiscoveryOutcome::Unchanged { .. } => StatusCode::NOT_MODIFIED,
            DiscoveryOutcome::Updated(_) => StatusCode::OK,
            DiscoveryOutcome::Empty { .. } => StatusCode::NOT_FOUND,
        }
    }

    /// Version computed for the request.
    #[must_use]
    pub fn version(&self) -> &VersionFingerprint {
        match self {
            DiscoveryOutcome::Unchanged { version } | DiscoveryOutcome::Empty { version } => {
                version
            }
            DiscoveryOutcome::Updated(response) => response.version_info(),
        }
    }
}

/// Request facts echoed back to the caller on every reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// Protocol version from the client's build version.
    pub client_version: String,
    /// Resource names the client asked for.
    pub requested_resources: Vec<String>,
    /// Requested resource type.
    pub resource_type: String,
    /// Version the server computed, absent when the request failed first.
    pub response_version: Option<String>,
    /// Correlation id.
    pub request_id: String,
}

impl ResponseMetadata {
    /// Metadata for a request that has not produced a version yet.
    pub fn for_request(ctx: &RequestContext, client_version: &str, resource_names: &[String]) -> Self {
        Self {
            client_version: client_version.to_string(),
            requested_resources: resource_names.to_vec(),
            resource_type: ctx.resource_type().to_string(),
            response_version: None,
            request_id: ctx.id().to_string(),
        }
    }

    /// Attach the computed version.
    #[must_use]
    pub fn with_response_version(mut self, version: &VersionFingerprint) -> Self {
        self.response_version = Some(version.to_string());
        self
    }

    /// Metadata as HTTP headers. Values that are not valid header text are
    /// left out.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let mut put = |name: &'static str, value: &str| {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.insert(HeaderName::from_static(name), value);
            }
        };

        put(CLIENT_VERSION_HEADER, &self.client_version);
        put(REQUESTED_RESOURCES_HEADER, &self.requested_resources.join(","));
        put(REQUESTED_TYPE_HEADER, &self.resource_type);
        if let Some(version) = &self.response_version {
            put(RESPONSE_VERSION_HEADER, version);
        }
        put(REQUEST_ID_HEADER, &self.request_id);
        headers
    }
}

/// Error payload returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Error class tag.
    pub error: &'static str,
    /// Caller-safe message.
    pub detail: String,
    /// Correlation id.
    pub request_id: String,
    /// Captured backtrace, only populated in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<Vec<String>>,
}

/// Body of a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    /// No body.
    Empty,
    /// Rendered configuration.
    Response(DiscoveryResponse),
    /// Failure description.
    Error(ErrorBody),
}

/// A complete, transport-neutral reply to a discovery request.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryReply {
    /// Status to report.
    pub status: StatusCode,
    /// Echoed request facts.
    pub metadata: ResponseMetadata,
    /// Body.
    pub body: ReplyBody,
}

impl DiscoveryReply {
    /// Build a reply from a protocol outcome.
    pub fn from_outcome(outcome: DiscoveryOutcome, metadata: ResponseMetadata) -> Self {
        let status = outcome.status_code();
        let body = match outcome {
            DiscoveryOutcome::Updated(response) => ReplyBody::Response(response),
            DiscoveryOutcome::Unchanged { .. } | DiscoveryOutcome::Empty { .. } => ReplyBody::Empty,
        };
        Self {
            status,
            metadata,
            body,
        }
    }

    /// Build a reply from a failure.
    pub fn from_error(
        error: &XdsError,
        metadata: ResponseMetadata,
        debug: bool,
        traceback: Option<Vec<String>>,
    ) -> Self {
        let body = ErrorBody {
            error: error.kind(),
            detail: error.public_detail(debug),
            request_id: metadata.request_id.clone(),
            traceback: traceback.filter(|_| debug),
        };
        Self {
            status: error.status_code(),
            metadata,
            body: ReplyBody::Error(body),
        }
    }

    /// Whether the reply describes a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.body, ReplyBody::Error(_))
    }

    /// The rendered response, if any.
    #[must_use]
    pub fn response(&self) -> Option<&DiscoveryResponse> {
        match &self.body {
            ReplyBody::Response(response) => Some(response),
            _ => None,
        }
    }

    /// The error payload, if any.
    #[must_use]
    pub fn error(&self) -> Option<&ErrorBody> {
        match &self.body {
            ReplyBody::Error(body) => Some(body),
            _ => None,
        }
    }

    /// Map the reply onto a gRPC status for streaming transports.
    ///
    /// Only `Updated` replies carry a payload on a stream; every other reply
    /// becomes a status.
    pub fn into_grpc(self) -> Result<DiscoveryResponse, tonic::Status> {
        match self.body {
            ReplyBody::Response(response) => Ok(response),
            ReplyBody::Empty if self.status == StatusCode::NOT_MODIFIED => {
                Err(tonic::Status::new(tonic::Code::Ok, "unchanged"))
            }
            ReplyBody::Empty => Err(tonic::Status::not_found("no resources rendered")),
            ReplyBody::Error(body) => {
                let code = match self.status {
                    StatusCode::BAD_REQUEST => tonic::Code::InvalidArgument,
                    StatusCode::UNAUTHORIZED => tonic::Code::Unauthenticated,
                    _ => tonic::Code::Internal,
                };
                Err(tonic::Status::new(code, body.detail))
            }
        }
    }
}
