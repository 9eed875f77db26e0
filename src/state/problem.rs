use serde::Serialize;
use serde_json::{json, Value};

/// Error categories of the NGSI-LD API, section 5.5.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    InvalidRequest,
    BadRequestData,
    AlreadyExists,
    OperationNotSupported,
    ResourceNotFound,
    InternalError,
    TooComplexQuery,
    TooManyResults,
    LdContextNotAvailable,
}

impl ProblemKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProblemKind::InvalidRequest => "InvalidRequest",
            ProblemKind::BadRequestData => "BadRequestData",
            ProblemKind::AlreadyExists => "AlreadyExists",
            ProblemKind::OperationNotSupported => "OperationNotSupported",
            ProblemKind::ResourceNotFound => "ResourceNotFound",
            ProblemKind::InternalError => "InternalError",
            ProblemKind::TooComplexQuery => "TooComplexQuery",
            ProblemKind::TooManyResults => "TooManyResults",
            ProblemKind::LdContextNotAvailable => "LdContextNotAvailable",
        }
    }

    /// The `type` member of a problem body.
    #[must_use]
    pub fn uri(self) -> String {
        format!("https://uri.etsi.org/ngsi-ld/errors/{}", self.as_str())
    }
}

/// Wire form of an NGSI-LD problem.
#[derive(Serialize)]
struct ProblemBody<'a> {
    #[serde(rename = "type")]
    kind: String,
    title: &'a str,
    detail: &'a str,
}

/// Structured error of a request: kind, title and detail.
///
/// Set at most once per request (see [`crate::state::ConnectionState::fail`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemDetails {
    pub kind: ProblemKind,
    pub title: String,
    pub detail: String,
}

impl ProblemDetails {
    pub fn new(kind: ProblemKind, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            detail: detail.into(),
        }
    }

    pub fn bad_request(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ProblemKind::BadRequestData, title, detail)
    }

    /// NGSI-LD problem body.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let body = ProblemBody {
            kind: self.kind.uri(),
            title: &self.title,
            detail: &self.detail,
        };
        serde_json::to_value(body).unwrap_or(Value::Null)
    }

    /// NGSIv2 error body: `{"error": ..., "description": ...}`.
    ///
    /// The error name is derived from the HTTP status, the way the v2 API
    /// has always reported it.
    #[must_use]
    pub fn to_v2_json(&self, status: u16) -> Value {
        json!({
            "error": v2_error_name(status),
            "description": self.description(),
        })
    }

    /// Title and detail as one line, for the bodies that carry a single
    /// message.
    #[must_use]
    pub fn description(&self) -> String {
        if self.detail.is_empty() {
            self.title.clone()
        } else {
            format!("{}: {}", self.title, self.detail)
        }
    }
}

/// Error names used in NGSIv2 error bodies.
#[must_use]
pub fn v2_error_name(status: u16) -> &'static str {
    match status {
        400 => "BadRequest",
        404 => "NotFound",
        405 => "MethodNotAllowed",
        406 => "NotAcceptable",
        409 => "TooManyResults",
        411 => "ContentLengthRequired",
        413 => "RequestEntityTooLarge",
        415 => "UnsupportedMediaType",
        422 => "Unprocessable",
        501 => "NotImplemented",
        _ if status >= 500 => "InternalServerError",
        _ => "BadRequest",
    }
}
