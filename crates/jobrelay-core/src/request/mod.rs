//! Decoding of inbound job messages.
//!
//! Messages are JSON objects using the producer's `PascalCase` keys:
//!
//! ```json
//! { "JobId": "abc123",
//!   "Body": { "Environment": "prod" },
//!   "Headers": { "SecurityContext": { "UserId": "u1", "Token": "t" },
//!                "CommandType": "Run" },
//!   "TracingInformation": "trace-1" }
//! ```
//!
//! Only a payload that is not a JSON object fails to parse. Every field is
//! optional and extracted leniently: a malformed `Headers` or
//! `SecurityContext` leaves that field unset without disturbing `JobId` or
//! `Body`. Producers sometimes stringify nested objects, so `Body`,
//! `Headers` and `SecurityContext` are also accepted as strings holding a
//! JSON object.

use std::fmt;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ParseError, UNKNOWN_JOB_ID};

const REQUEST_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::request");

/// Decoded representation of an inbound execution request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobRequest {
    job_id: String,
    body: Option<Map<String, Value>>,
    headers: Option<JobHeaders>,
    method: Option<String>,
    tracing_information: Option<String>,
    arguments: Vec<String>,
}

/// Metadata carried under `Headers`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobHeaders {
    security_context: Option<SecurityContext>,
    command_type: Option<String>,
}

/// Caller identity carried under `Headers.SecurityContext`.
///
/// Passed through untouched; nothing in the pipeline authorises against it.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SecurityContext {
    user_id: Option<String>,
    token: Option<String>,
}

/// Decodes a raw message payload into a [`JobRequest`].
///
/// # Errors
///
/// Returns [`ParseError`] when the payload is not UTF-8, not JSON, or not a
/// JSON object. The error keeps the payload for correlation.
///
/// # Example
///
/// ```
/// use jobrelay_core::request;
///
/// let request = request::parse(br#"{"JobId":"abc123","Body":{"Environment":"prod"}}"#)
///     .expect("payload is a JSON object");
/// assert_eq!(request.job_id(), "abc123");
/// assert_eq!(request.body_field("Environment").as_deref(), Some("prod"));
/// assert!(request.headers().is_none());
/// ```
pub fn parse(payload: &[u8]) -> Result<JobRequest, ParseError> {
    let text = std::str::from_utf8(payload).map_err(|err| {
        ParseError::new(
            String::from_utf8_lossy(payload),
            format!("payload is not valid UTF-8: {err}"),
        )
    })?;

    let value: Value =
        serde_json::from_str(text).map_err(|err| ParseError::from_json(text, err))?;

    let Value::Object(fields) = value else {
        return Err(ParseError::new(
            text,
            format!("expected a JSON object, found {}", value_kind(&value)),
        ));
    };

    let request = JobRequest::from_fields(fields);
    debug!(
        target: REQUEST_TARGET,
        job_id = %request.job_id,
        has_body = request.body.is_some(),
        has_headers = request.headers.is_some(),
        arguments = request.arguments.len(),
        "decoded job request"
    );
    Ok(request)
}

impl JobRequest {
    /// Creates a request with only a job identifier.
    #[must_use]
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            ..Self::default()
        }
    }

    /// Attaches a body mapping.
    #[must_use]
    pub fn with_body(mut self, body: Map<String, Value>) -> Self {
        self.body = Some(body);
        self
    }

    /// Attaches headers.
    #[must_use]
    pub fn with_headers(mut self, headers: JobHeaders) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Attaches request-scoped arguments.
    #[must_use]
    pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }

    fn from_fields(mut fields: Map<String, Value>) -> Self {
        let job_id = fields
            .get("JobId")
            .and_then(scalar_text)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| UNKNOWN_JOB_ID.to_owned());

        Self {
            job_id,
            body: fields.remove("Body").and_then(into_object),
            headers: fields.remove("Headers").and_then(into_object).map(JobHeaders::from_fields),
            method: fields.get("Method").and_then(scalar_text),
            tracing_information: fields.get("TracingInformation").and_then(scalar_text),
            arguments: fields
                .get("Arguments")
                .map(argument_list)
                .unwrap_or_default(),
        }
    }

    /// Returns the job identifier, or [`UNKNOWN_JOB_ID`] when absent.
    #[must_use]
    pub const fn job_id(&self) -> &str {
        self.job_id.as_str()
    }

    /// Returns the body mapping when present.
    #[must_use]
    pub const fn body(&self) -> Option<&Map<String, Value>> {
        self.body.as_ref()
    }

    /// Returns a scalar body field rendered as text.
    #[must_use]
    pub fn body_field(&self, name: &str) -> Option<String> {
        self.body.as_ref()?.get(name).and_then(scalar_text)
    }

    /// Returns the headers when present.
    #[must_use]
    pub const fn headers(&self) -> Option<&JobHeaders> {
        self.headers.as_ref()
    }

    /// Returns `Headers.CommandType` when present.
    #[must_use]
    pub fn command_type(&self) -> Option<&str> {
        self.headers.as_ref()?.command_type()
    }

    /// Returns the top-level `Method` when present.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Returns the opaque `TracingInformation` when present.
    #[must_use]
    pub fn tracing_information(&self) -> Option<&str> {
        self.tracing_information.as_deref()
    }

    /// Returns the request-scoped `Arguments`.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }
}

impl JobHeaders {
    /// Creates headers from their parts.
    #[must_use]
    pub const fn new(
        security_context: Option<SecurityContext>,
        command_type: Option<String>,
    ) -> Self {
        Self {
            security_context,
            command_type,
        }
    }

    fn from_fields(mut fields: Map<String, Value>) -> Self {
        Self {
            security_context: fields
                .remove("SecurityContext")
                .and_then(into_object)
                .map(|context| SecurityContext::from_fields(&context)),
            command_type: fields.get("CommandType").and_then(scalar_text),
        }
    }

    /// Returns the security context when present and well formed.
    #[must_use]
    pub const fn security_context(&self) -> Option<&SecurityContext> {
        self.security_context.as_ref()
    }

    /// Returns the command type when present.
    #[must_use]
    pub fn command_type(&self) -> Option<&str> {
        self.command_type.as_deref()
    }
}

impl SecurityContext {
    /// Creates a security context from its parts.
    #[must_use]
    pub const fn new(user_id: Option<String>, token: Option<String>) -> Self {
        Self { user_id, token }
    }

    fn from_fields(fields: &Map<String, Value>) -> Self {
        Self {
            user_id: fields.get("UserId").and_then(scalar_text),
            token: fields.get("Token").and_then(scalar_text),
        }
    }

    /// Returns the caller's user identifier.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Returns the caller's token.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl fmt::Debug for SecurityContext {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SecurityContext")
            .field("user_id", &self.user_id)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Renders strings, numbers and booleans as text.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Accepts an object, or a string that decodes to one.
fn into_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

fn argument_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        _ => Vec::new(),
    }
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
