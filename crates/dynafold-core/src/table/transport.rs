use serde_json::Value as Json;
use std::fmt;
use thiserror::Error as ThisError;

///
/// TransportFailure
///
/// A non-2xx exchange as the transport hands it back: the raw error body
/// plus the diagnostic envelope. Error-name mapping happens on this side of
/// the seam (`map_failure`), not in the transport.
///

#[derive(Debug)]
pub struct TransportFailure {
    pub status_code: u16,
    pub body: Json,
    pub request_id: Option<String>,
}

///
/// Transport
///
/// The external collaborator that owns signing, headers
/// (`Content-Type: application/x-amz-json-1.0`,
/// `X-Amz-Target: <Service>_<ApiVersion>.<Action>`), and the connection
/// lifecycle. A successful exchange with an empty body yields `{}`.
/// Cancellation and timeouts are the transport caller's concern; this layer
/// performs no retries.
///

pub trait Transport {
    fn send(&self, action: &str, body: Json) -> Result<Json, TransportFailure>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, action: &str, body: Json) -> Result<Json, TransportFailure> {
        (**self).send(action, body)
    }
}

///
/// WireContext
///
/// Diagnostic envelope preserved on every wire-level error.
///

#[derive(Debug)]
pub struct WireContext {
    pub message: Option<String>,
    pub status_code: u16,
    pub request_id: Option<String>,
}

impl fmt::Display for WireContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.status_code)?;
        if let Some(id) = &self.request_id {
            write!(f, ", request {id}")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

///
/// WireError
///
/// Store errors mapped from the simple error name in `__type`. Unrecognized
/// names fall through to `Unknown` with full diagnostic context rather than
/// being dropped.
///

#[derive(Debug, ThisError)]
pub enum WireError {
    #[error("conditional check failed ({0})")]
    ConditionalCheckFailed(WireContext),

    #[error("throttled by the store ({0})")]
    Throttling(WireContext),

    #[error("service unavailable ({0})")]
    ServiceUnavailable(WireContext),

    #[error("request timed out ({0})")]
    RequestTimeout(WireContext),

    #[error("access denied ({0})")]
    AccessDenied(WireContext),

    #[error("unauthorized ({0})")]
    Unauthorized(WireContext),

    #[error("request validation failed ({0})")]
    Validation(WireContext),

    #[error("resource not found ({0})")]
    ResourceNotFound(WireContext),

    #[error("unrecognized store error {name:?} ({context})")]
    Unknown { name: String, context: WireContext },
}

/// Map a failed exchange to the error taxonomy. The body carries
/// `{__type: "<namespace>#<ErrorName>", Message?}`; everything up to and
/// including `#` is stripped to get the simple name.
pub fn map_failure(failure: TransportFailure) -> WireError {
    let raw_type = failure
        .body
        .get("__type")
        .and_then(Json::as_str)
        .unwrap_or_default();
    let name = raw_type
        .rsplit_once('#')
        .map_or(raw_type, |(_, simple)| simple);

    let message = failure
        .body
        .get("Message")
        .or_else(|| failure.body.get("message"))
        .and_then(Json::as_str)
        .map(str::to_string);
    let context = WireContext {
        message,
        status_code: failure.status_code,
        request_id: failure.request_id,
    };

    match name {
        "ConditionalCheckFailedException" => WireError::ConditionalCheckFailed(context),
        "ThrottlingException" | "ProvisionedThroughputExceededException" => {
            WireError::Throttling(context)
        }
        "ServiceUnavailable" | "ServiceUnavailableException" => {
            WireError::ServiceUnavailable(context)
        }
        "RequestTimeout" | "RequestTimeoutException" => WireError::RequestTimeout(context),
        "AccessDenied" | "AccessDeniedException" => WireError::AccessDenied(context),
        "Unauthorized" | "UnauthorizedException" => WireError::Unauthorized(context),
        "ValidationException" => WireError::Validation(context),
        "ResourceNotFoundException" => WireError::ResourceNotFound(context),
        _ => WireError::Unknown {
            name: name.to_string(),
            context,
        },
    }
}
