use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use serde::Serialize;
use tower_http::request_id::RequestId;
use uuid::Uuid;

/// Correlation id shown on the error page and attached to the matching log line.
///
/// Taken from the W3C `traceparent` header when a distributed trace is active, otherwise from the
/// request id assigned by `SetRequestIdLayer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceId(String);

impl TraceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_parts(parts: &Parts) -> Self {
        if let Some(trace_id) = traceparent_trace_id(&parts.headers) {
            return Self(trace_id);
        }

        parts
            .extensions
            .get::<RequestId>()
            .and_then(|id| id.header_value().to_str().ok())
            .filter(|id| !id.is_empty())
            .map(|id| Self(id.to_owned()))
            .unwrap_or_else(|| Self(Uuid::new_v4().to_string()))
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// version-traceid-parentid-flags
fn traceparent_trace_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("traceparent")?.to_str().ok()?;
    let mut parts = value.trim().split('-');
    let _version = parts.next()?;
    let trace_id = parts.next()?;

    let valid = trace_id.len() == 32
        && trace_id.chars().all(|c| c.is_ascii_hexdigit())
        && trace_id.chars().any(|c| c != '0');

    valid.then(|| trace_id.to_ascii_lowercase())
}

impl<S> FromRequestParts<S> for TraceId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, Request};

    use super::*;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn prefers_traceparent() {
        let mut parts = parts(
            Request::builder()
                .header("traceparent", "00-4BF92F3577B34DA6A3CE929D0E0E4736-00f067aa0ba902b7-01")
                .body(())
                .unwrap(),
        );
        parts
            .extensions
            .insert(RequestId::new(HeaderValue::from_static("request-1")));

        assert_eq!(TraceId::from_parts(&parts).as_str(), "4bf92f3577b34da6a3ce929d0e0e4736");
    }

    #[test]
    fn falls_back_to_request_id() {
        let mut parts = parts(
            Request::builder()
                .header("traceparent", "00-00000000000000000000000000000000-00f067aa0ba902b7-01")
                .body(())
                .unwrap(),
        );
        parts
            .extensions
            .insert(RequestId::new(HeaderValue::from_static("request-1")));

        assert_eq!(TraceId::from_parts(&parts).as_str(), "request-1");
    }

    #[test]
    fn generates_one_when_nothing_is_set() {
        let parts = parts(Request::builder().body(()).unwrap());

        let trace_id = TraceId::from_parts(&parts);
        assert!(Uuid::parse_str(trace_id.as_str()).is_ok());
    }
}
