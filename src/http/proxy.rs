//! Request dispatch.
//!
//! # Per-request states
//! ```text
//! START → ADMISSION → SELECTION → FORWARD → DONE
//!              │            │
//!              └─ 429       └─ 503 (backend "none")
//! ```
//! Admission runs in a layer before this handler; everything from selection
//! onwards lives here. A backend whose URL does not parse is a static
//! misconfiguration: the request gets a 500 and is not retried elsewhere.

use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri, Version,
    },
    response::{IntoResponse, Response},
    BoxError,
};
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::http::request::peer_ip;
use crate::http::server::AppState;
use crate::load_balancer::BackendLease;
use crate::security::headers::{prepare_upstream_headers, strip_hop_by_hop};

/// Backend label recorded when no backend could be selected.
pub const NO_BACKEND: &str = "none";

/// Client used for forwarding and probing.
pub type HttpClient = Client<HttpConnector, Body>;

/// Build the forwarding client.
pub fn build_client(idle_timeout: Duration) -> HttpClient {
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(idle_timeout)
        .build(HttpConnector::new())
}

/// Why a backend target could not be turned into an upstream URI.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("invalid backend url {url:?}: {source}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("backend url {0:?} has no host")]
    MissingHost(String),
    #[error("backend url {0:?} uses unsupported scheme")]
    UnsupportedScheme(String),
    #[error("cannot build upstream uri: {0}")]
    Uri(#[from] axum::http::Error),
    #[error("invalid upstream uri component: {0}")]
    InvalidUri(#[from] axum::http::uri::InvalidUri),
}

/// A backend target parsed into URI components.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub scheme: Scheme,
    pub authority: Authority,
    /// Path prefix of the target, without trailing slash.
    pub base_path: String,
}

impl ResolvedTarget {
    /// Upstream URI for an inbound request URI: target base path + request path, query kept.
    pub fn upstream_uri(&self, original: &Uri) -> Result<Uri, TargetError> {
        let path = format!("{}{}", self.base_path, original.path());
        let path_and_query = match original.query() {
            Some(query) => format!("{}?{}", path, query),
            None => path,
        };

        Ok(Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(PathAndQuery::from_str(&path_and_query)?)
            .build()?)
    }
}

/// Response body that keeps its backend counted as in flight until the
/// body has been fully sent or dropped.
pub struct LeasedBody {
    inner: Body,
    _lease: BackendLease,
}

impl LeasedBody {
    pub fn new(inner: Body, lease: BackendLease) -> Self {
        Self { inner, _lease: lease }
    }
}

impl HttpBody for LeasedBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx).map_err(Into::into)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Parse a backend target URL.
pub fn resolve_target(target: &str) -> Result<ResolvedTarget, TargetError> {
    let url = Url::parse(target).map_err(|source| TargetError::Parse {
        url: target.to_string(),
        source,
    })?;

    let scheme = match url.scheme() {
        "http" => Scheme::HTTP,
        "https" => Scheme::HTTPS,
        _ => return Err(TargetError::UnsupportedScheme(target.to_string())),
    };

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| TargetError::MissingHost(target.to_string()))?;
    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    Ok(ResolvedTarget {
        scheme,
        authority: Authority::from_str(&authority)?,
        base_path: url.path().trim_end_matches('/').to_string(),
    })
}

/// Main proxy handler.
/// Selects a backend, forwards the request and records the outcome.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // Selection
    let Some(backend) = state.registry.next() else {
        tracing::error!(method = %method, path = %path, "No healthy backends available");
        state
            .telemetry
            .record_request(method.as_str(), StatusCode::SERVICE_UNAVAILABLE.as_u16(), NO_BACKEND, start.elapsed());
        return (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response();
    };

    // Target resolution
    let target = match resolve_target(&backend.target) {
        Ok(target) => target,
        Err(e) => {
            tracing::error!(backend = %backend.name, error = %e, "Invalid backend URL");
            state.telemetry.record_request(
                method.as_str(),
                StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                &backend.name,
                start.elapsed(),
            );
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
    };

    // Forward. The lease moves into the response body.
    let name = backend.name.clone();
    let response = forward(&state.client, &target, request, backend).await;

    let status = response.status();
    let elapsed = start.elapsed();
    state
        .telemetry
        .record_request(method.as_str(), status.as_u16(), &name, elapsed);
    state.telemetry.record_backend_request(&name, status.as_u16());

    tracing::debug!(
        method = %method,
        path = %path,
        backend = %name,
        status = status.as_u16(),
        duration = ?elapsed,
        "Proxied request"
    );
    response
}

/// Rewrite the request for `target`, send it, and relay the response.
///
/// Transport failures become a 502, like any reverse proxy's error handler.
async fn forward(client: &HttpClient, target: &ResolvedTarget, request: Request<Body>, lease: BackendLease) -> Response {
    let backend = lease.name.as_str();
    let client_ip = peer_ip(&request);
    let (mut parts, body) = request.into_parts();

    parts.uri = match target.upstream_uri(&parts.uri) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(backend, error = %e, "Failed to build upstream URI");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
    };
    parts.version = Version::HTTP_11;
    prepare_upstream_headers(&mut parts.headers, &target.authority, client_ip);

    match client.request(Request::from_parts(parts, body)).await {
        Ok(upstream) => {
            let (mut parts, body) = upstream.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Response::from_parts(parts, Body::new(LeasedBody::new(Body::new(body), lease)))
        }
        Err(e) => {
            tracing::error!(backend, error = %e, "Upstream request failed");
            (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::backend::BackendState;
    use crate::load_balancer::BackendDescriptor;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_leased_body_counts_until_consumed() {
        let state = BackendState::new(BackendDescriptor::new("a", "http://a:3000", 1));
        let body = Body::new(LeasedBody::new(Body::from("payload"), state.lease()));
        assert_eq!(state.active_connections(), 1);

        let bytes = to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"payload");
        assert_eq!(state.active_connections(), 0);
    }

    #[test]
    fn test_leased_body_released_on_drop() {
        let state = BackendState::new(BackendDescriptor::new("a", "http://a:3000", 1));
        let body = LeasedBody::new(Body::empty(), state.lease());
        assert_eq!(state.active_connections(), 1);
        drop(body);
        assert_eq!(state.active_connections(), 0);
    }

    #[test]
    fn test_resolve_target_with_port_and_path() {
        let target = resolve_target("http://10.0.0.5:3000/api/").unwrap();
        assert_eq!(target.scheme, Scheme::HTTP);
        assert_eq!(target.authority.as_str(), "10.0.0.5:3000");
        assert_eq!(target.base_path, "/api");

        let uri: Uri = "/users/7?page=2".parse().unwrap();
        assert_eq!(
            target.upstream_uri(&uri).unwrap().to_string(),
            "http://10.0.0.5:3000/api/users/7?page=2"
        );
    }

    #[test]
    fn test_resolve_target_default_port_omitted() {
        let target = resolve_target("http://backend.internal").unwrap();
        assert_eq!(target.authority.as_str(), "backend.internal");
        assert_eq!(target.base_path, "");

        let uri: Uri = "/".parse().unwrap();
        assert_eq!(target.upstream_uri(&uri).unwrap().to_string(), "http://backend.internal/");
    }

    #[test]
    fn test_malformed_targets_rejected() {
        assert!(matches!(resolve_target("::not a url::"), Err(TargetError::Parse { .. })));
        assert!(matches!(resolve_target("localhost:3000"), Err(TargetError::UnsupportedScheme(_))));
        assert!(matches!(resolve_target("unix:/var/run/app.sock"), Err(TargetError::UnsupportedScheme(_))));
    }
}
