//! Hands an inbound request to the selected target.
//!
//! In proxy mode the destination is fetched and its response relayed
//! unchanged; in redirect mode the caller gets a `301` pointing at it. Both
//! modes build the destination with [`compose_destination`].
//!
//! Bodies are buffered whole in both directions. Nothing is written to the
//! caller until the upstream response has been read completely, so a failed
//! fetch never leaks a partial body.

use crate::config::ForwardMode;
use crate::error::{RedirectorError, Result};
use crate::store::UrlRecord;
use bytes::Bytes;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Request, Response, StatusCode, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use metrics::{counter, histogram};
use std::time::Instant;
use warp::http::header::{HeaderMap, HeaderValue, HOST, LOCATION};
use warp::http::Method;

/// The parts of an inbound request that get forwarded.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    /// Query string as received, without the leading `?`.
    pub raw_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// `base + path`, plus `?raw_query` when the query is non-empty.
///
/// The query is appended byte for byte; nothing is decoded or re-encoded.
pub fn compose_destination(base: &str, path: &str, raw_query: &str) -> String {
    let mut destination = String::with_capacity(base.len() + path.len() + raw_query.len() + 1);
    destination.push_str(base);
    destination.push_str(path);
    if !raw_query.is_empty() {
        destination.push('?');
        destination.push_str(raw_query);
    }
    destination
}

pub struct Forwarder {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    mode: ForwardMode,
}

impl Forwarder {
    /// Build a forwarder with a default-configured HTTP client: no timeout,
    /// no retries, redirects are relayed rather than followed.
    pub fn new(mode: ForwardMode) -> Self {
        let https_connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder().build(https_connector);
        Self { client, mode }
    }

    pub fn mode(&self) -> ForwardMode {
        self.mode
    }

    pub async fn forward(&self, request: InboundRequest, target: &UrlRecord) -> Result<Response<Body>> {
        let destination = compose_destination(&target.url, &request.path, &request.raw_query);

        match self.mode {
            ForwardMode::Redirect => {
                tracing::info!("Redirecting to {}", destination);
                counter!("redirector.redirect.issued", 1);
                redirect_to(&destination)
            }
            ForwardMode::Proxy => {
                tracing::info!("Proxying to {}", target.url);
                self.relay(request, destination).await
            }
        }
    }

    async fn relay(&self, request: InboundRequest, destination: String) -> Result<Response<Body>> {
        let start = Instant::now();

        // Uri keeps path and query exactly as composed: no dot-segment
        // removal, no re-encoding.
        let uri = Uri::try_from(destination.as_str())
            .map_err(|_| RedirectorError::InvalidDestination { url: destination })?;

        let mut outbound = Request::builder()
            .method(request.method)
            .uri(uri)
            .body(Body::from(request.body))
            .map_err(|e| RedirectorError::ProxyTransport {
                message: e.to_string(),
            })?;
        *outbound.headers_mut() = outbound_headers(request.headers);

        let upstream = match self.client.request(outbound).await {
            Ok(resp) => resp,
            Err(e) => {
                counter!("redirector.forward.transport_error", 1);
                return Err(e.into());
            }
        };

        let (parts, body) = upstream.into_parts();
        let body = hyper::body::to_bytes(body).await?;

        histogram!("redirector.forward.duration", start.elapsed().as_secs_f64());
        counter!("redirector.forward.success", 1);
        tracing::debug!("Upstream answered {} with {} body bytes", parts.status, body.len());

        Ok(Response::from_parts(parts, Body::from(body)))
    }
}

fn redirect_to(destination: &str) -> Result<Response<Body>> {
    let location = HeaderValue::from_str(destination).map_err(|_| RedirectorError::InvalidDestination {
        url: destination.to_string(),
    })?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::MOVED_PERMANENTLY;
    response.headers_mut().insert(LOCATION, location);
    Ok(response)
}

/// Every inbound header and every value under it, except `Host`: the
/// client derives the outbound authority from the destination URI.
fn outbound_headers(mut headers: HeaderMap) -> HeaderMap {
    headers.remove(HOST);
    headers
}
