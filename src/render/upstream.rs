//! Render engine backed by an SSR server reached over HTTP.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the configured origin
//! - Forward context entries as `<prefix><key>` request headers, replacing
//!   any the client sent under that prefix
//! - Strip hop-by-hop headers in both directions
//! - Ask for an unencoded body, since it will be rewritten
//! - Map an upstream 404 to "no match"

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode, Uri, Version};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::UpstreamConfig;
use crate::render::context::RequestContext;
use crate::render::engine::{RenderEngine, RenderError};
use crate::security::headers::{append_forwarded, strip_hop_by_hop, strip_prefixed};

/// Forwards render requests to an SSR origin.
#[derive(Clone)]
pub struct UpstreamRenderer {
    client: Client<HttpConnector, Body>,
    scheme: Scheme,
    authority: Authority,
    context_header_prefix: String,
}

impl UpstreamRenderer {
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, RenderError> {
        let origin: Uri = config
            .origin
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| RenderError::InvalidOrigin(e.to_string()))?;
        let authority = origin
            .authority()
            .cloned()
            .ok_or_else(|| RenderError::InvalidOrigin(format!("{} has no host", config.origin)))?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            scheme: origin.scheme().cloned().unwrap_or(Scheme::HTTP),
            authority,
            context_header_prefix: config.context_header_prefix.to_ascii_lowercase(),
        })
    }

    /// Authority requests are forwarded to.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    fn upstream_uri(&self, uri: &Uri) -> Result<Uri, RenderError> {
        let path_and_query = uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        Ok(Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()?)
    }

    /// Turn inbound request headers into the headers sent upstream.
    fn prepare_headers(
        &self,
        headers: &mut HeaderMap,
        peer: Option<SocketAddr>,
        context: &RequestContext,
    ) {
        strip_hop_by_hop(headers);
        // The rendered body is rewritten as text.
        headers.remove(header::ACCEPT_ENCODING);
        append_forwarded(headers, peer);
        strip_prefixed(headers, &self.context_header_prefix);
        for (name, value) in self.context_headers(context) {
            headers.insert(name, value);
        }
    }

    fn context_headers<'a>(
        &'a self,
        context: &'a RequestContext,
    ) -> impl Iterator<Item = (HeaderName, HeaderValue)> + 'a {
        context.iter().filter_map(move |(key, value)| {
            let name = format!("{}{}", self.context_header_prefix, key.to_ascii_lowercase());
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => Some((name, value)),
                _ => {
                    tracing::debug!(key = %key, "Context entry not representable as a header");
                    None
                }
            }
        })
    }
}

#[async_trait]
impl RenderEngine for UpstreamRenderer {
    async fn handle(
        &self,
        request: Request<Body>,
        context: &RequestContext,
    ) -> Result<Option<Response<Body>>, RenderError> {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let (mut parts, body) = request.into_parts();
        parts.uri = self.upstream_uri(&parts.uri)?;
        parts.version = Version::HTTP_11;

        self.prepare_headers(&mut parts.headers, peer, context);

        let uri = parts.uri.clone();
        let response = self
            .client
            .request(Request::from_parts(parts, body))
            .await
            .map_err(|e| RenderError::Upstream(e.to_string()))?;

        tracing::debug!(upstream = %uri, status = %response.status(), "Upstream rendered");

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Some(Response::from_parts(parts, Body::new(body))))
    }
}
