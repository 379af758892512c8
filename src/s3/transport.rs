//! HTTP transport seam
//!
//! The client only needs to send a signed request and read back status,
//! headers and a body stream. [`RequestTransport`] is that seam and
//! [`HyperTransport`] the production implementation:
//! - HTTP/1.1 over hyper-util's pooled legacy client
//! - Tuned connection pool (1024 idle per host, 90s idle timeout)
//! - TCP_NODELAY and keepalive
//! - native-tls for HTTPS

use crate::s3::error::{Result, S3Error};
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use http_body_util::{BodyStream, Full};
use hyper::header::HeaderMap;
use hyper::{Method, Request, StatusCode};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use native_tls::TlsConnector;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// A fully signed request ready to go on the wire.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: Method,
    /// `scheme://host[:port]`
    pub endpoint: String,
    /// Percent-encoded path
    pub path: String,
    /// Canonical query string without the leading `?`
    pub query: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl SignedRequest {
    pub fn uri(&self) -> String {
        let mut uri = String::with_capacity(
            self.endpoint.len() + self.path.len() + self.query.len() + 1,
        );
        uri.push_str(&self.endpoint);
        uri.push_str(&self.path);
        if !self.query.is_empty() {
            uri.push('?');
            uri.push_str(&self.query);
        }
        uri
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of a query parameter, percent-decoded
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let k = urlencoding::decode(k).ok()?;
            if k == name {
                urlencoding::decode(v).ok().map(|v| v.into_owned())
            } else {
                None
            }
        })
    }
}

/// Streaming response body.
pub struct ResponseBody {
    inner: BoxStream<'static, Result<Bytes>>,
}

impl ResponseBody {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
        }
    }

    pub fn empty() -> Self {
        Self::new(stream::empty())
    }

    /// Read the whole body into memory.
    pub async fn collect(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.inner.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            Self::empty()
        } else {
            Self::new(stream::once(async move { Ok(bytes) }))
        }
    }
}

impl From<&'static str> for ResponseBody {
    fn from(s: &'static str) -> Self {
        Bytes::from_static(s.as_bytes()).into()
    }
}

impl Stream for ResponseBody {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody").finish_non_exhaustive()
    }
}

/// Raw response as delivered by a transport.
#[derive(Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl TransportResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<ResponseBody>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }
}

/// Sends a signed request and returns the response head plus body stream.
pub trait RequestTransport: Send + Sync + 'static {
    fn send(
        &self,
        request: SignedRequest,
    ) -> impl Future<Output = Result<TransportResponse>> + Send;
}

/// Pooled hyper client.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl HyperTransport {
    pub fn new(insecure_tls: bool) -> Result<Self> {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.enforce_http(false);
        http.set_connect_timeout(Some(Duration::from_secs(10)));
        http.set_keepalive(Some(Duration::from_secs(90)));

        let tls = if insecure_tls {
            tracing::warn!("INSECURE TLS MODE ENABLED: Certificate verification is disabled!");
            TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
        } else {
            TlsConnector::new()
        }
        .map_err(|e| S3Error::Config(format!("failed to build TLS connector: {}", e)))?;

        let https = HttpsConnector::from((http, tls.into()));

        let client = HyperClient::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(1024)
            .retry_canceled_requests(true)
            .set_host(true)
            .build(https);

        Ok(Self { client })
    }
}

impl fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTransport").finish_non_exhaustive()
    }
}

impl RequestTransport for HyperTransport {
    async fn send(&self, request: SignedRequest) -> Result<TransportResponse> {
        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(request.uri());
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        let req = builder.body(Full::new(request.body))?;

        let response = self.client.request(req).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = BodyStream::new(response.into_body())
            .try_filter_map(|frame| futures::future::ready(Ok(frame.into_data().ok())))
            .map_err(S3Error::from);

        Ok(TransportResponse {
            status,
            headers,
            body: ResponseBody::new(body),
        })
    }
}
