//! Latency instrumented HTTP client.
//!
//! Every request dials a fresh connection (no pooling, no keep-alive) so the
//! DNS, connect and TLS checkpoints are measured on each check.

mod metrics;

pub use metrics::RequestMetrics;

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{CONNECTION, CONTENT_TYPE, HOST, HeaderValue, USER_AGENT};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

use crate::monitoring::dns;

/// User agent sent when the request does not set one
pub const DEFAULT_USER_AGENT: &str = concat!("scout/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("lookup {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("dial tcp {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("TLS handshake failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("invalid request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("{0}")]
    Http(#[from] hyper::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Address to connect to instead of resolving the URL host.
///
/// Without a port the URL's port (or the scheme default) is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveTo {
    pub ip: IpAddr,
    pub port: Option<u16>,
}

impl ResolveTo {
    fn socket_addr(&self, default_port: u16) -> SocketAddr {
        SocketAddr::new(self.ip, self.port.unwrap_or(default_port))
    }
}

impl FromStr for ResolveTo {
    type Err = std::net::AddrParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        match value.parse::<SocketAddr>() {
            Ok(addr) => Ok(Self { ip: addr.ip(), port: Some(addr.port()) }),
            Err(_) => {
                let ip = value.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>()?;
                Ok(Self { ip, port: None })
            }
        }
    }
}

impl fmt::Display for ResolveTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}", SocketAddr::new(self.ip, port)),
            None => write!(f, "{}", self.ip),
        }
    }
}

/// A single request to send through [`send`]
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: Bytes,
    pub content_type: Option<String>,
    pub resolve_to: Option<ResolveTo>,
    pub timeout: Duration,
    pub verify_tls: bool,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: Bytes::new(),
            content_type: None,
            resolve_to: None,
            timeout: Duration::from_secs(30),
            verify_tls: true,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn headers(mut self, headers: BTreeMap<String, Vec<String>>) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        self.body = body.into();
        self.content_type = Some(content_type.into());
        self
    }

    pub fn resolve_to(mut self, target: Option<ResolveTo>) -> Self {
        self.resolve_to = target;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }
}

/// Response of a completed exchange, body fully read
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
    pub metrics: RequestMetrics,
}

impl HttpResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

/// Send a request, bounded as a whole by the request timeout
pub async fn send(request: &HttpRequest) -> Result<HttpResponse, ClientError> {
    let mut metrics = RequestMetrics::start();

    let (status, body) = tokio::time::timeout(request.timeout, exchange(request, &mut metrics))
        .await
        .map_err(|_| ClientError::Timeout(request.timeout))??;

    Ok(HttpResponse { status, body, metrics })
}

async fn exchange(
    request: &HttpRequest,
    metrics: &mut RequestMetrics,
) -> Result<(u16, Bytes), ClientError> {
    let url = Url::parse(&request.url)?;
    let secure = match url.scheme() {
        "https" => true,
        "http" => false,
        other => return Err(ClientError::UnsupportedScheme(other.to_string())),
    };
    let host = dns::url_host(&url).ok_or(ClientError::MissingHost)?;
    let port = url.port_or_known_default().ok_or(ClientError::MissingHost)?;

    let addrs = match request.resolve_to {
        Some(target) => vec![target.socket_addr(port)],
        None => {
            metrics.dns_start = Some(Instant::now());
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), port))
                .await
                .map_err(|source| ClientError::Resolve { host: host.clone(), source })?
                .collect();
            metrics.dns_done = Some(Instant::now());
            addrs
        }
    };

    metrics.connect_start = Some(Instant::now());
    let tcp = connect(&addrs, &host).await?;
    metrics.connect_done = Some(Instant::now());

    let io: Box<dyn Io> = if secure {
        metrics.tls_handshake_start = Some(Instant::now());
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(!request.verify_tls)
            .danger_accept_invalid_hostnames(!request.verify_tls)
            .build()?;
        let stream = tokio_native_tls::TlsConnector::from(connector).connect(&host, tcp).await?;
        metrics.tls_handshake_done = Some(Instant::now());
        Box::new(stream)
    } else {
        Box::new(tcp)
    };

    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(io)).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!("HTTP connection closed with error: {}", e);
        }
    });
    metrics.got_conn = Some(Instant::now());

    let req = build_request(request, &url)?;
    metrics.wrote_request = Some(Instant::now());
    let response = sender.send_request(req).await?;
    metrics.got_first_response_byte = Some(Instant::now());

    let status = response.status().as_u16();
    let body = response.into_body().collect().await?.to_bytes();
    metrics.got_response = Some(Instant::now());

    Ok((status, body))
}

async fn connect(addrs: &[SocketAddr], host: &str) -> Result<TcpStream, ClientError> {
    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some((addr.to_string(), e)),
        }
    }

    Err(match last_error {
        Some((addr, source)) => ClientError::Connect { addr, source },
        None => ClientError::Resolve {
            host: host.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
        },
    })
}

fn build_request(request: &HttpRequest, url: &Url) -> Result<Request<Full<Bytes>>, ClientError> {
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let authority = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(ClientError::MissingHost),
    };

    let mut builder = Request::builder().method(request.method.clone()).uri(target);
    for (name, values) in &request.headers {
        for value in values {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }

    let mut req = builder.body(Full::new(request.body.clone()))?;
    let headers = req.headers_mut();
    headers.insert(HOST, HeaderValue::from_str(&authority).map_err(hyper::http::Error::from)?);
    headers.insert(CONNECTION, HeaderValue::from_static("close"));
    if !headers.contains_key(USER_AGENT) {
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    }
    if let Some(content_type) = &request.content_type {
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(content_type).map_err(hyper::http::Error::from)?,
        );
    }

    Ok(req)
}
