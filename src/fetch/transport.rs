//! HTTP transport
//!
//! Performs exactly one outbound GET per call. A fresh client is built for
//! every request so proxy choice, TLS policy and timeout are per-call values
//! and no connection is shared between attempts or sources.

use crate::config::{FetchConfig, ProxyConfig};
use crate::fetch::charset::decode_body;
use crate::model::ErrorClass;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client, Proxy};
use std::borrow::Cow;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";

/// A failed transport request
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Timeout after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("TLS handshake failed: {0}")]
    Tls(String),

    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Request failed: {0}")]
    Client(String),
}

impl TransportError {
    /// Maps a transport failure onto the acquisition error taxonomy
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Timeout(_) => ErrorClass::Timeout,
            Self::Connect(_) | Self::Tls(_) | Self::Body(_) => ErrorClass::Network,
            Self::Status { .. } => ErrorClass::Protocol,
            Self::Client(_) => ErrorClass::Unknown,
        }
    }

    /// Returns false for failures that will not change on retry (HTTP 4xx)
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status } => !(400..500).contains(status),
            _ => true,
        }
    }
}

/// A successful (2xx) response
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,

    /// URL after following redirects
    pub final_url: Url,

    /// Raw `Content-Type` header value
    pub content_type: Option<String>,

    /// Undecoded body bytes
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Decodes the body using the declared or sniffed charset
    pub fn text(&self) -> Cow<'_, str> {
        decode_body(&self.body, self.content_type.as_deref())
    }
}

/// Outbound HTTP client settings shared by every request
#[derive(Debug, Clone)]
pub struct Transport {
    user_agent: String,
    proxy: ProxyConfig,
    verify_tls: bool,
    max_redirects: usize,
}

impl Transport {
    pub fn new(fetch: &FetchConfig, proxy: &ProxyConfig) -> Self {
        Self {
            user_agent: fetch.user_agent.clone(),
            proxy: proxy.clone(),
            verify_tls: fetch.verify_tls,
            max_redirects: fetch.max_redirects,
        }
    }

    /// Issues one GET request bounded by `timeout`
    ///
    /// `extra_headers` are sent on top of the default `Accept` and
    /// `Accept-Language` headers. Any non-2xx final status is an error.
    pub async fn get(
        &self,
        url: &Url,
        extra_headers: &HeaderMap,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let client = self.build_client(url, timeout)?;

        let response = client
            .get(url.clone())
            .headers(extra_headers.clone())
            .send()
            .await
            .map_err(|e| classify_error(&e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Body(e.to_string())
            }
        })?;

        Ok(TransportResponse {
            status: status.as_u16(),
            final_url,
            content_type,
            body: body.to_vec(),
        })
    }

    fn build_client(&self, url: &Url, timeout: Duration) -> Result<Client, TransportError> {
        let builder = Client::builder()
            .user_agent(&self.user_agent)
            .default_headers(default_headers())
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(Policy::limited(self.max_redirects))
            .danger_accept_invalid_certs(!self.verify_tls)
            .pool_max_idle_per_host(0)
            .gzip(true)
            .brotli(true);

        // Without an explicit proxy, connect directly; environment proxies are ignored
        let builder = match select_proxy(&self.proxy, url) {
            Some(proxy_url) => {
                let proxy = Proxy::all(proxy_url)
                    .map_err(|e| TransportError::Client(format!("invalid proxy: {}", e)))?;
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        builder
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))
    }
}

/// Picks the proxy for a request: the scheme-specific proxy first, SOCKS5 as
/// the catch-all
pub fn select_proxy<'a>(proxy: &'a ProxyConfig, url: &Url) -> Option<&'a str> {
    let scheme_proxy = match url.scheme() {
        "http" => proxy.http.as_deref(),
        "https" => proxy.https.as_deref(),
        _ => None,
    };
    scheme_proxy.or(proxy.socks5.as_deref())
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE),
    );
    headers
}

fn classify_error(error: &reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout)
    } else if is_tls_error(error) {
        TransportError::Tls(error_chain(error))
    } else if error.is_connect() {
        TransportError::Connect(error_chain(error))
    } else if error.is_body() || error.is_decode() {
        TransportError::Body(error_chain(error))
    } else {
        TransportError::Client(error_chain(error))
    }
}

/// TLS failures surface as connect errors; tell them apart by the cause chain
fn is_tls_error(error: &reqwest::Error) -> bool {
    let chain = error_chain(error).to_lowercase();
    ["certificate", "tls", "handshake"]
        .iter()
        .any(|needle| chain.contains(needle))
}

fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
