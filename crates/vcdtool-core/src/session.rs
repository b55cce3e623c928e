//! Authenticated HTTP session.
//!
//! [`Transport`] is the seam every flow talks through. [`Session`] implements
//! it over a blocking `reqwest` client and attaches the `Accept` and
//! authorization headers to every request. Content headers are supplied per
//! request, never stored on the session.

use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;

use reqwest::blocking::{Body, Client};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};

/// Header carrying the session token issued at login.
pub const AUTH_HEADER: &str = "x-vcloud-authorization";

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// No body.
    Empty,
    /// An XML or text document.
    Text(String),
    /// Raw bytes held in memory.
    Bytes(Vec<u8>),
    /// A local file streamed from disk.
    File(PathBuf),
}

/// One HTTP request against an href.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub href: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl Request {
    /// Create a request without headers or body.
    pub fn new(method: Method, href: impl Into<String>) -> Self {
        Self {
            method,
            href: href.into(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// Set the `Content-Type` header.
    pub fn content_type(mut self, content_type: &str) -> Result<Self> {
        let value = HeaderValue::from_str(content_type)
            .map_err(|e| Error::config(format!("invalid content type '{}': {}", content_type, e)))?;
        self.headers.insert(CONTENT_TYPE, value);
        Ok(self)
    }

    /// Set the request body.
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// The `Content-Type` header, if set.
    pub fn content_type_header(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Response {
    /// Create a response with a status and body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the status signals a newly created or returned entity.
    pub fn is_created(&self) -> bool {
        self.status == 200 || self.status == 201
    }

    /// Turn a non-2xx response into an error for `href`.
    pub fn ensure_success(self, href: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::unexpected_status(self.status, href))
        }
    }
}

/// Sends requests to the API.
pub trait Transport {
    /// Resolve a path relative to the API root, e.g. `org` or `sessions`.
    fn endpoint(&self, path: &str) -> String;

    /// Perform a single request.
    fn send(&self, request: Request) -> Result<Response>;

    /// GET an href.
    fn get(&self, href: &str) -> Result<Response> {
        self.send(Request::new(Method::GET, href))
    }

    /// GET an href and fail on a non-2xx status.
    fn get_ok(&self, href: &str) -> Result<Response> {
        self.get(href)?.ensure_success(href)
    }

    /// POST a body with a content type.
    fn post(&self, href: &str, content_type: &str, body: RequestBody) -> Result<Response> {
        self.send(Request::new(Method::POST, href).content_type(content_type)?.body(body))
    }

    /// PUT a body, with an optional content type.
    fn put(&self, href: &str, content_type: Option<&str>, body: RequestBody) -> Result<Response> {
        let mut request = Request::new(Method::PUT, href);
        if let Some(content_type) = content_type {
            request = request.content_type(content_type)?;
        }
        self.send(request.body(body))
    }

    /// DELETE an href.
    fn delete(&self, href: &str) -> Result<Response> {
        self.send(Request::new(Method::DELETE, href))
    }
}

/// An HTTP session against one vCloud Director installation.
pub struct Session {
    client: Client,
    config: ConnectionConfig,
    token: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("api_url", &self.config.api_url)
            .field("username", &self.config.username)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl Session {
    /// Build a session. No request is sent until [`Session::login`].
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.request_timeout())
            .build()?;

        if !config.verify_tls {
            warn!("TLS certificate verification is disabled");
        }

        Ok(Self {
            client,
            config,
            token: None,
        })
    }

    /// Whether a token has been obtained.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Log in with basic credentials and store the returned token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when the server does not hand out a token.
    /// This is not retried: it means the credentials or the URL are wrong.
    pub fn login(&mut self) -> Result<()> {
        let url = self.endpoint("sessions");
        debug!(%url, "logging in");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header(ACCEPT, self.accept_header())
            .send()?;

        let status = response.status();
        let token = response
            .headers()
            .get(AUTH_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::auth(format!(
                    "server returned {} without an {} header",
                    status, AUTH_HEADER
                ))
            })?;

        info!(user = %self.config.username, "login successful");
        self.token = Some(token);
        Ok(())
    }

    /// Delete the server-side session.
    ///
    /// Failures are logged and otherwise ignored; the server expires idle
    /// sessions on its own.
    pub fn logout(&mut self) {
        if self.token.is_none() {
            return;
        }

        let url = self.endpoint("session");
        match self.delete(&url) {
            Ok(response) if response.status == 200 || response.status == 204 => {
                debug!("logout successful");
            }
            Ok(response) => {
                warn!(status = response.status, body = %response.body, "logout failed");
            }
            Err(e) => {
                warn!(error = %e, "logout failed");
            }
        }
        self.token = None;
    }

    fn accept_header(&self) -> String {
        format!("application/*+xml;version={}", self.config.api_version)
    }

    fn build_headers(&self, request_headers: HeaderMap) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let accept = HeaderValue::from_str(&self.accept_header())
            .map_err(|e| Error::config(format!("invalid api_version: {}", e)))?;
        headers.insert(ACCEPT, accept);

        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(token)
                .map_err(|e| Error::auth(format!("unusable token: {}", e)))?;
            headers.insert(HeaderName::from_static(AUTH_HEADER), value);
        }

        headers.extend(request_headers);
        Ok(headers)
    }
}

impl Transport for Session {
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn send(&self, request: Request) -> Result<Response> {
        debug!(method = %request.method, href = %request.href, "request");

        let headers = self.build_headers(request.headers)?;
        let mut builder = self
            .client
            .request(request.method, &request.href)
            .headers(headers);

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Text(text) => builder.body(text),
            RequestBody::Bytes(bytes) => builder.body(bytes),
            RequestBody::File(path) => {
                let file = File::open(&path).map_err(|e| Error::io(e, &path))?;
                builder.body(Body::from(file))
            }
        };

        let response = builder.send()?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text()?;

        debug!(status, "response");
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
