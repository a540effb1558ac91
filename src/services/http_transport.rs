//! HTTP transport abstraction.
//!
//! The REST client and the device flow talk to the network only through
//! [`HttpTransport`]. [`ReqwestTransport`] is the production implementation;
//! [`ScriptedTransport`] replays canned responses for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::types::errors::ApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("gitdesk/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub follow_redirects: bool,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            follow_redirects: true,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        self.body = RequestBody::Form(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    pub fn no_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    /// Path component of the URL, e.g. `/user/repos`.
    pub fn path(&self) -> String {
        reqwest::Url::parse(&self.url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| self.url.clone())
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn status_only(status: u16) -> Self {
        Self::new(status, Vec::new())
    }

    pub fn json_body(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Download progress callback: `(bytes_so_far, total_if_known)`.
pub type ProgressFn<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// Sends HTTP requests. Implementations must be safe to share across tasks.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;

    /// Streams a successful response body into `sink`, returning the byte count.
    async fn download(
        &self,
        request: HttpRequest,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
        progress: ProgressFn<'_>,
    ) -> Result<u64, ApiError>;
}

/// Production transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
    no_redirect_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ApiError> {
        let build = |policy: reqwest::redirect::Policy| {
            reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(REQUEST_TIMEOUT)
                .redirect(policy)
                .build()
                .map_err(|e| ApiError::Network(e.to_string()))
        };
        Ok(Self {
            client: build(reqwest::redirect::Policy::limited(10))?,
            no_redirect_client: build(reqwest::redirect::Policy::none())?,
        })
    }

    fn build(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let client = if request.follow_redirects {
            &self.client
        } else {
            &self.no_redirect_client
        };
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = client.request(method, &request.url).query(&request.query);
        for (k, v) in &request.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }
        match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(v) => builder.json(v),
            RequestBody::Form(fields) => builder.form(fields),
        }
    }
}

fn network_error(e: reqwest::Error) -> ApiError {
    ApiError::Network(e.to_string())
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        trace!(method = request.method.as_str(), url = %request.url, "http request");
        let response = self.build(&request).send().await.map_err(network_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await.map_err(network_error)?.to_vec();
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn download(
        &self,
        request: HttpRequest,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
        progress: ProgressFn<'_>,
    ) -> Result<u64, ApiError> {
        let path = request.path();
        let response = self.build(&request).send().await.map_err(network_error)?;
        let status = response.status().as_u16();
        if status == 401 {
            return Err(ApiError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(ApiError::Status { status, path });
        }
        let total = response.content_length();
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(network_error)?;
            sink.write_all(&chunk)
                .await
                .map_err(|e| ApiError::Io(e.to_string()))?;
            downloaded += chunk.len() as u64;
            progress(downloaded, total);
        }
        sink.flush().await.map_err(|e| ApiError::Io(e.to_string()))?;
        Ok(downloaded)
    }
}

struct Route {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    responses: VecDeque<Result<HttpResponse, String>>,
}

impl Route {
    fn matches(&self, request: &HttpRequest, path: &str) -> bool {
        self.method == request.method
            && self.path == path
            && self
                .query
                .iter()
                .all(|(k, v)| request.query_value(k) == Some(v.as_str()))
    }
}

/// In-memory transport that replays scripted responses.
///
/// Routes match on method, URL path and an optional set of query pairs; the
/// most specific matching route wins. Each route pops its responses in order
/// and keeps returning the last one once the queue is down to a single entry.
/// Every request is recorded.
#[derive(Default, Clone)]
pub struct ScriptedTransport {
    routes: Arc<Mutex<Vec<Route>>>,
    log: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, method: Method, path: &str, response: HttpResponse) {
        self.push_with_query(method, path, &[], response);
    }

    pub fn push_with_query(&self, method: Method, path: &str, query: &[(&str, &str)], response: HttpResponse) {
        self.enqueue(method, path, query, Ok(response));
    }

    /// Scripts a transport-level failure (no HTTP response at all).
    pub fn push_network_error(&self, method: Method, path: &str, message: &str) {
        self.enqueue(method, path, &[], Err(message.to_string()));
    }

    fn enqueue(&self, method: Method, path: &str, query: &[(&str, &str)], entry: Result<HttpResponse, String>) {
        let query: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut routes = self.routes.lock();
        if let Some(route) = routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path && r.query == query)
        {
            route.responses.push_back(entry);
            return;
        }
        routes.push(Route {
            method,
            path: path.to_string(),
            query,
            responses: VecDeque::from([entry]),
        });
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().clone()
    }

    pub fn request_count(&self, method: Method, path: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|r| r.method == method && r.path() == path)
            .count()
    }

    fn next_response(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let path = request.path();
        self.log.lock().push(request.clone());
        let mut routes = self.routes.lock();
        let route = routes
            .iter_mut()
            .filter(|r| r.matches(request, &path))
            .max_by_key(|r| r.query.len())
            .ok_or_else(|| ApiError::Unscripted {
                method: request.method.as_str().to_string(),
                path: path.clone(),
            })?;
        let entry = if route.responses.len() > 1 {
            route.responses.pop_front()
        } else {
            route.responses.front().cloned()
        };
        match entry {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(ApiError::Network(message)),
            None => Err(ApiError::Unscripted {
                method: request.method.as_str().to_string(),
                path,
            }),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.next_response(&request)
    }

    async fn download(
        &self,
        request: HttpRequest,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
        progress: ProgressFn<'_>,
    ) -> Result<u64, ApiError> {
        let response = self.next_response(&request)?;
        if response.status == 401 {
            return Err(ApiError::Unauthorized);
        }
        if !response.is_success() {
            return Err(ApiError::Status {
                status: response.status,
                path: request.path(),
            });
        }
        let total = response.body.len() as u64;
        let mut downloaded = 0u64;
        for chunk in response.body.chunks(8 * 1024) {
            sink.write_all(chunk)
                .await
                .map_err(|e| ApiError::Io(e.to_string()))?;
            downloaded += chunk.len() as u64;
            progress(downloaded, Some(total));
        }
        sink.flush().await.map_err(|e| ApiError::Io(e.to_string()))?;
        Ok(downloaded)
    }
}
