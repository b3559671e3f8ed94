use std::sync::Arc;

use http::Method;
use serde::Serialize;
use tracing::warn;

use crate::error::Error;
use crate::extensions::{Sleeper, ThreadSleeper};
use crate::headers::{CONTENT_TYPE, RequestHeaders, USER_AGENT};
use crate::options::{OptionValue, TransportOption, TransportOptions};
use crate::response::Execution;
use crate::retry::RetryPolicy;
use crate::transport::{DEFAULT_CA_BUNDLE, Transport, TransportHandle, UreqTransport};
use crate::util::{append_encoded_query, build_url};

pub(crate) const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestBody {
    /// Field pairs, encoded by the transport.
    Form(Vec<(String, String)>),
    /// Literal text sent as is.
    Text(String),
}

impl RequestBody {
    pub(crate) fn to_option_value(&self) -> OptionValue {
        match self {
            Self::Form(fields) => OptionValue::Pairs(fields.clone()),
            Self::Text(text) => OptionValue::Text(text.clone()),
        }
    }
}

pub(crate) enum Lifecycle {
    Idle,
    Done(Execution),
}

/// A single HTTP request, configured fluently and fetched exactly once.
///
/// Each request owns one transport handle for its whole lifetime. After
/// [`Request::fetch`] the request becomes read-only and the response
/// accessors start working.
///
/// ```no_run
/// use std::time::Duration;
///
/// let mut request = reqcat::Request::new()?
///     .post()
///     .url_with("https://api.example.com/v1/items", [("dry_run", "1")])
///     .user_agent("inventory-sync/1.0")
///     .body_json(&serde_json::json!({ "name": "demo" }))?
///     .timeout(5)
///     .attempts(3, Duration::from_millis(200))?;
///
/// let created = request.fetch_json(true)?;
/// println!("{} after {} attempts", created["id"], request.attempts_used()?);
/// # Ok::<(), reqcat::Error>(())
/// ```
pub struct Request {
    transport: Arc<dyn Transport>,
    pub(crate) handle: Box<dyn TransportHandle>,
    pub(crate) headers: RequestHeaders,
    pub(crate) options: TransportOptions,
    pub(crate) body: Option<RequestBody>,
    pub(crate) ignore_http_code: bool,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) sleeper: Arc<dyn Sleeper>,
    pub(crate) lifecycle: Lifecycle,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Request")
            .field("headers", &self.headers)
            .field("options", &self.options)
            .field("body", &self.body)
            .field("ignore_http_code", &self.ignore_http_code)
            .field("retry_policy", &self.retry_policy)
            .field("fetched", &self.is_fetched())
            .finish()
    }
}

impl Request {
    /// Creates a request on the default `ureq` transport.
    pub fn new() -> crate::Result<Self> {
        Self::with_transport(Arc::new(UreqTransport::new()))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> crate::Result<Self> {
        let handle = transport.open().map_err(|error| Error::TransportInit {
            message: error.message().to_owned(),
        })?;
        Ok(Self {
            transport,
            handle,
            headers: RequestHeaders::new(),
            options: TransportOptions::new(),
            body: None,
            ignore_http_code: false,
            retry_policy: RetryPolicy::disabled(),
            sleeper: Arc::new(ThreadSleeper),
            lifecycle: Lifecycle::Idle,
        })
    }

    /// Copies the request description into a fresh, unfetched request with
    /// its own transport handle.
    pub fn duplicate(&self) -> crate::Result<Self> {
        let mut duplicate = Self::with_transport(Arc::clone(&self.transport))?;
        duplicate.headers = self.headers.clone();
        duplicate.options = self.options.clone();
        duplicate.body = self.body.clone();
        duplicate.ignore_http_code = self.ignore_http_code;
        duplicate.retry_policy = self.retry_policy;
        duplicate.sleeper = Arc::clone(&self.sleeper);
        Ok(duplicate)
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Done(_))
    }

    pub fn headers(&self) -> &RequestHeaders {
        &self.headers
    }

    pub fn request_body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    pub fn transport_options(&self) -> &TransportOptions {
        &self.options
    }

    pub fn current_retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    fn configure(mut self, apply: impl FnOnce(&mut Self)) -> Self {
        if self.is_fetched() {
            warn!("request already fetched; ignoring configuration change");
            return self;
        }
        apply(&mut self);
        self
    }

    /// Sets the method literal. The transport validates it when the request is fetched.
    pub fn method(self, method: impl Into<String>) -> Self {
        let method = method.into();
        self.configure(|request| {
            request
                .options
                .set(TransportOption::CustomRequest, OptionValue::Text(method));
        })
    }

    pub fn get(self) -> Self {
        self.method(Method::GET.as_str())
    }

    pub fn post(self) -> Self {
        self.method(Method::POST.as_str())
    }

    pub fn put(self) -> Self {
        self.method(Method::PUT.as_str())
    }

    pub fn patch(self) -> Self {
        self.method(Method::PATCH.as_str())
    }

    pub fn delete(self) -> Self {
        self.method(Method::DELETE.as_str())
    }

    pub fn head(self) -> Self {
        self.method(Method::HEAD.as_str())
    }

    pub fn options(self) -> Self {
        self.method(Method::OPTIONS.as_str())
    }

    pub fn trace(self) -> Self {
        self.method(Method::TRACE.as_str())
    }

    pub fn url(self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.configure(|request| request.options.set(TransportOption::Url, url))
    }

    /// Sets the url with `params` appended to its query string.
    pub fn url_with<K, V, I>(self, url: &str, params: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut params = params.into_iter().peekable();
        if params.peek().is_none() {
            return self.url(url);
        }
        self.url(build_url(url, params))
    }

    /// Like [`Request::url_with`], encoding any serializable value as the query.
    pub fn url_query<T>(self, url: &str, params: &T) -> crate::Result<Self>
    where
        T: Serialize + ?Sized,
    {
        let query = serde_urlencoded::to_string(params)
            .map_err(|source| Error::SerializeQuery { source })?;
        if query.is_empty() {
            return Ok(self.url(url));
        }
        Ok(self.url(append_encoded_query(url, &query)))
    }

    /// Sets a header, or removes it when `value` is `None`.
    ///
    /// The name is used exactly as given.
    pub fn header(self, name: &str, value: Option<&str>) -> Self {
        self.configure(|request| request.headers.set(name, value))
    }

    pub fn content_type(self, mime: &str) -> Self {
        self.header(CONTENT_TYPE, Some(mime))
    }

    pub fn user_agent(self, user_agent: &str) -> Self {
        self.header(USER_AGENT, Some(user_agent))
    }

    /// Value for `Accept-Encoding`. An empty string keeps the transport default.
    ///
    /// The `ureq` transport only decodes `gzip` and `identity` and rejects
    /// other codings when the request is fetched.
    pub fn encoding(self, encoding: &str) -> Self {
        self.setopt(TransportOption::Encoding, encoding)
    }

    /// Form body from field pairs. Clears `Content-Type` so the transport picks the form type.
    pub fn body<K, V, I>(self, fields: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let fields = fields
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        self.configure(|request| {
            request.headers.set(CONTENT_TYPE, None);
            request.body = Some(RequestBody::Form(fields));
        })
    }

    /// Pre-encoded form body. Clears `Content-Type`.
    pub fn body_urlencoded(self, encoded: impl Into<String>) -> Self {
        let encoded = encoded.into();
        self.configure(|request| {
            request.headers.set(CONTENT_TYPE, None);
            request.body = Some(RequestBody::Text(encoded));
        })
    }

    /// Literal body. A non-empty `mime` also sets `Content-Type`.
    pub fn body_raw(self, body: impl Into<String>, mime: &str) -> Self {
        let body = body.into();
        self.configure(|request| {
            request.body = Some(RequestBody::Text(body));
            if !mime.is_empty() {
                request.headers.set(CONTENT_TYPE, Some(mime));
            }
        })
    }

    pub fn body_json<T>(self, payload: &T) -> crate::Result<Self>
    where
        T: Serialize + ?Sized,
    {
        let body =
            serde_json::to_string(payload).map_err(|source| Error::SerializeJson { source })?;
        Ok(self.body_raw(body, JSON_CONTENT_TYPE))
    }

    pub fn setopt(self, option: TransportOption, value: impl Into<OptionValue>) -> Self {
        let value = value.into();
        self.configure(|request| request.options.set(option, value))
    }

    pub fn unsetopt(self, option: TransportOption) -> Self {
        self.configure(|request| {
            request.options.unset(&option);
        })
    }

    pub fn timeout(self, seconds: u64) -> Self {
        self.setopt(TransportOption::Timeout, seconds)
    }

    pub fn timeout_ms(self, milliseconds: u64) -> Self {
        self.setopt(TransportOption::TimeoutMs, milliseconds)
    }

    /// Turns on peer verification against `ca_file`, or the CA bundle compiled
    /// into the crate ([`DEFAULT_CA_BUNDLE`]) when empty.
    pub fn ssl_verify(self, ca_file: &str) -> Self {
        let ca_file = if ca_file.is_empty() {
            DEFAULT_CA_BUNDLE
        } else {
            ca_file
        };
        self.setopt(TransportOption::CaInfo, ca_file)
            .setopt(TransportOption::SslVerifyPeer, true)
    }

    pub fn follow_location(self, follow: bool) -> Self {
        self.setopt(TransportOption::FollowLocation, follow)
    }

    /// Treat any final status as success.
    pub fn ignore_code(self, ignore: bool) -> Self {
        self.configure(|request| request.ignore_http_code = ignore)
    }

    /// Total attempts and the pause between them.
    pub fn attempts(self, times: u32, interval: std::time::Duration) -> crate::Result<Self> {
        let retry_policy = RetryPolicy::new(times, interval)?;
        Ok(self.retry_policy(retry_policy))
    }

    pub fn retry_policy(self, retry_policy: RetryPolicy) -> Self {
        self.configure(|request| request.retry_policy = retry_policy)
    }

    pub fn sleeper(self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.configure(|request| request.sleeper = sleeper)
    }
}
