use std::borrow::Cow;
use std::time::{Duration, Instant};

use ureq::ResponseExt;
use ureq::http::header::{ACCEPT_ENCODING, CONTENT_TYPE};
use ureq::http::{Method, Request, Response};
use ureq::tls::{PemItem, RootCerts, TlsConfig, TlsProvider};

use super::{
    OptionError, Transport, TransportError, TransportHandle, TransportInfo, TransportInitError,
};
use crate::error::TransportErrorKind;
use crate::options::{OptionValue, TransportOption};

pub const DEFAULT_USER_AGENT: &str = concat!("reqcat/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// `CaInfo` value that selects the CA bundle compiled into the crate.
pub const DEFAULT_CA_BUNDLE: &str = "reqcat:bundled/cacert.pem";
const BUNDLED_CA_PEM: &[u8] = include_bytes!("../../certs/cacert.pem");

/// Content codings this transport can decode.
const DECODABLE_ENCODINGS: [&str; 2] = ["gzip", "identity"];

const fn default_tls_provider() -> TlsProvider {
    #[cfg(feature = "tls-rustls")]
    {
        return TlsProvider::Rustls;
    }
    #[cfg(all(not(feature = "tls-rustls"), feature = "tls-native"))]
    {
        return TlsProvider::NativeTls;
    }
    #[allow(unreachable_code)]
    TlsProvider::Rustls
}

/// Default transport backed by a blocking `ureq` agent.
#[derive(Clone, Debug)]
pub struct UreqTransport {
    user_agent: String,
    max_redirects: u32,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// User agent sent when the request sets no `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Redirect limit used when a request enables redirect following.
    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects.max(1);
        self
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn open(&self) -> Result<Box<dyn TransportHandle>, TransportInitError> {
        Ok(Box::new(UreqHandle {
            transport: self.clone(),
            settings: HandleSettings::default(),
            info: TransportInfo::default(),
        }))
    }
}

enum OutgoingBody {
    Text(String),
    Form(Vec<(String, String)>),
}

impl OutgoingBody {
    fn encode(&self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.clone().into_bytes(),
            Self::Form(fields) => {
                let mut serializer = url::form_urlencoded::Serializer::new(String::new());
                for (name, value) in fields {
                    serializer.append_pair(name, value);
                }
                serializer.finish().into_bytes()
            }
        }
    }
}

#[derive(Default)]
struct HandleSettings {
    method: Option<String>,
    url: Option<String>,
    headers: Vec<String>,
    body: Option<OutgoingBody>,
    encoding: Option<String>,
    timeout_secs: Option<u64>,
    timeout_ms: Option<u64>,
    ca_info: Option<String>,
    verify_peer: Option<bool>,
    follow_location: bool,
    report_headers: bool,
}

impl HandleSettings {
    fn deadline(&self) -> Option<Duration> {
        let from_secs = self.timeout_secs.map(Duration::from_secs);
        let from_ms = self.timeout_ms.map(Duration::from_millis);
        match (from_secs, from_ms) {
            (Some(secs), Some(ms)) => Some(secs.min(ms)),
            (secs, ms) => secs.or(ms),
        }
        .filter(|deadline| !deadline.is_zero())
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|line| {
            line.split_once(':')
                .is_some_and(|(existing, _)| existing.trim().eq_ignore_ascii_case(name))
        })
    }
}

struct UreqHandle {
    transport: UreqTransport,
    settings: HandleSettings,
    info: TransportInfo,
}

fn expect_text<'a>(option: &TransportOption, value: &'a OptionValue) -> Result<&'a str, OptionError> {
    value
        .as_text()
        .ok_or_else(|| OptionError::mistyped(option, "text", value))
}

fn expect_int(option: &TransportOption, value: &OptionValue) -> Result<u64, OptionError> {
    value
        .as_int()
        .ok_or_else(|| OptionError::mistyped(option, "int", value))
}

fn expect_bool(option: &TransportOption, value: &OptionValue) -> Result<bool, OptionError> {
    value
        .as_bool()
        .ok_or_else(|| OptionError::mistyped(option, "bool", value))
}

impl TransportHandle for UreqHandle {
    fn set_option(
        &mut self,
        option: &TransportOption,
        value: &OptionValue,
    ) -> Result<(), OptionError> {
        match option {
            TransportOption::CustomRequest => {
                let method = expect_text(option, value)?;
                Method::from_bytes(method.as_bytes())
                    .map_err(|_| OptionError::new(format!("invalid request method {method:?}")))?;
                self.settings.method = Some(method.to_owned());
            }
            TransportOption::Url => {
                self.settings.url = Some(expect_text(option, value)?.to_owned());
            }
            TransportOption::HttpHeader => {
                let lines = value
                    .as_list()
                    .ok_or_else(|| OptionError::mistyped(option, "list", value))?;
                if let Some(line) = lines.iter().find(|line| !line.contains(':')) {
                    return Err(OptionError::new(format!("malformed header line {line:?}")));
                }
                self.settings.headers = lines.to_vec();
            }
            TransportOption::PostFields => {
                self.settings.body = match value {
                    OptionValue::Text(text) => Some(OutgoingBody::Text(text.clone())),
                    OptionValue::Pairs(fields) => Some(OutgoingBody::Form(fields.clone())),
                    other => return Err(OptionError::mistyped(option, "text or pairs", other)),
                };
            }
            TransportOption::Encoding => {
                let encoding = expect_text(option, value)?;
                check_encoding(encoding)?;
                self.settings.encoding = Some(encoding.to_owned());
            }
            TransportOption::Timeout => {
                self.settings.timeout_secs = Some(expect_int(option, value)?);
            }
            TransportOption::TimeoutMs => {
                self.settings.timeout_ms = Some(expect_int(option, value)?);
            }
            TransportOption::CaInfo => {
                self.settings.ca_info = Some(expect_text(option, value)?.to_owned());
            }
            TransportOption::SslVerifyPeer => {
                self.settings.verify_peer = Some(expect_bool(option, value)?);
            }
            TransportOption::FollowLocation => {
                self.settings.follow_location = expect_bool(option, value)?;
            }
            TransportOption::ReturnTransfer => {
                if !expect_bool(option, value)? {
                    return Err(OptionError::new(
                        "unbuffered responses are not supported by this transport",
                    ));
                }
            }
            TransportOption::HeaderFunction => {
                self.settings.report_headers = expect_bool(option, value)?;
            }
            TransportOption::Other(_) => return Err(OptionError::unsupported(option)),
        }
        Ok(())
    }

    fn execute(
        &mut self,
        on_header_line: &mut dyn FnMut(&str) -> usize,
    ) -> Result<String, TransportError> {
        self.info = TransportInfo::default();
        let started_at = Instant::now();
        let url = self
            .settings
            .url
            .clone()
            .ok_or_else(|| TransportError::new(TransportErrorKind::Other, "no url set"))?;
        let method = match &self.settings.method {
            Some(method) => method.clone(),
            None if self.settings.body.is_some() => Method::POST.as_str().to_owned(),
            None => Method::GET.as_str().to_owned(),
        };
        let agent = self.build_agent()?;

        let mut builder = Request::builder().method(method.as_str()).uri(url.as_str());
        for line in &self.settings.headers {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            builder = builder.header(name.trim(), value.trim());
        }
        if let Some(encoding) = self.settings.encoding.as_deref()
            && !encoding.is_empty()
            && !self.settings.has_header(ACCEPT_ENCODING.as_str())
        {
            builder = builder.header(ACCEPT_ENCODING, encoding);
        }

        let mut response = match &self.settings.body {
            None => {
                let request = builder.body(()).map_err(request_build_error)?;
                run_request(&agent, request)?
            }
            Some(body) => {
                if !self.settings.has_header(CONTENT_TYPE.as_str()) {
                    builder = builder.header(CONTENT_TYPE, FORM_CONTENT_TYPE);
                }
                let request = builder.body(body.encode()).map_err(request_build_error)?;
                run_request(&agent, request)?
            }
        };

        self.info = response_info(&response, started_at);
        if self.settings.report_headers {
            report_header_lines(&response, on_header_line)?;
        }

        let bytes = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(map_ureq_error)?;
        self.info.total_time = Some(started_at.elapsed());
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn info(&self) -> TransportInfo {
        self.info.clone()
    }
}

impl UreqHandle {
    fn build_agent(&self) -> Result<ureq::Agent, TransportError> {
        let max_redirects = if self.settings.follow_location {
            self.transport.max_redirects
        } else {
            0
        };
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .allow_non_standard_methods(true)
            .user_agent(self.transport.user_agent.as_str())
            .max_redirects(max_redirects)
            .timeout_global(self.settings.deadline())
            .tls_config(self.build_tls_config()?)
            .build();
        Ok(config.new_agent())
    }

    fn build_tls_config(&self) -> Result<TlsConfig, TransportError> {
        let mut builder = TlsConfig::builder().provider(default_tls_provider());
        if self.settings.verify_peer == Some(false) {
            builder = builder.disable_verification(true);
        }
        if let Some(path) = &self.settings.ca_info {
            let pem = load_ca_pem(path)?;
            let roots = parse_pem_certificates(&pem, path)?;
            builder = builder.root_certs(RootCerts::new_with_certs(&roots));
        }
        Ok(builder.build())
    }
}

fn check_encoding(encoding: &str) -> Result<(), OptionError> {
    if encoding.is_empty() {
        return Ok(());
    }
    for coding in encoding.split(',').map(str::trim) {
        let name = coding.split(';').next().unwrap_or_default().trim();
        if !DECODABLE_ENCODINGS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(name))
        {
            return Err(OptionError::new(format!(
                "content coding {coding:?} cannot be decoded; supported: {}",
                DECODABLE_ENCODINGS.join(", ")
            )));
        }
    }
    Ok(())
}

fn load_ca_pem(path: &str) -> Result<Cow<'static, [u8]>, TransportError> {
    if path == DEFAULT_CA_BUNDLE {
        return Ok(Cow::Borrowed(BUNDLED_CA_PEM));
    }
    std::fs::read(path).map(Cow::Owned).map_err(|source| {
        TransportError::new(
            TransportErrorKind::Tls,
            format!("failed to read CA bundle {path}: {source}"),
        )
        .with_source(source)
    })
}

fn parse_pem_certificates(
    pem_bundle: &[u8],
    path: &str,
) -> Result<Vec<ureq::tls::Certificate<'static>>, TransportError> {
    let mut certificates = Vec::new();
    for item in ureq::tls::parse_pem(pem_bundle) {
        let item = item.map_err(|source| {
            TransportError::new(
                TransportErrorKind::Tls,
                format!("failed to parse PEM bundle {path}: {source}"),
            )
        })?;
        if let PemItem::Certificate(certificate) = item {
            certificates.push(certificate);
        }
    }
    if certificates.is_empty() {
        return Err(TransportError::new(
            TransportErrorKind::Tls,
            format!("no certificate blocks found in PEM bundle {path}"),
        ));
    }
    Ok(certificates)
}

fn run_request<S: ureq::AsSendBody>(
    agent: &ureq::Agent,
    request: Request<S>,
) -> Result<Response<ureq::Body>, TransportError> {
    agent.run(request).map_err(map_ureq_error)
}

fn request_build_error(source: ureq::http::Error) -> TransportError {
    TransportError::new(
        TransportErrorKind::Other,
        format!("failed to build http request: {source}"),
    )
    .with_source(source)
}

fn response_info(response: &Response<ureq::Body>, started_at: Instant) -> TransportInfo {
    TransportInfo {
        status: Some(response.status().as_u16()),
        content_type: response
            .headers()
            .get(CONTENT_TYPE)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned()),
        effective_url: Some(response.get_uri().to_string()),
        total_time: Some(started_at.elapsed()),
        http_version: Some(format!("{:?}", response.version())),
    }
}

fn report_header_lines(
    response: &Response<ureq::Body>,
    on_header_line: &mut dyn FnMut(&str) -> usize,
) -> Result<(), TransportError> {
    let status = response.status();
    let mut lines = Vec::with_capacity(response.headers().len() + 2);
    lines.push(format!(
        "{:?} {} {}\r\n",
        response.version(),
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    ));
    for (name, value) in response.headers() {
        lines.push(format!(
            "{}: {}\r\n",
            name.as_str(),
            String::from_utf8_lossy(value.as_bytes())
        ));
    }
    lines.push("\r\n".to_owned());

    for line in &lines {
        let consumed = on_header_line(line);
        if consumed != line.len() {
            return Err(TransportError::new(
                TransportErrorKind::Other,
                format!(
                    "header callback consumed {consumed} of {} bytes",
                    line.len()
                ),
            ));
        }
    }
    Ok(())
}

fn map_ureq_error(error: ureq::Error) -> TransportError {
    let kind = classify_ureq_error(&error);
    TransportError::new(kind, error.to_string()).with_source(error)
}

fn classify_ureq_error(error: &ureq::Error) -> TransportErrorKind {
    match error {
        ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
        ureq::Error::HostNotFound => TransportErrorKind::Dns,
        ureq::Error::Tls(_) => TransportErrorKind::Tls,
        #[cfg(feature = "tls-rustls")]
        ureq::Error::Rustls(_) => TransportErrorKind::Tls,
        #[cfg(feature = "tls-native")]
        ureq::Error::NativeTls(_) => TransportErrorKind::Tls,
        ureq::Error::ConnectProxyFailed(_) | ureq::Error::ConnectionFailed => {
            TransportErrorKind::Connect
        }
        ureq::Error::Io(source) => match source.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                TransportErrorKind::Timeout
            }
            std::io::ErrorKind::NotFound => TransportErrorKind::Dns,
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::AddrNotAvailable => TransportErrorKind::Connect,
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof => TransportErrorKind::Read,
            _ => TransportErrorKind::Other,
        },
        _ => TransportErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_CA_BUNDLE, HandleSettings, UreqHandle, UreqTransport, load_ca_pem,
        parse_pem_certificates,
    };
    use crate::options::{OptionValue, TransportOption};
    use crate::transport::{Transport, TransportInfo};

    #[test]
    fn deadline_uses_the_smaller_timeout() {
        let settings = HandleSettings {
            timeout_secs: Some(3),
            timeout_ms: Some(1500),
            ..HandleSettings::default()
        };
        assert_eq!(
            settings.deadline(),
            Some(std::time::Duration::from_millis(1500))
        );
        assert_eq!(HandleSettings::default().deadline(), None);
    }

    #[test]
    fn header_lookup_ignores_case() {
        let settings = HandleSettings {
            headers: vec!["content-type: text/plain".to_owned()],
            ..HandleSettings::default()
        };
        assert!(settings.has_header("Content-Type"));
        assert!(!settings.has_header("Accept-Encoding"));
    }

    #[test]
    fn unknown_and_mistyped_options_are_rejected() {
        let mut handle = UreqTransport::new().open().expect("open handle");
        let error = handle
            .set_option(
                &TransportOption::Other("proxy".to_owned()),
                &OptionValue::Text("http://127.0.0.1:3128".to_owned()),
            )
            .expect_err("unknown option should be rejected");
        assert!(error.message().contains("proxy"));

        let error = handle
            .set_option(&TransportOption::Timeout, &OptionValue::Text("5".to_owned()))
            .expect_err("mistyped option should be rejected");
        assert!(error.message().contains("int"));

        assert!(
            handle
                .set_option(
                    &TransportOption::CustomRequest,
                    &OptionValue::Text("BAD METHOD".to_owned())
                )
                .is_err()
        );
        assert!(
            handle
                .set_option(
                    &TransportOption::CustomRequest,
                    &OptionValue::Text("PURGE".to_owned())
                )
                .is_ok()
        );
    }

    #[test]
    fn unbuffered_transfer_is_rejected() {
        let mut handle = UreqTransport::new().open().expect("open handle");
        assert!(
            handle
                .set_option(&TransportOption::ReturnTransfer, &OptionValue::Bool(false))
                .is_err()
        );
        assert!(
            handle
                .set_option(&TransportOption::ReturnTransfer, &OptionValue::Bool(true))
                .is_ok()
        );
    }

    #[test]
    fn bundled_ca_loads_without_the_filesystem() {
        let pem = load_ca_pem(DEFAULT_CA_BUNDLE).expect("bundled CA is embedded");
        let roots = parse_pem_certificates(&pem, DEFAULT_CA_BUNDLE).expect("bundled CA parses");
        assert!(!roots.is_empty());

        let handle = UreqHandle {
            transport: UreqTransport::new(),
            settings: HandleSettings {
                ca_info: Some(DEFAULT_CA_BUNDLE.to_owned()),
                verify_peer: Some(true),
                ..HandleSettings::default()
            },
            info: TransportInfo::default(),
        };
        assert!(handle.build_tls_config().is_ok());
    }

    #[test]
    fn missing_ca_file_is_a_tls_error() {
        let error = load_ca_pem("/nonexistent/reqcat/ca.pem").expect_err("missing file");
        assert_eq!(error.kind(), crate::error::TransportErrorKind::Tls);
    }

    #[test]
    fn only_decodable_encodings_are_accepted() {
        let mut handle = UreqTransport::new().open().expect("open handle");
        for accepted in ["", "gzip", "GZIP", "gzip, identity", "gzip;q=1.0"] {
            assert!(
                handle
                    .set_option(
                        &TransportOption::Encoding,
                        &OptionValue::Text(accepted.to_owned())
                    )
                    .is_ok(),
                "{accepted:?} should be accepted"
            );
        }
        let error = handle
            .set_option(&TransportOption::Encoding, &OptionValue::Text("br".to_owned()))
            .expect_err("brotli cannot be decoded");
        assert!(error.message().contains("\"br\""));
        assert!(
            handle
                .set_option(
                    &TransportOption::Encoding,
                    &OptionValue::Text("gzip, deflate".to_owned())
                )
                .is_err()
        );
    }
}
