//! Transport seam.
//!
//! A [`Transport`] opens handles; a [`TransportHandle`] owns whatever
//! connection state one request needs. Handles are released by `Drop`.

use std::time::Duration;

use crate::error::TransportErrorKind;
use crate::options::{OptionValue, TransportOption};

mod ureq_agent;

pub use ureq_agent::{
    DEFAULT_CA_BUNDLE, DEFAULT_MAX_REDIRECTS, DEFAULT_USER_AGENT, UreqTransport,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub trait Transport: Send + Sync {
    fn open(&self) -> Result<Box<dyn TransportHandle>, TransportInitError>;
}

pub trait TransportHandle: Send {
    /// Applies one option. Unknown keys and mistyped values are rejected here.
    fn set_option(&mut self, option: &TransportOption, value: &OptionValue)
    -> Result<(), OptionError>;

    /// Runs the request once and returns the buffered body, decoded as UTF-8.
    ///
    /// Every raw header line is passed to `on_header_line` before the body is
    /// read. The callback returns the number of bytes it consumed; any other
    /// value than the line length aborts the exchange.
    fn execute(
        &mut self,
        on_header_line: &mut dyn FnMut(&str) -> usize,
    ) -> Result<String, TransportError>;

    /// Metadata of the last exchange.
    fn info(&self) -> TransportInfo;
}

#[derive(Debug)]
pub struct TransportInitError {
    message: String,
}

impl TransportInitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug)]
pub struct OptionError {
    message: String,
}

impl OptionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(option: &TransportOption) -> Self {
        Self::new(format!("option {option} is not supported by this transport"))
    }

    pub(crate) fn mistyped(option: &TransportOption, expected: &str, value: &OptionValue) -> Self {
        Self::new(format!(
            "option {option} expects a {expected} value, got {}",
            value.kind_name()
        ))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug)]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    source: Option<BoxError>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn into_parts(self) -> (TransportErrorKind, String, Option<BoxError>) {
        (self.kind, self.message, self.source)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InfoKey {
    ResponseCode,
    ContentType,
    EffectiveUrl,
    TotalTime,
    HttpVersion,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InfoValue {
    Code(u16),
    Text(String),
    Elapsed(Duration),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransportInfo {
    pub status: Option<u16>,
    pub content_type: Option<String>,
    pub effective_url: Option<String>,
    pub total_time: Option<Duration>,
    pub http_version: Option<String>,
}

impl TransportInfo {
    pub fn get(&self, key: InfoKey) -> Option<InfoValue> {
        match key {
            InfoKey::ResponseCode => self.status.map(InfoValue::Code),
            InfoKey::ContentType => self.content_type.clone().map(InfoValue::Text),
            InfoKey::EffectiveUrl => self.effective_url.clone().map(InfoValue::Text),
            InfoKey::TotalTime => self.total_time.map(InfoValue::Elapsed),
            InfoKey::HttpVersion => self.http_version.clone().map(InfoValue::Text),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{InfoKey, InfoValue, TransportInfo};

    #[test]
    fn info_lookup_by_key() {
        let info = TransportInfo {
            status: Some(204),
            content_type: None,
            effective_url: Some("http://127.0.0.1/next".to_owned()),
            total_time: Some(Duration::from_millis(12)),
            http_version: Some("HTTP/1.1".to_owned()),
        };
        assert_eq!(info.get(InfoKey::ResponseCode), Some(InfoValue::Code(204)));
        assert_eq!(info.get(InfoKey::ContentType), None);
        assert_eq!(
            info.get(InfoKey::TotalTime),
            Some(InfoValue::Elapsed(Duration::from_millis(12)))
        );
    }
}
