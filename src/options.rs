//! Transport option bag.
//!
//! Options are untyped on purpose: the request only stores them, and the
//! transport handle decides at apply time whether a key and value make sense.

use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum TransportOption {
    /// Request method literal.
    CustomRequest,
    Url,
    /// Wire header lines, `Name: value`.
    HttpHeader,
    /// Request body, either text or form pairs.
    PostFields,
    /// `Accept-Encoding` value; empty keeps the transport default.
    Encoding,
    /// Whole-request deadline in seconds.
    Timeout,
    /// Whole-request deadline in milliseconds.
    TimeoutMs,
    /// Path of a PEM bundle with trusted root certificates, or `DEFAULT_CA_BUNDLE`.
    CaInfo,
    SslVerifyPeer,
    FollowLocation,
    /// Buffer the response body and return it from `execute`.
    ReturnTransfer,
    /// Report raw header lines to the header callback.
    HeaderFunction,
    /// Transport specific key not covered above.
    Other(String),
}

impl TransportOption {
    pub fn as_str(&self) -> &str {
        match self {
            Self::CustomRequest => "custom_request",
            Self::Url => "url",
            Self::HttpHeader => "http_header",
            Self::PostFields => "post_fields",
            Self::Encoding => "encoding",
            Self::Timeout => "timeout",
            Self::TimeoutMs => "timeout_ms",
            Self::CaInfo => "ca_info",
            Self::SslVerifyPeer => "ssl_verify_peer",
            Self::FollowLocation => "follow_location",
            Self::ReturnTransfer => "return_transfer",
            Self::HeaderFunction => "header_function",
            Self::Other(name) => name,
        }
    }
}

impl std::fmt::Display for TransportOption {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Int(u64),
    Text(String),
    List(Vec<String>),
    Pairs(Vec<(String, String)>),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<u64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Pairs(_) => "pairs",
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u64> for OptionValue {
    fn from(value: u64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Duration> for OptionValue {
    fn from(value: Duration) -> Self {
        Self::Int(value.as_millis().min(u64::MAX as u128) as u64)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransportOptions {
    entries: BTreeMap<TransportOption, OptionValue>,
}

impl TransportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, option: TransportOption, value: impl Into<OptionValue>) {
        self.entries.insert(option, value.into());
    }

    pub fn unset(&mut self, option: &TransportOption) -> Option<OptionValue> {
        self.entries.remove(option)
    }

    pub fn get(&self, option: &TransportOption) -> Option<&OptionValue> {
        self.entries.get(option)
    }

    pub fn contains(&self, option: &TransportOption) -> bool {
        self.entries.contains_key(option)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TransportOption, &OptionValue)> {
        self.entries.iter()
    }
}
