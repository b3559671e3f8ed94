//! `reqcat` is a blocking, fetch-once HTTP request builder with retries,
//! response header capture and JSON decoding on top of a pluggable transport.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use reqcat::prelude::Request;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Release {
//!     tag_name: String,
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut request = Request::new()?
//!         .get()
//!         .url_with("https://api.example.com/v1/releases/latest", [("channel", "stable")])
//!         .user_agent("release-watch/0.1")
//!         .timeout(5)
//!         .follow_location(true)
//!         .attempts(3, Duration::from_millis(250))?;
//!
//!     let release: Release = request.fetch_json_as(true)?;
//!     println!(
//!         "latest={} status={} attempts={}",
//!         release.tag_name,
//!         request.status()?,
//!         request.attempts_used()?
//!     );
//!     Ok(())
//! }
//! ```
//!
//! # Lifecycle
//!
//! - Configure with chained calls; each consumes and returns the request.
//! - `fetch` (or `fetch_json`) runs at most once per request.
//! - Response accessors return [`Error::NotFetched`] until then.
//! - Use [`Request::duplicate`] to send the same request again.

#[cfg(all(not(feature = "tls-rustls"), not(feature = "tls-native")))]
compile_error!("reqcat requires one TLS backend feature: enable `tls-rustls` or `tls-native`");

mod error;
mod execute;
mod extensions;
mod headers;
mod options;
mod request;
mod response;
mod retry;
pub mod transport;
mod util;

pub use crate::error::{
    AttemptFailure, Error, ErrorCategory, ErrorCode, FailureKind, TransportErrorKind,
};
pub use crate::extensions::{Sleeper, ThreadSleeper};
pub use crate::headers::{RequestHeaders, ResponseHeaders};
pub use crate::options::{OptionValue, TransportOption, TransportOptions};
pub use crate::request::{Request, RequestBody};
pub use crate::retry::RetryPolicy;
pub use crate::transport::{
    DEFAULT_CA_BUNDLE, InfoKey, InfoValue, TransportInfo, UreqTransport,
};
pub use crate::util::build_url;

pub type Result<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use crate::{
        AttemptFailure, Error, ErrorCategory, ErrorCode, FailureKind, InfoKey, InfoValue,
        OptionValue, Request, RequestBody, RetryPolicy, Sleeper, TransportErrorKind,
        TransportOption,
    };
}
