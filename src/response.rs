use std::collections::BTreeMap;

use crate::error::{AttemptFailure, Error};
use crate::headers::ResponseHeaders;
use crate::request::{Lifecycle, Request};
use crate::transport::{InfoKey, InfoValue, TransportInfo};

/// State left behind by `fetch`, successful or not.
#[derive(Debug, Default)]
pub(crate) struct Execution {
    pub(crate) attempts: usize,
    pub(crate) failures: Vec<AttemptFailure>,
    pub(crate) headers: ResponseHeaders,
}

impl Request {
    fn execution(&self) -> crate::Result<&Execution> {
        match &self.lifecycle {
            Lifecycle::Done(execution) => Ok(execution),
            Lifecycle::Idle => Err(Error::NotFetched),
        }
    }

    /// Number of attempts the fetch actually made.
    pub fn attempts_used(&self) -> crate::Result<usize> {
        Ok(self.execution()?.attempts)
    }

    /// Failed attempts in attempt order. Empty when the first attempt succeeded.
    pub fn failures(&self) -> crate::Result<&[AttemptFailure]> {
        Ok(&self.execution()?.failures)
    }

    pub fn info(&self, key: InfoKey) -> crate::Result<Option<InfoValue>> {
        self.execution()?;
        Ok(self.handle.info().get(key))
    }

    pub fn info_all(&self) -> crate::Result<TransportInfo> {
        self.execution()?;
        Ok(self.handle.info())
    }

    /// Final status code, `0` when no response was received.
    pub fn status(&self) -> crate::Result<u16> {
        self.execution()?;
        Ok(self.handle.info().status.unwrap_or_default())
    }

    /// Final `Content-Type`, empty when the response had none.
    pub fn response_content_type(&self) -> crate::Result<String> {
        self.execution()?;
        Ok(self.handle.info().content_type.unwrap_or_default())
    }

    /// Values of one header from the last response block. `name` is matched case-insensitively.
    pub fn response_header(&self, name: &str) -> crate::Result<&[String]> {
        Ok(self.execution()?.headers.get(name))
    }

    pub fn response_header_line(&self, name: &str) -> crate::Result<String> {
        Ok(self.execution()?.headers.get_line(name))
    }

    pub fn response_headers(&self) -> crate::Result<&BTreeMap<String, Vec<String>>> {
        Ok(self.execution()?.headers.all())
    }

    /// Every header of the last response block with values joined by `,`.
    pub fn response_headers_line(&self) -> crate::Result<BTreeMap<String, String>> {
        Ok(self.execution()?.headers.all_lines())
    }
}
