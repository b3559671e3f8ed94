use std::time::Instant;

use http::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, info_span, warn};

use crate::error::{AttemptFailure, Error};
use crate::headers::ResponseHeaders;
use crate::options::{OptionValue, TransportOption, TransportOptions};
use crate::request::{Lifecycle, Request};
use crate::response::Execution;
use crate::util::{decode_json_document, is_mime_json, parse_json_document, redact_uri_for_logs};

impl Request {
    /// Options as `fetch` hands them to the transport: the option bag plus the
    /// flattened headers, the body and the fixed capture settings.
    pub fn prepared_options(&self) -> TransportOptions {
        let mut options = self.options.clone();
        if self.headers.is_empty() {
            options.unset(&TransportOption::HttpHeader);
        } else {
            options.set(
                TransportOption::HttpHeader,
                OptionValue::List(self.headers.to_wire_lines()),
            );
        }
        if let Some(body) = &self.body {
            options.set(TransportOption::PostFields, body.to_option_value());
        }
        options.set(TransportOption::ReturnTransfer, true);
        options.set(TransportOption::HeaderFunction, true);
        options
    }

    /// Runs the request, retrying per the retry policy, and returns the body of
    /// the first successful attempt.
    ///
    /// A request is fetched at most once. Whatever the outcome, the response
    /// accessors work afterwards and further configuration is ignored.
    ///
    /// The body is read without a size limit. Bytes that are not valid UTF-8
    /// are replaced with `U+FFFD`.
    pub fn fetch(&mut self) -> crate::Result<String> {
        if self.is_fetched() {
            return Err(Error::AlreadyFetched);
        }

        let mut execution = Execution::default();
        let result = self
            .apply_prepared_options()
            .and_then(|()| self.run_attempts(&mut execution));
        self.lifecycle = Lifecycle::Done(execution);
        result
    }

    /// Fetches and parses the body as a JSON object or array.
    ///
    /// With `check_mime` the final `Content-Type` must be `application/json`.
    pub fn fetch_json(&mut self, check_mime: bool) -> crate::Result<serde_json::Value> {
        let text = self.fetch()?;
        self.ensure_json_mime(check_mime)?;
        parse_json_document(&text)
    }

    pub fn fetch_json_as<T>(&mut self, check_mime: bool) -> crate::Result<T>
    where
        T: DeserializeOwned,
    {
        let text = self.fetch()?;
        self.ensure_json_mime(check_mime)?;
        decode_json_document(&text)
    }

    fn ensure_json_mime(&self, check_mime: bool) -> crate::Result<()> {
        if !check_mime {
            return Ok(());
        }
        let mime = self.response_content_type()?;
        if !is_mime_json(&mime) {
            return Err(Error::MimeMismatch { mime });
        }
        Ok(())
    }

    fn apply_prepared_options(&mut self) -> crate::Result<()> {
        let options = self.prepared_options();
        for (option, value) in options.iter() {
            self.handle
                .set_option(option, value)
                .map_err(|error| Error::ApplyOption {
                    option: option.to_string(),
                    message: error.message().to_owned(),
                })?;
        }
        Ok(())
    }

    fn method_for_logs(&self) -> String {
        match self
            .options
            .get(&TransportOption::CustomRequest)
            .and_then(OptionValue::as_text)
        {
            Some(method) => method.to_owned(),
            None if self.body.is_some() => Method::POST.to_string(),
            None => Method::GET.to_string(),
        }
    }

    fn uri_for_logs(&self) -> String {
        self.options
            .get(&TransportOption::Url)
            .and_then(OptionValue::as_text)
            .map(redact_uri_for_logs)
            .unwrap_or_default()
    }

    fn run_attempts(&mut self, execution: &mut Execution) -> crate::Result<String> {
        let max_attempts = self.retry_policy.max_attempts();
        let method = self.method_for_logs();
        let uri = self.uri_for_logs();

        for attempt in 1..=max_attempts {
            let span = info_span!(
                "reqcat.fetch",
                method = %method,
                uri = %uri,
                attempt = attempt,
                max_attempts = max_attempts
            );
            let _enter = span.enter();
            let started = Instant::now();
            execution.attempts = attempt;

            debug!("sending request");
            let error = match self.run_once(attempt, &method, &uri, &mut execution.headers) {
                Ok(body) => {
                    debug!(
                        status = self.handle.info().status.unwrap_or_default(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "request completed"
                    );
                    return Ok(body);
                }
                Err(error) => error,
            };

            let Some(failure) = AttemptFailure::from_error(&error) else {
                return Err(error);
            };
            execution.failures.push(failure);
            if !self.retry_policy.allows_retry_after(attempt) {
                return Err(error);
            }

            let retry_delay = self.retry_policy.delay_before_retry();
            warn!(
                delay_ms = retry_delay.map_or(0, |delay| delay.as_millis() as u64),
                error = %error,
                "retrying request"
            );
            if let Some(retry_delay) = retry_delay {
                self.sleeper.sleep(retry_delay);
            }
        }

        // A policy always allows at least one attempt.
        Err(Error::InvalidAttempts { times: 0 })
    }

    fn run_once(
        &mut self,
        attempt: usize,
        method: &str,
        uri: &str,
        headers: &mut ResponseHeaders,
    ) -> crate::Result<String> {
        headers.clear();
        let body = self
            .handle
            .execute(&mut |line: &str| headers.receive_line(line))
            .map_err(|error| {
                let (kind, message, source) = error.into_parts();
                Error::Transport {
                    kind,
                    attempt,
                    method: method.to_owned(),
                    uri: uri.to_owned(),
                    message,
                    source,
                }
            })?;

        if !self.ignore_http_code {
            let status = self.handle.info().status.unwrap_or_default();
            if !(200..300).contains(&status) {
                return Err(Error::HttpStatus {
                    status,
                    attempt,
                    method: method.to_owned(),
                    uri: uri.to_owned(),
                });
            }
        }
        Ok(body)
    }
}
