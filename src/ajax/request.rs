use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::xml::{Document, XmlError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unsupported request method: {0}")]
pub struct UnknownMethod(String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            _ => Err(UnknownMethod(raw.to_string())),
        }
    }
}

/// Identifier of an issued request. Derived from the creation clock and
/// strictly increasing within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub url: Option<String>,
    pub method: Method,
    pub asynchronous: bool,
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Marks a page auto-refresh request; only one may be in flight.
    pub refresh: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            url: None,
            method: Method::Get,
            asynchronous: true,
            body: None,
            headers: Vec::new(),
            refresh: false,
        }
    }
}

impl RequestOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn synchronous(mut self) -> Self {
        self.asynchronous = false;
        self
    }

    pub fn refresh(mut self) -> Self {
        self.refresh = true;
        self
    }
}

/// Final payload of a transfer. A status of `0` means the transfer never
/// produced an HTTP response (network error).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: String::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn document(&self) -> Result<Document, XmlError> {
        Document::parse(&self.body)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    Unsent = 0,
    Opened = 1,
    HeadersReceived = 2,
    Loading = 3,
    Done = 4,
}

/// Notification delivered by a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferUpdate {
    Opened,
    HeadersReceived,
    Loading,
    Done(Response),
}

impl TransferUpdate {
    pub fn ready_state(&self) -> ReadyState {
        match self {
            TransferUpdate::Opened => ReadyState::Opened,
            TransferUpdate::HeadersReceived => ReadyState::HeadersReceived,
            TransferUpdate::Loading => ReadyState::Loading,
            TransferUpdate::Done(_) => ReadyState::Done,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub id: RequestId,
    pub update: TransferUpdate,
}

impl TransferEvent {
    pub fn new(id: RequestId, update: TransferUpdate) -> Self {
        Self { id, update }
    }
}

/// Hook selected for a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Connection,
    Received,
    Processing,
    Success,
    Failure(u16),
    Ignore,
}

impl Dispatch {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Dispatch::Success | Dispatch::Failure(_))
    }
}

/// States only move forward; anything else (repeats, regressions, updates
/// after `Done`) is ignored. States may be skipped.
pub fn transition(current: ReadyState, update: &TransferUpdate) -> Dispatch {
    let next = update.ready_state();
    if current == ReadyState::Done || next <= current {
        return Dispatch::Ignore;
    }
    match update {
        TransferUpdate::Opened => Dispatch::Connection,
        TransferUpdate::HeadersReceived => Dispatch::Received,
        TransferUpdate::Loading => Dispatch::Processing,
        TransferUpdate::Done(response) if response.is_success() => Dispatch::Success,
        TransferUpdate::Done(response) => Dispatch::Failure(response.status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_the_full_state_machine() {
        assert_eq!(
            transition(ReadyState::Unsent, &TransferUpdate::Opened),
            Dispatch::Connection
        );
        assert_eq!(
            transition(ReadyState::Opened, &TransferUpdate::HeadersReceived),
            Dispatch::Received
        );
        assert_eq!(
            transition(ReadyState::HeadersReceived, &TransferUpdate::Loading),
            Dispatch::Processing
        );
        assert_eq!(
            transition(ReadyState::Loading, &TransferUpdate::Done(Response::new(200, ""))),
            Dispatch::Success
        );
    }

    #[test]
    fn non_200_is_failure_with_status() {
        let update = TransferUpdate::Done(Response::new(404, "missing"));
        assert_eq!(transition(ReadyState::Loading, &update), Dispatch::Failure(404));
        let update = TransferUpdate::Done(Response::new(204, ""));
        assert_eq!(transition(ReadyState::Opened, &update), Dispatch::Failure(204));
    }

    #[test]
    fn ignores_repeats_and_post_terminal_updates() {
        assert_eq!(
            transition(ReadyState::Loading, &TransferUpdate::Loading),
            Dispatch::Ignore
        );
        assert_eq!(
            transition(ReadyState::Loading, &TransferUpdate::Opened),
            Dispatch::Ignore
        );
        assert_eq!(
            transition(ReadyState::Done, &TransferUpdate::Done(Response::new(200, ""))),
            Dispatch::Ignore
        );
    }

    #[test]
    fn parses_methods_case_insensitively() {
        assert_eq!("post".parse::<Method>().unwrap(), Method::Post);
        assert_eq!(" DELETE ".parse::<Method>().unwrap(), Method::Delete);
        assert!("PATCH".parse::<Method>().is_err());
        assert_eq!(Method::default(), Method::Get);
    }

    #[test]
    fn options_default_to_async_get() {
        let options = RequestOptions::new("http://example.tv/a.xml");
        assert!(options.asynchronous);
        assert_eq!(options.method, Method::Get);
        assert!(!options.refresh);
        assert!(!RequestOptions::new("x").synchronous().asynchronous);
    }
}
