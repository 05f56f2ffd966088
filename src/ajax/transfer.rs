use std::rc::Rc;

use thiserror::Error;

use super::hooks::CancelToken;
use super::request::{Method, RequestId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("transfer could not be created: {0}")]
    Create(String),
    #[error("transfer is not open")]
    NotOpened,
    #[error("transfer was already sent")]
    AlreadySent,
    #[error("invalid header {0}")]
    InvalidHeader(String),
    #[error("network error: {0}")]
    Network(String),
}

/// Host-provided network request object.
///
/// Progress is reported back to the request registry as
/// [`TransferEvent`](super::TransferEvent)s carrying the id the transfer
/// was created with.
pub trait Transfer {
    fn open(&self, method: Method, url: &str, asynchronous: bool) -> Result<(), TransferError>;
    fn set_request_header(&self, name: &str, value: &str) -> Result<(), TransferError>;
    fn send(&self, body: Option<&str>) -> Result<(), TransferError>;
    /// Best effort; a transfer that already finished ignores it.
    fn abort(&self);
}

pub trait TransferFactory {
    fn create(&self, id: RequestId, token: CancelToken) -> Result<Rc<dyn Transfer>, TransferError>;
}
