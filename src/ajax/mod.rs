mod hooks;
mod http;
mod registry;
mod request;
mod transfer;

pub use hooks::{CancelToken, Callbacks, RequestHooks};
pub use http::{http_registry, HttpTransfer, HttpTransferFactory, TransferPump};
pub use registry::{RequestError, RequestHandle, RequestRegistry};
pub use request::{
    transition, Dispatch, Method, ReadyState, RequestId, RequestOptions, Response,
    TransferEvent, TransferUpdate, UnknownMethod,
};
pub use transfer::{Transfer, TransferError, TransferFactory};

#[cfg(test)]
pub(crate) use registry::testing;
