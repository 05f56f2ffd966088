use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use thiserror::Error;

use super::hooks::{CancelToken, RequestHooks};
use super::request::{
    transition, Dispatch, Method, ReadyState, RequestId, RequestOptions, Response,
    TransferEvent, TransferUpdate,
};
use super::transfer::{Transfer, TransferError, TransferFactory};
use crate::host::Notifier;
use crate::xml::Document;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request has no url")]
    MissingUrl,
    #[error("a refresh request is already in flight")]
    RefreshInFlight,
    #[error(transparent)]
    Create(#[from] TransferError),
}

/// Returned by [`RequestRegistry::issue`].
#[derive(Debug, Clone)]
pub struct RequestHandle {
    id: RequestId,
    token: CancelToken,
}

impl RequestHandle {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

struct ActiveRequest {
    url: String,
    method: Method,
    refresh: bool,
    state: ReadyState,
    token: CancelToken,
    transfer: Rc<dyn Transfer>,
    // Taken out while a progress hook runs.
    hooks: Option<Box<dyn RequestHooks>>,
}

#[derive(Default)]
struct RegistryState {
    active: BTreeMap<RequestId, ActiveRequest>,
    last_id: u64,
    refreshing: bool,
}

impl RegistryState {
    fn next_id(&mut self, now_ms: u64) -> RequestId {
        let id = now_ms.max(self.last_id + 1);
        self.last_id = id;
        RequestId(id)
    }

    fn remove(&mut self, id: RequestId) -> Option<ActiveRequest> {
        let record = self.active.remove(&id)?;
        if record.refresh {
            self.refreshing = false;
        }
        Some(record)
    }
}

enum Step {
    Progress(Dispatch, Option<Box<dyn RequestHooks>>),
    Finished(Dispatch, ActiveRequest, Response),
}

/// Tracks every in-flight request and routes transfer events to hooks.
///
/// Cloning yields another handle to the same set. Hooks run with no
/// internal borrow held, so they may issue or cancel requests.
#[derive(Clone)]
pub struct RequestRegistry {
    state: Rc<RefCell<RegistryState>>,
    transfers: Rc<dyn TransferFactory>,
    notifier: Rc<dyn Notifier>,
}

impl RequestRegistry {
    pub fn new(transfers: Rc<dyn TransferFactory>, notifier: Rc<dyn Notifier>) -> Self {
        Self {
            state: Rc::new(RefCell::new(RegistryState::default())),
            transfers,
            notifier,
        }
    }

    pub fn issue(
        &self,
        options: RequestOptions,
        hooks: impl RequestHooks + 'static,
    ) -> Result<RequestHandle, RequestError> {
        let url = match options.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => {
                tracing::error!(target: "ajax", "refusing request without url");
                return Err(RequestError::MissingUrl);
            }
        };

        if options.refresh && self.is_refreshing() {
            tracing::debug!(target: "ajax", url = %url, "refresh already in flight");
            return Err(RequestError::RefreshInFlight);
        }

        let id = self.state.borrow_mut().next_id(now_millis());
        let token = CancelToken::new();
        let transfer = match self.transfers.create(id, token.clone()) {
            Ok(transfer) => transfer,
            Err(err) => {
                tracing::error!(target: "ajax", url = %url, error = %err, "failed to create transfer");
                self.notifier
                    .alert(&format!("Unable to create a request for {url}: {err}"));
                return Err(RequestError::Create(err));
            }
        };

        {
            let mut state = self.state.borrow_mut();
            state.active.insert(
                id,
                ActiveRequest {
                    url: url.clone(),
                    method: options.method,
                    refresh: options.refresh,
                    state: ReadyState::Unsent,
                    token: token.clone(),
                    transfer: Rc::clone(&transfer),
                    hooks: Some(Box::new(hooks)),
                },
            );
            if options.refresh {
                state.refreshing = true;
            }
        }

        tracing::debug!(target: "ajax", %id, method = %options.method, url = %url, "issuing request");

        // A synchronous transfer reports every event from inside these calls.
        if let Err(err) = transfer.open(options.method, &url, options.asynchronous) {
            tracing::warn!(target: "ajax", %id, error = %err, "failed to open transfer");
        }
        for (name, value) in &options.headers {
            if let Err(err) = transfer.set_request_header(name, value) {
                tracing::warn!(target: "ajax", %id, header = %name, error = %err, "failed to set header");
            }
        }
        if let Err(err) = transfer.send(options.body.as_deref()) {
            tracing::warn!(target: "ajax", %id, error = %err, "failed to send transfer");
        }

        Ok(RequestHandle { id, token })
    }

    /// Issues a request and hands the parsed response document to
    /// `callback`, or `None` on failure or unparseable content.
    pub fn request_document(
        &self,
        options: RequestOptions,
        callback: impl FnOnce(Option<Document>) + 'static,
    ) -> Result<RequestHandle, RequestError> {
        self.issue(options, DocumentHooks(Some(Box::new(callback))))
    }

    pub fn make_request(
        &self,
        url: &str,
        method: Method,
        headers: Vec<(String, String)>,
        body: Option<String>,
        callback: impl FnOnce(Option<Document>) + 'static,
    ) -> Result<RequestHandle, RequestError> {
        let options = RequestOptions {
            url: Some(url.to_string()),
            method,
            headers,
            body,
            ..Default::default()
        };
        self.request_document(options, callback)
    }

    /// Returns `false` when the id is not in flight.
    pub fn cancel(&self, id: RequestId) -> bool {
        let record = self.state.borrow_mut().remove(id);
        match record {
            Some(record) => {
                tracing::debug!(target: "ajax", %id, url = %record.url, "cancelling request");
                record.token.cancel();
                record.transfer.abort();
                true
            }
            None => false,
        }
    }

    /// Returns the number of requests cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained = {
            let mut state = self.state.borrow_mut();
            state.refreshing = false;
            std::mem::take(&mut state.active)
        };
        let count = drained.len();
        for (_, record) in drained {
            record.token.cancel();
            record.transfer.abort();
        }
        if count > 0 {
            tracing::debug!(target: "ajax", count, "cancelled all requests");
        }
        count
    }

    /// Routes one transfer event. Events for ids that are no longer active
    /// are dropped; returns whether a hook was selected.
    pub fn dispatch(&self, event: TransferEvent) -> bool {
        let TransferEvent { id, update } = event;

        let step = {
            let mut state = self.state.borrow_mut();
            let Some(record) = state.active.get_mut(&id) else {
                tracing::trace!(target: "ajax", %id, "dropping event for inactive request");
                return false;
            };

            if record.token.is_cancelled() {
                let record = state.remove(id);
                drop(state);
                if let Some(record) = record {
                    record.transfer.abort();
                }
                return false;
            }

            let dispatch = transition(record.state, &update);
            if dispatch == Dispatch::Ignore {
                return false;
            }
            record.state = update.ready_state();

            if dispatch.is_terminal() {
                let response = match update {
                    TransferUpdate::Done(response) => response,
                    _ => Response::default(),
                };
                match state.remove(id) {
                    Some(record) => Step::Finished(dispatch, record, response),
                    None => return false,
                }
            } else {
                Step::Progress(dispatch, record.hooks.take())
            }
        };

        match step {
            Step::Progress(dispatch, hooks) => {
                let Some(mut hooks) = hooks else {
                    return true;
                };
                match dispatch {
                    Dispatch::Connection => hooks.connection(id),
                    Dispatch::Received => hooks.received(id),
                    Dispatch::Processing => hooks.processing(id),
                    _ => {}
                }
                let mut state = self.state.borrow_mut();
                if let Some(record) = state.active.get_mut(&id) {
                    record.hooks.get_or_insert(hooks);
                }
            }
            Step::Finished(dispatch, record, response) => {
                tracing::debug!(
                    target: "ajax",
                    %id,
                    method = %record.method,
                    url = %record.url,
                    status = response.status,
                    "request finished"
                );
                if let Some(mut hooks) = record.hooks {
                    match dispatch {
                        Dispatch::Success => hooks.success(&response),
                        Dispatch::Failure(status) => hooks.failure(status, &response),
                        _ => {}
                    }
                    hooks.complete(&response);
                }
            }
        }
        true
    }

    pub fn active_count(&self) -> usize {
        self.state.borrow().active.len()
    }

    pub fn is_active(&self, id: RequestId) -> bool {
        self.state.borrow().active.contains_key(&id)
    }

    pub fn active_ids(&self) -> Vec<RequestId> {
        self.state.borrow().active.keys().copied().collect()
    }

    pub fn is_refreshing(&self) -> bool {
        self.state.borrow().refreshing
    }

    pub fn notifier(&self) -> Rc<dyn Notifier> {
        Rc::clone(&self.notifier)
    }
}

struct DocumentHooks(Option<Box<dyn FnOnce(Option<Document>)>>);

impl RequestHooks for DocumentHooks {
    fn success(&mut self, response: &Response) {
        let Some(callback) = self.0.take() else {
            return;
        };
        match response.document() {
            Ok(document) => callback(Some(document)),
            Err(err) => {
                tracing::warn!(target: "ajax", error = %err, "response is not a valid document");
                callback(None);
            }
        }
    }

    fn failure(&mut self, status: u16, _response: &Response) {
        tracing::warn!(target: "ajax", status, "request failed");
        if let Some(callback) = self.0.take() {
            callback(None);
        }
    }
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}
