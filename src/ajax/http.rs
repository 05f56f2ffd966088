use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::hooks::CancelToken;
use super::registry::RequestRegistry;
use super::request::{Method, RequestId, Response, TransferEvent, TransferUpdate};
use super::transfer::{Transfer, TransferError, TransferFactory};
use crate::host::Notifier;

const TRANSFER_TIMEOUT: Duration = Duration::from_secs(10);

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone)]
struct Prepared {
    method: Method,
    url: String,
    asynchronous: bool,
    headers: Vec<(String, String)>,
}

/// Sends events for one transfer unless it has been cancelled.
#[derive(Clone)]
struct Emitter {
    id: RequestId,
    token: CancelToken,
    events: mpsc::UnboundedSender<TransferEvent>,
}

impl Emitter {
    fn emit(&self, update: TransferUpdate) {
        if self.token.is_cancelled() {
            return;
        }
        let _ = self.events.send(TransferEvent::new(self.id, update));
    }

    fn network_error(&self, err: &reqwest::Error) {
        tracing::debug!(target: "ajax", id = %self.id, error = %err, "transfer failed");
        self.emit(TransferUpdate::Done(Response {
            status: 0,
            status_text: err.to_string(),
            body: String::new(),
        }));
    }
}

fn finished(status: reqwest::StatusCode, body: String) -> TransferUpdate {
    TransferUpdate::Done(Response {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        body,
    })
}

/// A transfer backed by reqwest. Asynchronous sends run as a tokio task;
/// synchronous sends block the caller until the response is queued.
pub struct HttpTransfer {
    emitter: Emitter,
    client: reqwest::Client,
    runtime: Handle,
    prepared: RefCell<Option<Prepared>>,
    sent: Cell<bool>,
    task: RefCell<Option<JoinHandle<()>>>,
}

impl Transfer for HttpTransfer {
    fn open(&self, method: Method, url: &str, asynchronous: bool) -> Result<(), TransferError> {
        *self.prepared.borrow_mut() = Some(Prepared {
            method,
            url: url.to_string(),
            asynchronous,
            headers: Vec::new(),
        });
        self.sent.set(false);
        self.emitter.emit(TransferUpdate::Opened);
        Ok(())
    }

    fn set_request_header(&self, name: &str, value: &str) -> Result<(), TransferError> {
        if self.sent.get() {
            return Err(TransferError::AlreadySent);
        }
        let mut prepared = self.prepared.borrow_mut();
        let prepared = prepared.as_mut().ok_or(TransferError::NotOpened)?;
        if name.trim().is_empty() {
            return Err(TransferError::InvalidHeader(name.to_string()));
        }
        prepared.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn send(&self, body: Option<&str>) -> Result<(), TransferError> {
        let prepared = self
            .prepared
            .borrow()
            .clone()
            .ok_or(TransferError::NotOpened)?;
        if self.sent.replace(true) {
            return Err(TransferError::AlreadySent);
        }
        let body = body.map(str::to_string);

        if prepared.asynchronous {
            let task = self.runtime.spawn(perform(
                self.client.clone(),
                prepared,
                body,
                self.emitter.clone(),
            ));
            *self.task.borrow_mut() = Some(task);
            return Ok(());
        }

        let emitter = &self.emitter;
        std::thread::scope(|scope| {
            scope
                .spawn(move || perform_blocking(prepared, body, emitter))
                .join()
        })
        .map_err(|_| TransferError::Network("synchronous transfer panicked".into()))
    }

    fn abort(&self) {
        self.emitter.token.cancel();
        if let Some(task) = self.task.borrow_mut().take() {
            task.abort();
        }
    }
}

async fn perform(
    client: reqwest::Client,
    prepared: Prepared,
    body: Option<String>,
    emitter: Emitter,
) {
    let mut request = client.request(prepared.method.into(), prepared.url.as_str());
    for (name, value) in &prepared.headers {
        request = request.header(name.as_str(), value.as_str());
    }
    if let Some(body) = body {
        request = request.body(body);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => return emitter.network_error(&err),
    };
    emitter.emit(TransferUpdate::HeadersReceived);
    emitter.emit(TransferUpdate::Loading);

    let status = response.status();
    match response.text().await {
        Ok(text) => emitter.emit(finished(status, text)),
        Err(err) => emitter.network_error(&err),
    }
}

fn perform_blocking(prepared: Prepared, body: Option<String>, emitter: &Emitter) {
    let client = match reqwest::blocking::Client::builder()
        .timeout(TRANSFER_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(err) => return emitter.network_error(&err),
    };

    let mut request = client.request(prepared.method.into(), prepared.url.as_str());
    for (name, value) in &prepared.headers {
        request = request.header(name.as_str(), value.as_str());
    }
    if let Some(body) = body {
        request = request.body(body);
    }

    let response = match request.send() {
        Ok(response) => response,
        Err(err) => return emitter.network_error(&err),
    };
    emitter.emit(TransferUpdate::HeadersReceived);
    emitter.emit(TransferUpdate::Loading);

    let status = response.status();
    match response.text() {
        Ok(text) => emitter.emit(finished(status, text)),
        Err(err) => emitter.network_error(&err),
    }
}

pub struct HttpTransferFactory {
    client: reqwest::Client,
    runtime: Handle,
    events: mpsc::UnboundedSender<TransferEvent>,
}

impl HttpTransferFactory {
    /// Must be called from inside a tokio runtime.
    pub fn new(events: mpsc::UnboundedSender<TransferEvent>) -> Result<Self, TransferError> {
        let runtime = Handle::try_current().map_err(|err| TransferError::Create(err.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(TRANSFER_TIMEOUT)
            .build()
            .map_err(|err| TransferError::Create(err.to_string()))?;
        Ok(Self {
            client,
            runtime,
            events,
        })
    }
}

impl TransferFactory for HttpTransferFactory {
    fn create(&self, id: RequestId, token: CancelToken) -> Result<Rc<dyn Transfer>, TransferError> {
        Ok(Rc::new(HttpTransfer {
            emitter: Emitter {
                id,
                token,
                events: self.events.clone(),
            },
            client: self.client.clone(),
            runtime: self.runtime.clone(),
            prepared: RefCell::new(None),
            sent: Cell::new(false),
            task: RefCell::new(None),
        }))
    }
}

/// Drains transfer events into a registry on the thread that owns it.
pub struct TransferPump {
    registry: RequestRegistry,
    events: mpsc::UnboundedReceiver<TransferEvent>,
}

impl TransferPump {
    pub fn new(registry: RequestRegistry, events: mpsc::UnboundedReceiver<TransferEvent>) -> Self {
        Self { registry, events }
    }

    /// Dispatches whatever is queued without waiting. Returns the number
    /// of events handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.registry.dispatch(event);
            handled += 1;
        }
        handled
    }

    /// Dispatches events until no request is in flight.
    pub async fn run_until_idle(&mut self) {
        self.pump();
        while self.registry.active_count() > 0 {
            match self.events.recv().await {
                Some(event) => {
                    self.registry.dispatch(event);
                }
                None => break,
            }
        }
    }

    pub fn registry(&self) -> &RequestRegistry {
        &self.registry
    }
}

/// Registry wired to real HTTP transfers, with its event pump.
pub fn http_registry(
    notifier: Rc<dyn Notifier>,
) -> Result<(RequestRegistry, TransferPump), TransferError> {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let factory = HttpTransferFactory::new(events_tx)?;
    let registry = RequestRegistry::new(Rc::new(factory), notifier);
    let pump = TransferPump::new(registry.clone(), events_rx);
    Ok((registry, pump))
}
