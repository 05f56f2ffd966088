use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::request::{RequestId, Response};

/// Callbacks for a single request. Every method is optional.
///
/// For one request the order is fixed: `connection`, `received`,
/// `processing` (each at most once, any may be skipped), then exactly one of
/// `success` / `failure`, then `complete`. Nothing fires after a cancel.
pub trait RequestHooks {
    fn connection(&mut self, _id: RequestId) {}
    fn received(&mut self, _id: RequestId) {}
    fn processing(&mut self, _id: RequestId) {}
    fn success(&mut self, _response: &Response) {}
    fn failure(&mut self, _status: u16, _response: &Response) {}
    fn complete(&mut self, _response: &Response) {}
}

/// No-op hooks, for fire-and-forget requests.
impl RequestHooks for () {}

type ResponseFn = Box<dyn FnMut(&Response)>;
type FailureFn = Box<dyn FnMut(u16, &Response)>;
type StateFn = Box<dyn FnMut(RequestId)>;

/// Closure-backed hooks.
#[derive(Default)]
pub struct Callbacks {
    connection: Option<StateFn>,
    received: Option<StateFn>,
    processing: Option<StateFn>,
    success: Option<ResponseFn>,
    failure: Option<FailureFn>,
    complete: Option<ResponseFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connection(mut self, hook: impl FnMut(RequestId) + 'static) -> Self {
        self.connection = Some(Box::new(hook));
        self
    }

    pub fn on_received(mut self, hook: impl FnMut(RequestId) + 'static) -> Self {
        self.received = Some(Box::new(hook));
        self
    }

    pub fn on_processing(mut self, hook: impl FnMut(RequestId) + 'static) -> Self {
        self.processing = Some(Box::new(hook));
        self
    }

    pub fn on_success(mut self, hook: impl FnMut(&Response) + 'static) -> Self {
        self.success = Some(Box::new(hook));
        self
    }

    pub fn on_failure(mut self, hook: impl FnMut(u16, &Response) + 'static) -> Self {
        self.failure = Some(Box::new(hook));
        self
    }

    pub fn on_complete(mut self, hook: impl FnMut(&Response) + 'static) -> Self {
        self.complete = Some(Box::new(hook));
        self
    }
}

impl RequestHooks for Callbacks {
    fn connection(&mut self, id: RequestId) {
        if let Some(hook) = self.connection.as_mut() {
            hook(id);
        }
    }

    fn received(&mut self, id: RequestId) {
        if let Some(hook) = self.received.as_mut() {
            hook(id);
        }
    }

    fn processing(&mut self, id: RequestId) {
        if let Some(hook) = self.processing.as_mut() {
            hook(id);
        }
    }

    fn success(&mut self, response: &Response) {
        if let Some(hook) = self.success.as_mut() {
            hook(response);
        }
    }

    fn failure(&mut self, status: u16, response: &Response) {
        if let Some(hook) = self.failure.as_mut() {
            hook(status, response);
        }
    }

    fn complete(&mut self, response: &Response) {
        if let Some(hook) = self.complete.as_mut() {
            hook(response);
        }
    }
}

/// Shared cancellation flag for one request. Transfers running off the
/// event thread check it before reporting progress.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn callbacks_route_to_closures() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let success_log = Rc::clone(&log);
        let complete_log = Rc::clone(&log);
        let mut hooks = Callbacks::new()
            .on_success(move |response| success_log.borrow_mut().push(format!("ok {}", response.body)))
            .on_complete(move |_| complete_log.borrow_mut().push("done".to_string()));

        let response = Response::new(200, "body");
        hooks.connection(RequestId(1));
        hooks.success(&response);
        hooks.failure(500, &response);
        hooks.complete(&response);
        assert_eq!(*log.borrow(), vec!["ok body".to_string(), "done".to_string()]);
    }

    #[test]
    fn token_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
