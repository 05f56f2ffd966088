use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Duration};

static NEXT_TIMER_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("timers need a tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u32);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
enum TimerMessage {
    Fire { timer_id: TimerId },
}

type TimerCallback = Rc<RefCell<dyn FnMut()>>;

struct TimerEntry {
    cancel_tx: mpsc::UnboundedSender<()>,
    callback: TimerCallback,
    repeating: bool,
}

struct TimerInner {
    tokio_handle: Handle,
    timers: RefCell<HashMap<TimerId, TimerEntry>>,
    message_tx: mpsc::UnboundedSender<TimerMessage>,
    message_rx: Mutex<mpsc::UnboundedReceiver<TimerMessage>>,
}

/// Timeouts and intervals. Delays run on tokio; callbacks run on the
/// owning thread when [`poll`](Self::poll) or [`tick`](Self::tick) is
/// called.
#[derive(Clone)]
pub struct TimerRegistry {
    inner: Rc<TimerInner>,
}

impl TimerRegistry {
    pub fn new() -> Result<Self, TimerError> {
        Ok(Self::with_handle(Handle::try_current()?))
    }

    pub fn with_handle(tokio_handle: Handle) -> Self {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        Self {
            inner: Rc::new(TimerInner {
                tokio_handle,
                timers: RefCell::new(HashMap::new()),
                message_tx,
                message_rx: Mutex::new(message_rx),
            }),
        }
    }

    pub fn set_timeout(&self, delay_ms: u64, callback: impl FnMut() + 'static) -> TimerId {
        let timer_id = TimerId(NEXT_TIMER_ID.fetch_add(1, Ordering::SeqCst));
        let message_tx = self.inner.message_tx.clone();
        let (cancel_tx, mut cancel_rx) = mpsc::unbounded_channel();

        self.inner.tokio_handle.spawn(async move {
            tokio::select! {
                _ = sleep(Duration::from_millis(delay_ms)) => {
                    let _ = message_tx.send(TimerMessage::Fire { timer_id });
                }
                _ = cancel_rx.recv() => {}
            }
        });

        self.insert(timer_id, cancel_tx, Rc::new(RefCell::new(callback)), false);
        timer_id
    }

    pub fn set_interval(&self, delay_ms: u64, callback: impl FnMut() + 'static) -> TimerId {
        let timer_id = TimerId(NEXT_TIMER_ID.fetch_add(1, Ordering::SeqCst));
        let message_tx = self.inner.message_tx.clone();
        let (cancel_tx, mut cancel_rx) = mpsc::unbounded_channel();

        self.inner.tokio_handle.spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(delay_ms.max(1)));
            interval.tick().await; // first tick completes immediately
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if message_tx.send(TimerMessage::Fire { timer_id }).is_err() {
                            break;
                        }
                    }
                    _ = cancel_rx.recv() => {
                        break;
                    }
                }
            }
        });

        self.insert(timer_id, cancel_tx, Rc::new(RefCell::new(callback)), true);
        timer_id
    }

    fn insert(
        &self,
        timer_id: TimerId,
        cancel_tx: mpsc::UnboundedSender<()>,
        callback: TimerCallback,
        repeating: bool,
    ) {
        self.inner.timers.borrow_mut().insert(
            timer_id,
            TimerEntry {
                cancel_tx,
                callback,
                repeating,
            },
        );
    }

    pub fn clear_timer(&self, timer_id: TimerId) -> bool {
        match self.inner.timers.borrow_mut().remove(&timer_id) {
            Some(entry) => {
                let _ = entry.cancel_tx.send(());
                true
            }
            None => false,
        }
    }

    pub fn clear_all(&self) {
        let drained: Vec<_> = self.inner.timers.borrow_mut().drain().collect();
        for (_, entry) in drained {
            let _ = entry.cancel_tx.send(());
        }
    }

    pub fn active_count(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    /// Runs callbacks for every timer that has fired. Returns how many ran.
    pub fn poll(&self) -> usize {
        let mut executed = 0;
        loop {
            let message = match self.inner.message_rx.try_lock() {
                Ok(mut rx) => rx.try_recv(),
                Err(_) => break,
            };
            let Ok(TimerMessage::Fire { timer_id }) = message else {
                break;
            };
            if self.fire(timer_id) {
                executed += 1;
            }
        }
        executed
    }

    /// Waits for the next live timer to fire and runs it.
    pub async fn tick(&self) -> Option<TimerId> {
        loop {
            let message = self.inner.message_rx.lock().await.recv().await?;
            let TimerMessage::Fire { timer_id } = message;
            if self.fire(timer_id) {
                return Some(timer_id);
            }
        }
    }

    fn fire(&self, timer_id: TimerId) -> bool {
        let callback = {
            let mut timers = self.inner.timers.borrow_mut();
            match timers.get(&timer_id) {
                Some(entry) if entry.repeating => Rc::clone(&entry.callback),
                Some(_) => match timers.remove(&timer_id) {
                    Some(entry) => entry.callback,
                    None => return false,
                },
                // Cancelled after the message was queued.
                None => return false,
            }
        };
        tracing::trace!(target: "timers", %timer_id, "firing timer");
        (callback.borrow_mut())();
        true
    }
}

impl Drop for TimerInner {
    fn drop(&mut self) {
        for (_, entry) in self.timers.get_mut().drain() {
            let _ = entry.cancel_tx.send(());
        }
    }
}
