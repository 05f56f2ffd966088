use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

pub const ON_LOAD_SUCCESS: &str = "ONLOADSUCCESS";
pub const ON_LOAD_ERROR: &str = "ONLOADERROR";
pub const ON_UNLOAD_VIEW: &str = "ONUNLOADVIEW";

/// Receives the scope it was fired under and the event payload.
pub type Handler = Rc<dyn Fn(&dyn Any, &Value)>;

/// Event name to handler map. Cloning shares the map.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    handlers: Rc<RefCell<HashMap<String, Handler>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any handler already registered under `name`.
    pub fn register(&self, name: impl Into<String>, handler: impl Fn(&dyn Any, &Value) + 'static) {
        self.register_handler(name, Rc::new(handler));
    }

    pub fn register_handler(&self, name: impl Into<String>, handler: Handler) {
        let name = name.into();
        tracing::trace!(target: "views", event = %name, "registering callback");
        self.handlers.borrow_mut().insert(name, handler);
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.handlers.borrow_mut().remove(name).is_some()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.borrow().contains_key(name)
    }

    /// Fires with the registry itself as scope. Unknown names do nothing.
    pub fn fire(&self, name: &str, payload: &Value) -> bool {
        self.fire_scoped(name, payload, self)
    }

    pub fn fire_scoped(&self, name: &str, payload: &Value, scope: &dyn Any) -> bool {
        // Cloned out so the handler may register or fire other events.
        let handler = self.handlers.borrow().get(name).cloned();
        match handler {
            Some(handler) => {
                tracing::debug!(target: "views", event = name, "firing callback");
                handler(scope, payload);
                true
            }
            None => false,
        }
    }
}
