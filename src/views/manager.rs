use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use super::callbacks::{CallbackRegistry, ON_LOAD_ERROR, ON_LOAD_SUCCESS, ON_UNLOAD_VIEW};
use super::dialog::OptionDialog;
use crate::host::{DomView, DomViewFactory};
use crate::xml::Document;

pub const LOAD_ERROR_ID: &str = "LOADERROR";
pub const LOAD_ERROR_MESSAGE: &str = "Unable to load view.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewError {
    #[error("a view name is required")]
    MissingName,
    #[error("no view named {0}")]
    NotFound(String),
    #[error("no document to load into view {0}")]
    NoDocument(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ViewHandle(pub u64);

impl fmt::Display for ViewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

struct ViewEntry {
    handle: ViewHandle,
    view: Rc<dyn DomView>,
    default_document: Option<Document>,
    document: Option<String>,
}

#[derive(Default)]
struct ManagerState {
    entries: HashMap<String, ViewEntry>,
    names: Vec<String>,
    next_handle: u64,
}

/// Named DOM views. Lifecycle events are broadcast through the shared
/// [`CallbackRegistry`].
#[derive(Clone)]
pub struct ViewManager {
    state: Rc<RefCell<ManagerState>>,
    factory: Rc<dyn DomViewFactory>,
    callbacks: CallbackRegistry,
}

impl ViewManager {
    pub fn new(factory: Rc<dyn DomViewFactory>, callbacks: CallbackRegistry) -> Self {
        Self {
            state: Rc::new(RefCell::new(ManagerState::default())),
            factory,
            callbacks,
        }
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    /// Creates (or re-creates) the view `name`. A view already stored under
    /// the name is unloaded first and then replaced.
    pub fn create(&self, name: &str, dialog: Option<&OptionDialog>) -> Result<ViewHandle, ViewError> {
        if name.trim().is_empty() {
            tracing::error!(target: "views", "refusing to create a view without a name");
            return Err(ViewError::MissingName);
        }

        let previous = self
            .state
            .borrow()
            .entries
            .get(name)
            .map(|entry| Rc::clone(&entry.view));
        if let Some(previous) = previous {
            tracing::debug!(target: "views", view = name, "replacing existing view");
            previous.unload();
        }

        let view = self.factory.create();
        let handle = {
            let mut state = self.state.borrow_mut();
            state.next_handle += 1;
            ViewHandle(state.next_handle)
        };

        let callbacks = self.callbacks.clone();
        let unload_name = name.to_string();
        view.set_on_unload(Box::new(move || {
            tracing::debug!(target: "views", view = %unload_name, "view unloaded");
            callbacks.fire(
                ON_UNLOAD_VIEW,
                &json!({ "name": unload_name, "handle": handle }),
            );
        }));

        let default_document = dialog.map(|dialog| dialog.build(&self.callbacks));

        let mut state = self.state.borrow_mut();
        state.entries.insert(
            name.to_string(),
            ViewEntry {
                handle,
                view,
                default_document,
                document: None,
            },
        );
        if !state.names.iter().any(|existing| existing == name) {
            state.names.push(name.to_string());
        }
        Ok(handle)
    }

    /// Loads `document` (or the view's remembered dialog document) into
    /// `name`, creating the view if needed.
    pub fn load(&self, name: &str, document: Option<Document>) -> Result<ViewHandle, ViewError> {
        if !self.contains(name) {
            self.create(name, None)?;
        }

        let (view, handle, document) = {
            let state = self.state.borrow();
            let entry = state
                .entries
                .get(name)
                .ok_or_else(|| ViewError::NotFound(name.to_string()))?;
            let document = document
                .or_else(|| entry.default_document.clone())
                .ok_or_else(|| ViewError::NoDocument(name.to_string()))?;
            (Rc::clone(&entry.view), entry.handle, document)
        };

        tracing::debug!(target: "views", view = name, %handle, "loading view");
        let serialized = document.serialize_to_string();
        let manager = self.clone();
        let view_name = name.to_string();
        view.load(
            document,
            Box::new(move |accepted| manager.finish_load(&view_name, handle, accepted, serialized)),
        );
        Ok(handle)
    }

    fn finish_load(&self, name: &str, handle: ViewHandle, accepted: bool, serialized: String) {
        if !accepted {
            tracing::warn!(target: "views", view = name, "view failed to load");
            self.callbacks.fire(
                ON_LOAD_ERROR,
                &json!({ "id": LOAD_ERROR_ID, "view": name, "msg": LOAD_ERROR_MESSAGE }),
            );
            return;
        }

        {
            let mut state = self.state.borrow_mut();
            if let Some(entry) = state
                .entries
                .get_mut(name)
                .filter(|entry| entry.handle == handle)
            {
                entry.document = Some(serialized);
            }
        }
        self.callbacks
            .fire(ON_LOAD_SUCCESS, &json!({ "view": name }));
    }

    pub fn unload(&self, name: &str) -> Result<(), ViewError> {
        let view = self
            .state
            .borrow()
            .entries
            .get(name)
            .map(|entry| Rc::clone(&entry.view))
            .ok_or_else(|| ViewError::NotFound(name.to_string()))?;
        view.unload();
        Ok(())
    }

    /// Unloads and forgets `name`.
    pub fn remove(&self, name: &str) -> Result<(), ViewError> {
        self.unload(name)?;
        let mut state = self.state.borrow_mut();
        state.entries.remove(name);
        state.names.retain(|existing| existing != name);
        Ok(())
    }

    pub fn list_names(&self) -> Vec<String> {
        self.state.borrow().names.clone()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.borrow().entries.contains_key(name)
    }

    pub fn handle(&self, name: &str) -> Option<ViewHandle> {
        self.state.borrow().entries.get(name).map(|entry| entry.handle)
    }

    /// Serialized text of the last document the view accepted.
    pub fn document_text(&self, name: &str) -> Option<String> {
        self.state
            .borrow()
            .entries
            .get(name)
            .and_then(|entry| entry.document.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::FakeViews;
    use crate::views::DialogOption;
    use serde_json::Value;

    fn manager() -> (ViewManager, Rc<FakeViews>, Rc<RefCell<Vec<(String, Value)>>>) {
        let views = Rc::new(FakeViews::default());
        let callbacks = CallbackRegistry::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        for name in [ON_LOAD_SUCCESS, ON_LOAD_ERROR, ON_UNLOAD_VIEW] {
            let sink = events.clone();
            callbacks.register(name, move |_, payload| {
                sink.borrow_mut().push((name.to_string(), payload.clone()))
            });
        }
        (ViewManager::new(views.clone(), callbacks), views, events)
    }

    fn page() -> Document {
        Document::parse("<atv><body><scroller id=\"x\"/></body></atv>").unwrap()
    }

    #[test]
    fn create_requires_a_name() {
        let (manager, _, _) = manager();
        assert_eq!(manager.create("", None), Err(ViewError::MissingName));
        assert!(manager.list_names().is_empty());
    }

    #[test]
    fn load_success_caches_document_and_broadcasts() {
        let (manager, _, events) = manager();
        manager.create("A", None).unwrap();
        manager.load("A", Some(page())).unwrap();

        assert_eq!(
            *events.borrow(),
            vec![(ON_LOAD_SUCCESS.to_string(), json!({"view": "A"}))]
        );
        assert!(manager.document_text("A").unwrap().contains("scroller"));
        assert_eq!(manager.list_names(), vec!["A"]);
    }

    #[test]
    fn load_failure_broadcasts_error_and_caches_nothing() {
        let (manager, views, events) = manager();
        views.reject_next(1);
        manager.load("A", Some(page())).unwrap();
        assert_eq!(
            *events.borrow(),
            vec![(
                ON_LOAD_ERROR.to_string(),
                json!({"id": "LOADERROR", "view": "A", "msg": "Unable to load view."})
            )]
        );
        assert_eq!(manager.document_text("A"), None);
    }

    #[test]
    fn implicit_create_matches_explicit_create() {
        let (explicit, _, explicit_events) = manager();
        explicit.create("A", None).unwrap();
        explicit.load("A", Some(page())).unwrap();

        let (implicit, _, implicit_events) = manager();
        implicit.load("A", Some(page())).unwrap();

        assert_eq!(explicit.list_names(), implicit.list_names());
        assert_eq!(*explicit_events.borrow(), *implicit_events.borrow());
        assert_eq!(explicit.document_text("A"), implicit.document_text("A"));
    }

    #[test]
    fn load_without_any_document_fails() {
        let (manager, _, _) = manager();
        assert_eq!(
            manager.load("A", None),
            Err(ViewError::NoDocument("A".to_string()))
        );
    }

    #[test]
    fn dialog_document_is_the_default() {
        let (manager, views, _) = manager();
        let dialog = OptionDialog::new("Title", "Body")
            .option(DialogOption::new("One").on_select(Rc::new(|_, _| {})));
        manager.create("Dialog", Some(&dialog)).unwrap();
        manager.load("Dialog", None).unwrap();

        let loaded = views.loaded();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].element_by_id("DialogOption_0").is_some());
        assert!(manager.callbacks().is_registered("DialogOption_0"));
    }

    #[test]
    fn scenario_create_load_remove_unload() {
        let (manager, _, events) = manager();
        manager.create("A", None).unwrap();
        manager.load("A", Some(page())).unwrap();
        manager.remove("A").unwrap();

        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, ON_LOAD_SUCCESS);
        assert_eq!(events[1].0, ON_UNLOAD_VIEW);
        assert_eq!(events[1].1["name"], "A");
        drop(events);

        assert!(manager.list_names().is_empty());
        assert_eq!(manager.unload("A"), Err(ViewError::NotFound("A".to_string())));
    }

    #[test]
    fn recreate_unloads_previous_view_once_and_keeps_position() {
        let (manager, views, events) = manager();
        let first = manager.create("A", None).unwrap();
        manager.create("B", None).unwrap();
        let second = manager.create("A", None).unwrap();

        assert_ne!(first, second);
        assert_eq!(manager.list_names(), vec!["A", "B"]);
        assert_eq!(views.unloaded(), vec![0]);
        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1, json!({"name": "A", "handle": first.0}));
    }

    #[test]
    fn removed_names_move_to_the_end_when_re_added() {
        let (manager, _, _) = manager();
        for name in ["A", "B", "C"] {
            manager.create(name, None).unwrap();
        }
        manager.remove("A").unwrap();
        manager.create("A", None).unwrap();
        assert_eq!(manager.list_names(), vec!["B", "C", "A"]);
    }
}
