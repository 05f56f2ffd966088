use std::rc::Rc;

use crate::ajax::{RequestOptions, RequestRegistry, TransferFactory};
use crate::host::{DomViewFactory, Notifier, PageStack};
use crate::loader::{DocumentLoader, LoadError};
use crate::storage::{KeyValueStore, MemoryStore};
use crate::views::{CallbackRegistry, ViewManager};
use crate::xml::UnavailableText;

/// Showing this page logs the user out.
pub const LOGOUT_PAGE_ID: &str = "com.sample.javascript-logout";

/// Host objects the application is wired to.
#[derive(Clone)]
pub struct HostHandles {
    pub pages: Rc<dyn PageStack>,
    pub views: Rc<dyn DomViewFactory>,
    pub notifier: Rc<dyn Notifier>,
}

/// Owns the registries and stores shared by every handler. Cloning hands
/// out another reference to the same state.
#[derive(Clone)]
pub struct AppContext {
    requests: RequestRegistry,
    loader: DocumentLoader,
    callbacks: CallbackRegistry,
    views: ViewManager,
    session: Rc<dyn KeyValueStore>,
    device: Rc<dyn KeyValueStore>,
    pages: Rc<dyn PageStack>,
}

impl AppContext {
    pub fn new(
        transfers: Rc<dyn TransferFactory>,
        host: HostHandles,
        device: Rc<dyn KeyValueStore>,
    ) -> Self {
        let requests = RequestRegistry::new(transfers, Rc::clone(&host.notifier));
        Self::with_registry(requests, host, device)
    }

    /// Builds the context around an existing registry, e.g. one made by
    /// [`http_registry`](crate::ajax::http_registry).
    pub fn with_registry(
        requests: RequestRegistry,
        host: HostHandles,
        device: Rc<dyn KeyValueStore>,
    ) -> Self {
        let callbacks = CallbackRegistry::new();
        let views = ViewManager::new(host.views, callbacks.clone());
        let loader = DocumentLoader::new(requests.clone(), Rc::clone(&host.pages));
        Self {
            requests,
            loader,
            callbacks,
            views,
            session: Rc::new(MemoryStore::new()),
            device,
            pages: host.pages,
        }
    }

    pub fn with_fallback(mut self, fallback: UnavailableText) -> Self {
        self.loader = self.loader.with_fallback(fallback);
        self
    }

    pub fn requests(&self) -> &RequestRegistry {
        &self.requests
    }

    pub fn loader(&self) -> &DocumentLoader {
        &self.loader
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    pub fn views(&self) -> &ViewManager {
        &self.views
    }

    pub fn session(&self) -> &dyn KeyValueStore {
        self.session.as_ref()
    }

    pub fn device(&self) -> &dyn KeyValueStore {
        self.device.as_ref()
    }

    pub fn pages(&self) -> &Rc<dyn PageStack> {
        &self.pages
    }

    /// Loads the application's root page.
    pub fn on_app_entry(&self, root_url: &str) -> Result<(), LoadError> {
        tracing::info!(target: "app", url = root_url, "entering application");
        self.loader.load_url(RequestOptions::new(root_url), None)?;
        Ok(())
    }

    /// Cancels every in-flight request.
    pub fn on_app_exit(&self) {
        let cancelled = self.requests.cancel_all();
        tracing::info!(target: "app", cancelled, "application exited");
    }

    /// Called when a page is shown. Showing [`LOGOUT_PAGE_ID`] logs the
    /// user out.
    pub fn on_page_load(&self, page_id: &str) {
        tracing::info!(target: "app", page = page_id, "page loaded");
        if page_id == LOGOUT_PAGE_ID {
            self.logout();
        }
    }

    pub fn on_page_unload(&self, page_id: &str) {
        tracing::info!(target: "app", page = page_id, "page unloaded");
    }

    /// Another page was pushed on top of `page_id`.
    pub fn on_page_buried(&self, page_id: &str) {
        tracing::debug!(target: "app", page = page_id, "page buried");
    }

    /// `page_id` is back on top of the stack.
    pub fn on_page_exhumed(&self, page_id: &str) {
        tracing::debug!(target: "app", page = page_id, "page exhumed");
    }
}


#[cfg(test)]
mod tests {
    use super::testing::test_app;
    use super::LOGOUT_PAGE_ID;
    use crate::storage::KeyValueStore;

    #[test]
    fn app_entry_loads_root_and_exit_cancels() {
        let app = test_app();
        app.ctx.on_app_entry("http://tv/root.xml").unwrap();
        assert_eq!(app.pages.log(), vec!["show"]);
        assert_eq!(app.ctx.requests().active_count(), 1);

        app.ctx.on_app_exit();
        assert_eq!(app.ctx.requests().active_count(), 0);
        assert!(app.transfers.last().aborted.get());
    }

    #[test]
    fn logout_page_clears_both_stores() {
        let app = test_app();
        app.ctx.session().set("token", "abc").unwrap();
        app.ctx.device().set("itms-link", "itms://x").unwrap();

        app.ctx.on_page_load("com.atvkit.main");
        assert_eq!(app.ctx.session().get("token").unwrap().as_deref(), Some("abc"));

        app.ctx.on_page_buried("com.atvkit.main");
        app.ctx.on_page_exhumed("com.atvkit.main");
        app.ctx.on_page_unload("com.atvkit.main");
        app.ctx.on_page_load(LOGOUT_PAGE_ID);
        assert_eq!(app.ctx.session().get("token").unwrap(), None);
        assert_eq!(app.ctx.device().get("itms-link").unwrap(), None);
    }
}
