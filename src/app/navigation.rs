use std::cell::{Cell, RefCell};
use std::rc::Rc;

use thiserror::Error;

use super::context::AppContext;
use crate::ajax::{Callbacks, Method, RequestError, RequestHandle, RequestHooks, RequestOptions, Response};
use crate::loader::LoadError;
use crate::util::encode_component;
use crate::xml::{Document, Element};

pub const NAVIGATION_FAILED: &str = "Navigation failed to load.";
pub const FAILURE_LABEL: &str = "⚠️";
const MAIN_TEMPLATE_ID: &str = "templates/main.xml";
const M3U_EDITOR_ID: &str = "edit-m3u";

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("no element with id {0}")]
    UnknownElement(String),
    #[error("navigation item {0} has no url")]
    MissingUrl(String),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// A navigation bar selection handed over by the host.
pub struct NavigationEvent {
    pub navigation_item_id: String,
    success: Box<dyn FnOnce(Document)>,
    failure: Box<dyn FnOnce(String)>,
}

impl NavigationEvent {
    pub fn new(
        navigation_item_id: impl Into<String>,
        success: impl FnOnce(Document) + 'static,
        failure: impl FnOnce(String) + 'static,
    ) -> Self {
        Self {
            navigation_item_id: navigation_item_id.into(),
            success: Box::new(success),
            failure: Box::new(failure),
        }
    }

    fn fail(self) {
        (self.failure)(NAVIGATION_FAILED.to_string())
    }
}

struct NavigationHooks(Option<NavigationEvent>);

impl RequestHooks for NavigationHooks {
    fn success(&mut self, response: &Response) {
        let Some(event) = self.0.take() else {
            return;
        };
        match response.document() {
            Ok(document) => (event.success)(document),
            Err(err) => {
                tracing::warn!(target: "app", item = %event.navigation_item_id, error = %err, "navigation page is not valid xml");
                event.fail();
            }
        }
    }

    fn failure(&mut self, status: u16, _response: &Response) {
        if let Some(event) = self.0.take() {
            tracing::warn!(target: "app", item = %event.navigation_item_id, status, "navigation request failed");
            event.fail();
        }
    }
}

/// Handlers behind the main navigation bar and the list rows that call
/// back into the server.
#[derive(Clone)]
pub struct Navbar {
    ctx: AppContext,
    selected: Rc<Cell<Option<usize>>>,
}

impl Navbar {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            selected: Rc::new(Cell::new(None)),
        }
    }

    /// Index of the last navigation item the user picked.
    pub fn selected(&self) -> Option<usize> {
        self.selected.get()
    }

    pub fn navigate(
        &self,
        document: &Document,
        event: NavigationEvent,
    ) -> Result<RequestHandle, NavigationError> {
        let id = event.navigation_item_id.clone();
        if let Some(index) = document
            .root_element()
            .elements_by_tag_name("navigationItem")
            .iter()
            .position(|item| item.attr("id") == Some(id.as_str()))
        {
            self.selected.set(Some(index));
        }

        let url = match document.element_by_id(&id) {
            None => {
                event.fail();
                return Err(NavigationError::UnknownElement(id));
            }
            Some(item) => item
                .element_by_tag_name("url")
                .map(|url| url.text_content().trim().to_string())
                .filter(|url| !url.is_empty()),
        };
        let Some(url) = url else {
            event.fail();
            return Err(NavigationError::MissingUrl(id));
        };

        tracing::debug!(target: "app", item = %id, url = %url, "navigating");
        Ok(self
            .ctx
            .requests()
            .issue(RequestOptions::new(url), NavigationHooks(Some(event)))?)
    }

    /// Reloads the page behind the selected navigation item and swaps it
    /// in, keeping the bar on the same item.
    pub fn update_page(&self, url: &str) -> Result<RequestHandle, NavigationError> {
        let selected = self.selected.get();
        if selected == Some(0) {
            return Ok(self
                .ctx
                .loader()
                .load_and_swap_url(RequestOptions::new(url), None)?);
        }

        let pages = Rc::clone(self.ctx.pages());
        let handle = self
            .ctx
            .requests()
            .request_document(RequestOptions::new(url), move |document| {
                let Some(mut document) = document else {
                    tracing::warn!(target: "app", "page update did not return a document");
                    return;
                };
                if let Some(index) = selected {
                    if let Some(navigation) = document
                        .element_by_id_mut(MAIN_TEMPLATE_ID)
                        .and_then(|bar| bar.element_by_tag_name_mut("navigation"))
                    {
                        navigation.set_attribute("currentIndex", index.to_string());
                    }
                }
                pages.swap(document);
            })?;
        Ok(handle)
    }

    /// Calls `url` and pops the current page whatever the outcome.
    pub fn call_url_and_unload(
        &self,
        url: &str,
        method: Method,
    ) -> Result<RequestHandle, NavigationError> {
        let on_success = Rc::clone(self.ctx.pages());
        let on_failure = Rc::clone(self.ctx.pages());
        let hooks = Callbacks::new()
            .on_success(move |_| on_success.unload_page())
            .on_failure(move |_, _| on_failure.unload_page());
        Ok(self
            .ctx
            .requests()
            .issue(RequestOptions::new(url).method(method), hooks)?)
    }

    /// Calls `url` and copies the `rightLabel` of element `id` from the
    /// reply into `document`. Rows already at zero are left alone.
    pub fn call_url_and_update_element(
        &self,
        document: &Rc<RefCell<Document>>,
        id: &str,
        url: &str,
        method: Method,
    ) -> Result<Option<RequestHandle>, NavigationError> {
        {
            let mut doc = document.borrow_mut();
            let element = doc
                .element_by_id_mut(id)
                .ok_or_else(|| NavigationError::UnknownElement(id.to_string()))?;
            if right_label(element).as_deref() == Some("0") {
                return Ok(None);
            }
            add_spinner(element);
        }

        let on_success = Rc::clone(document);
        let on_failure = Rc::clone(document);
        let success_id = id.to_string();
        let failure_id = id.to_string();
        let hooks = Callbacks::new()
            .on_success(move |response| {
                let label = response.document().ok().and_then(|reply| {
                    reply
                        .element_by_id(&success_id)
                        .and_then(right_label)
                });
                let mut doc = on_success.borrow_mut();
                let Some(element) = doc.element_by_id_mut(&success_id) else {
                    return;
                };
                remove_spinner(element);
                let label = label.unwrap_or_else(|| FAILURE_LABEL.to_string());
                let dimmed = label == "0";
                set_right_label(element, label);
                if dimmed {
                    element.set_attribute("dimmed", "true");
                }
            })
            .on_failure(move |status, _| {
                tracing::warn!(target: "app", id = %failure_id, status, "row update failed");
                let mut doc = on_failure.borrow_mut();
                if let Some(element) = doc.element_by_id_mut(&failure_id) {
                    remove_spinner(element);
                    set_right_label(element, FAILURE_LABEL);
                }
            });

        let handle = self
            .ctx
            .requests()
            .issue(RequestOptions::new(url).method(method), hooks);
        if handle.is_err() {
            if let Some(element) = document.borrow_mut().element_by_id_mut(id) {
                remove_spinner(element);
            }
        }
        Ok(Some(handle?))
    }

    /// Posts a new playlist address to the server and mirrors the result in
    /// the settings row.
    pub fn set_m3u_address(
        &self,
        document: &Rc<RefCell<Document>>,
        server_url: &str,
        value: &str,
    ) -> Result<RequestHandle, NavigationError> {
        let url = format!(
            "{}/set-m3u.xml?m3u={}",
            server_url.trim_end_matches('/'),
            encode_component(value)
        );
        let on_success = Rc::clone(document);
        let on_failure = Rc::clone(document);
        let value = value.to_string();
        let hooks = Callbacks::new()
            .on_success(move |_| set_m3u_label(&on_success, &value))
            .on_failure(move |status, _| set_m3u_label(&on_failure, &status.to_string()));
        Ok(self
            .ctx
            .requests()
            .issue(RequestOptions::new(url).method(Method::Post), hooks)?)
    }

    /// Restores the settings row after the user backs out of the editor.
    pub fn cancel_m3u_edit(&self, document: &Rc<RefCell<Document>>, default_value: &str) {
        set_m3u_label(document, default_value);
    }
}

fn right_label(element: &Element) -> Option<String> {
    element
        .element_by_tag_name("rightLabel")
        .map(|label| label.text_content())
}

fn set_right_label(element: &mut Element, text: impl Into<String>) {
    match element.element_by_tag_name_mut("rightLabel") {
        Some(label) => label.set_text_content(text),
        None => element.append_child(Element::new("rightLabel").with_text(text)),
    }
}

fn add_spinner(element: &mut Element) {
    if let Some(accessories) = element.element_by_tag_name_mut("accessories") {
        accessories.append_child(Element::new("spinner"));
    }
}

fn remove_spinner(element: &mut Element) {
    if let Some(accessories) = element.element_by_tag_name_mut("accessories") {
        accessories.remove_child_by_tag("spinner");
    }
}

fn set_m3u_label(document: &Rc<RefCell<Document>>, text: &str) {
    let mut doc = document.borrow_mut();
    match doc
        .element_by_id_mut(M3U_EDITOR_ID)
        .and_then(|row| row.element_by_tag_name_mut("label2"))
    {
        Some(label) => label.set_text_content(text),
        None => tracing::debug!(target: "app", "no playlist address row to update"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ajax::testing::complete;
    use crate::app::context::testing::test_app;

    const MENU: &str = r#"<atv><body><viewWithNavigationBar id="templates/main.xml"><navigation>
        <navigationItem id="home"><title>Home</title><url>http://tv/home.xml</url></navigationItem>
        <navigationItem id="recent"><title>Recent</title><url>http://tv/recent.xml</url></navigationItem>
        <navigationItem id="broken"><title>Broken</title></navigationItem>
    </navigation></viewWithNavigationBar></body></atv>"#;

    const LIST: &str = r#"<atv><body><listWithPreview><menu><sections><menuSection><items>
        <oneLineMenuItem id="clear-recent"><label>Clear</label><rightLabel>3</rightLabel><accessories/></oneLineMenuItem>
        <oneLineMenuItem id="empty"><label>Empty</label><rightLabel>0</rightLabel><accessories/></oneLineMenuItem>
        <oneLineMenuItem id="edit-m3u"><label>Playlist</label><label2>http://old</label2></oneLineMenuItem>
    </items></menuSection></sections></menu></listWithPreview></body></atv>"#;

    type Outcome = Rc<RefCell<Option<Result<Document, String>>>>;

    fn event(id: &str) -> (Outcome, NavigationEvent) {
        let outcome: Outcome = Rc::new(RefCell::new(None));
        let on_success = outcome.clone();
        let on_failure = outcome.clone();
        let event = NavigationEvent::new(
            id,
            move |document| *on_success.borrow_mut() = Some(Ok(document)),
            move |message| *on_failure.borrow_mut() = Some(Err(message)),
        );
        (outcome, event)
    }

    #[test]
    fn navigate_loads_the_item_url() {
        let app = test_app();
        let navbar = Navbar::new(app.ctx.clone());
        let menu = Document::parse(MENU).unwrap();
        let (outcome, event) = event("recent");

        let handle = navbar.navigate(&menu, event).unwrap();
        assert_eq!(navbar.selected(), Some(1));
        assert_eq!(
            app.transfers.last().calls.borrow()[0],
            "open GET http://tv/recent.xml async=true"
        );

        complete(app.ctx.requests(), handle.id(), 200, "<atv><body/></atv>");
        assert!(matches!(outcome.borrow().as_ref(), Some(Ok(_))));
    }

    #[test]
    fn navigate_failure_reports_message() {
        let app = test_app();
        let navbar = Navbar::new(app.ctx.clone());
        let menu = Document::parse(MENU).unwrap();
        let (outcome, event) = event("home");
        let handle = navbar.navigate(&menu, event).unwrap();
        complete(app.ctx.requests(), handle.id(), 500, "");
        assert_eq!(
            outcome.borrow().as_ref().unwrap().as_ref().unwrap_err(),
            NAVIGATION_FAILED
        );

        let (outcome, event) = self::event("broken");
        assert!(matches!(
            navbar.navigate(&menu, event),
            Err(NavigationError::MissingUrl(_))
        ));
        assert!(matches!(outcome.borrow().as_ref(), Some(Err(_))));
    }

    #[test]
    fn update_page_marks_the_selected_item() {
        let app = test_app();
        let navbar = Navbar::new(app.ctx.clone());
        let menu = Document::parse(MENU).unwrap();
        let (_, event) = event("recent");
        navbar.navigate(&menu, event).unwrap();

        let handle = navbar.update_page("http://tv/main.xml").unwrap();
        complete(app.ctx.requests(), handle.id(), 200, MENU);
        assert_eq!(app.pages.log(), vec!["swap document"]);
    }

    #[test]
    fn update_page_on_first_item_swaps_through_the_loader() {
        let app = test_app();
        let navbar = Navbar::new(app.ctx.clone());
        let menu = Document::parse(MENU).unwrap();
        let (_, event) = event("home");
        navbar.navigate(&menu, event).unwrap();

        let handle = navbar.update_page("http://tv/main.xml").unwrap();
        assert_eq!(app.pages.log(), vec!["show"]);
        complete(app.ctx.requests(), handle.id(), 200, MENU);
        assert_eq!(app.pages.log(), vec!["show", "materialize document", "unload_page"]);
    }

    #[test]
    fn call_url_and_unload_pops_either_way() {
        let app = test_app();
        let navbar = Navbar::new(app.ctx.clone());
        let ok = navbar.call_url_and_unload("http://tv/a", Method::Post).unwrap();
        complete(app.ctx.requests(), ok.id(), 200, "");
        let failed = navbar.call_url_and_unload("http://tv/b", Method::Get).unwrap();
        complete(app.ctx.requests(), failed.id(), 404, "");
        assert_eq!(app.pages.log(), vec!["unload_page", "unload_page"]);
    }

    #[test]
    fn update_element_copies_label_and_dims_at_zero() {
        let app = test_app();
        let navbar = Navbar::new(app.ctx.clone());
        let list = Rc::new(RefCell::new(Document::parse(LIST).unwrap()));

        let handle = navbar
            .call_url_and_update_element(&list, "clear-recent", "http://tv/clear-recent.xml", Method::Get)
            .unwrap()
            .unwrap();
        assert!(list
            .borrow()
            .element_by_id("clear-recent")
            .unwrap()
            .element_by_tag_name("spinner")
            .is_some());

        let reply = LIST.replace("<rightLabel>3</rightLabel>", "<rightLabel>0</rightLabel>");
        complete(app.ctx.requests(), handle.id(), 200, &reply);
        let doc = list.borrow();
        let row = doc.element_by_id("clear-recent").unwrap();
        assert_eq!(right_label(row).as_deref(), Some("0"));
        assert_eq!(row.attr("dimmed"), Some("true"));
        assert!(row.element_by_tag_name("spinner").is_none());
    }

    #[test]
    fn update_element_skips_zero_rows_and_flags_failures() {
        let app = test_app();
        let navbar = Navbar::new(app.ctx.clone());
        let list = Rc::new(RefCell::new(Document::parse(LIST).unwrap()));

        assert!(navbar
            .call_url_and_update_element(&list, "empty", "http://tv/x", Method::Get)
            .unwrap()
            .is_none());
        assert!(app.transfers.created.borrow().is_empty());

        let handle = navbar
            .call_url_and_update_element(&list, "clear-recent", "http://tv/x", Method::Get)
            .unwrap()
            .unwrap();
        complete(app.ctx.requests(), handle.id(), 500, "");
        let doc = list.borrow();
        let row = doc.element_by_id("clear-recent").unwrap();
        assert_eq!(right_label(row).as_deref(), Some(FAILURE_LABEL));
        assert!(row.element_by_tag_name("spinner").is_none());
    }

    #[test]
    fn m3u_address_row_follows_the_reply() {
        let app = test_app();
        let navbar = Navbar::new(app.ctx.clone());
        let list = Rc::new(RefCell::new(Document::parse(LIST).unwrap()));
        let label = |list: &Rc<RefCell<Document>>| {
            list.borrow()
                .element_by_id("edit-m3u")
                .and_then(|row| row.element_by_tag_name("label2"))
                .map(|label| label.text_content())
        };

        let handle = navbar
            .set_m3u_address(&list, "http://tv/", "http://lists/a b.m3u")
            .unwrap();
        assert_eq!(
            app.transfers.last().calls.borrow()[0],
            "open POST http://tv/set-m3u.xml?m3u=http%3A%2F%2Flists%2Fa%20b.m3u async=true"
        );
        complete(app.ctx.requests(), handle.id(), 200, "");
        assert_eq!(label(&list).as_deref(), Some("http://lists/a b.m3u"));

        let handle = navbar.set_m3u_address(&list, "http://tv", "bad").unwrap();
        complete(app.ctx.requests(), handle.id(), 400, "");
        assert_eq!(label(&list).as_deref(), Some("400"));

        navbar.cancel_m3u_edit(&list, "http://old");
        assert_eq!(label(&list).as_deref(), Some("http://old"));
    }
}
