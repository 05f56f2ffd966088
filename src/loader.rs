use std::cell::Cell;
use std::rc::Rc;

use thiserror::Error;

use crate::ajax::{RequestError, RequestHandle, RequestHooks, RequestId, RequestOptions, RequestRegistry, Response};
use crate::host::{PageStack, Surface};
use crate::xml::{error_document, unavailable_document, Document, UnavailableText, XmlError};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("document transform failed: {0}")]
    Process(String),
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error(transparent)]
    Request(#[from] RequestError),
}

/// Optional rewrite applied to the fetched document before it is shown.
pub type Transform = Box<dyn FnOnce(Document) -> Result<Document, LoadError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Push,
    Swap,
}

/// Fetches documents into optimistic loading surfaces and substitutes the
/// "unavailable" dialog when anything goes wrong.
#[derive(Clone)]
pub struct DocumentLoader {
    registry: RequestRegistry,
    pages: Rc<dyn PageStack>,
    fallback: UnavailableText,
}

impl DocumentLoader {
    pub fn new(registry: RequestRegistry, pages: Rc<dyn PageStack>) -> Self {
        Self {
            registry,
            pages,
            fallback: UnavailableText::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: UnavailableText) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn load_url(
        &self,
        options: RequestOptions,
        process: Option<Transform>,
    ) -> Result<RequestHandle, LoadError> {
        self.load(Mode::Push, options, process)
    }

    /// Like [`load_url`](Self::load_url), but pops the page the user came
    /// from once the new one is on screen.
    pub fn load_and_swap_url(
        &self,
        options: RequestOptions,
        process: Option<Transform>,
    ) -> Result<RequestHandle, LoadError> {
        self.load(Mode::Swap, options, process)
    }

    pub fn load_error(&self, message: &str, description: &str) {
        self.pages.push(error_document(message, description));
    }

    pub fn load_and_swap_error(&self, message: &str, description: &str) {
        self.pages.swap(error_document(message, description));
    }

    fn load(
        &self,
        mode: Mode,
        options: RequestOptions,
        process: Option<Transform>,
    ) -> Result<RequestHandle, LoadError> {
        let surface = self.pages.new_surface();
        surface.show();

        let pending: Rc<Cell<Option<RequestId>>> = Rc::new(Cell::new(None));
        let registry = self.registry.clone();
        let cancel_slot = Rc::clone(&pending);
        surface.set_on_cancel(Box::new(move || {
            if let Some(id) = cancel_slot.take() {
                tracing::debug!(target: "loader", %id, "surface cancelled");
                registry.cancel(id);
            }
        }));

        let presenter = Presenter {
            surface: Rc::clone(&surface),
            pages: Rc::clone(&self.pages),
            mode,
            fallback: self.fallback.clone(),
        };
        let hooks = LoadHooks {
            presenter: presenter.clone(),
            process,
            pending: Rc::clone(&pending),
        };

        match self.registry.issue(options, hooks) {
            Ok(handle) => {
                if self.registry.is_active(handle.id()) {
                    pending.set(Some(handle.id()));
                }
                Ok(handle)
            }
            Err(err) => {
                tracing::error!(target: "loader", error = %err, "unable to issue document request");
                presenter.show_fallback();
                Err(err.into())
            }
        }
    }
}

#[derive(Clone)]
struct Presenter {
    surface: Rc<dyn Surface>,
    pages: Rc<dyn PageStack>,
    mode: Mode,
    fallback: UnavailableText,
}

impl Presenter {
    fn show(&self, document: Document) {
        let fallback = self.clone();
        self.surface.materialize(
            document,
            Box::new(move |accepted| {
                if accepted {
                    fallback.finish();
                } else {
                    tracing::warn!(target: "loader", "document was rejected, showing fallback");
                    fallback.show_fallback();
                }
            }),
        );
    }

    fn show_fallback(&self) {
        let presenter = self.clone();
        self.surface.materialize(
            unavailable_document(&self.fallback),
            Box::new(move |accepted| {
                if accepted {
                    presenter.finish();
                } else {
                    tracing::error!(target: "loader", "fallback document was rejected");
                }
            }),
        );
    }

    fn finish(&self) {
        if self.mode == Mode::Swap {
            self.pages.unload_page();
        }
    }
}

struct LoadHooks {
    presenter: Presenter,
    process: Option<Transform>,
    pending: Rc<Cell<Option<RequestId>>>,
}

impl LoadHooks {
    fn prepare(&mut self, response: &Response) -> Result<Document, LoadError> {
        let document = response.document()?;
        match self.process.take() {
            Some(process) => process(document),
            None => Ok(document),
        }
    }
}

impl RequestHooks for LoadHooks {
    fn success(&mut self, response: &Response) {
        self.pending.set(None);
        match self.prepare(response) {
            Ok(document) => self.presenter.show(document),
            Err(err) => {
                tracing::warn!(target: "loader", error = %err, "unable to prepare document");
                self.presenter.show_fallback();
            }
        }
    }

    fn failure(&mut self, status: u16, _response: &Response) {
        self.pending.set(None);
        tracing::warn!(target: "loader", status, "document request failed");
        self.presenter.show_fallback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ajax::testing::{complete, FakeFactory};
    use crate::host::testing::FakePages;
    use crate::host::LogNotifier;

    const PAGE: &str = r#"<atv><body><scroller id="page"/></body></atv>"#;

    fn loader() -> (DocumentLoader, RequestRegistry, Rc<FakePages>) {
        let registry = RequestRegistry::new(
            Rc::new(FakeFactory::default()),
            Rc::new(LogNotifier::new()),
        );
        let pages = Rc::new(FakePages::default());
        (DocumentLoader::new(registry.clone(), pages.clone()), registry, pages)
    }

    #[test]
    fn plain_load_shows_surface_then_document() {
        let (loader, registry, pages) = loader();
        let handle = loader.load_url(RequestOptions::new("http://tv/page.xml"), None).unwrap();
        assert_eq!(pages.log(), vec!["show"]);

        complete(&registry, handle.id(), 200, PAGE);
        assert_eq!(pages.log(), vec!["show", "materialize document"]);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn swap_pops_previous_page_after_success() {
        let (loader, registry, pages) = loader();
        let handle = loader
            .load_and_swap_url(RequestOptions::new("http://tv/page.xml"), None)
            .unwrap();
        complete(&registry, handle.id(), 200, PAGE);
        assert_eq!(pages.log(), vec!["show", "materialize document", "unload_page"]);
    }

    #[test]
    fn failed_request_shows_fallback() {
        let (loader, registry, pages) = loader();
        let handle = loader
            .load_and_swap_url(RequestOptions::new("http://tv/page.xml"), None)
            .unwrap();
        complete(&registry, handle.id(), 500, "");
        assert_eq!(pages.log(), vec!["show", "materialize fallback", "unload_page"]);
    }

    #[test]
    fn rejected_document_gets_exactly_one_fallback() {
        let (loader, registry, pages) = loader();
        pages.reject_next(2);
        let handle = loader
            .load_and_swap_url(RequestOptions::new("http://tv/page.xml"), None)
            .unwrap();
        complete(&registry, handle.id(), 200, PAGE);
        assert_eq!(
            pages.log(),
            vec!["show", "materialize document", "materialize fallback"]
        );
    }

    #[test]
    fn transform_errors_and_bad_xml_fall_back() {
        let (loader, registry, pages) = loader();
        let handle = loader
            .load_url(
                RequestOptions::new("http://tv/page.xml"),
                Some(Box::new(|_| Err(LoadError::Process("boom".into())))),
            )
            .unwrap();
        complete(&registry, handle.id(), 200, PAGE);

        let handle = loader.load_url(RequestOptions::new("http://tv/bad.xml"), None).unwrap();
        complete(&registry, handle.id(), 200, "<atv><body>");

        assert_eq!(
            pages.log(),
            vec!["show", "materialize fallback", "show", "materialize fallback"]
        );
    }

    #[test]
    fn transform_output_is_what_gets_shown() {
        let (loader, registry, pages) = loader();
        let handle = loader
            .load_url(
                RequestOptions::new("http://tv/page.xml"),
                Some(Box::new(|mut document: Document| {
                    document.root_element_mut().set_attribute("processed", "yes");
                    Ok(document)
                })),
            )
            .unwrap();
        complete(&registry, handle.id(), 200, PAGE);
        let shown = pages.materialized();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].root_element().attr("processed"), Some("yes"));
    }

    #[test]
    fn cancelling_the_surface_aborts_the_request() {
        let (loader, registry, pages) = loader();
        let handle = loader.load_url(RequestOptions::new("http://tv/slow.xml"), None).unwrap();
        pages.cancel_last_surface();
        assert!(!registry.is_active(handle.id()));

        complete(&registry, handle.id(), 200, PAGE);
        assert_eq!(pages.log(), vec!["show"]);
    }

    #[test]
    fn missing_url_still_replaces_the_spinner() {
        let (loader, _, pages) = loader();
        let err = loader.load_url(RequestOptions::default(), None).unwrap_err();
        assert!(matches!(err, LoadError::Request(RequestError::MissingUrl)));
        assert_eq!(pages.log(), vec!["show", "materialize fallback"]);
    }

    #[test]
    fn error_pages_go_straight_to_the_stack() {
        let (loader, _, pages) = loader();
        loader.load_error("Oops", "details");
        loader.load_and_swap_error("Oops", "details");
        assert_eq!(pages.log(), vec!["push fallback", "swap fallback"]);
    }
}
