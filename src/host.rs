//! Seams to the set-top box host: page stack, loading surfaces, DOM views,
//! overlays and alerts. The library only talks to the host through these
//! traits; every method takes `&self` so host callbacks may re-enter the
//! library while a call is in progress.

use std::cell::RefCell;
use std::rc::Rc;

use crate::views::{Animation, AttributedText, Color, Frame};
use crate::xml::Document;

/// Invoked once a document has been handed to the host. `true` means the
/// host accepted it.
pub type Completion = Box<dyn FnOnce(bool)>;

/// A pending page shown while content loads.
pub trait Surface {
    fn show(&self);
    fn materialize(&self, document: Document, done: Completion);
    /// The host calls the hook when the user backs out before the
    /// document arrives.
    fn set_on_cancel(&self, hook: Box<dyn FnMut()>);
}

pub trait PageStack {
    fn new_surface(&self) -> Rc<dyn Surface>;
    fn push(&self, document: Document);
    fn swap(&self, document: Document);
    /// Pops the page the navigation came from.
    fn unload_page(&self);
}

/// A host view that renders one document.
pub trait DomView {
    fn load(&self, document: Document, done: Completion);
    fn unload(&self);
    fn set_on_unload(&self, hook: Box<dyn FnMut()>);
}

pub trait DomViewFactory {
    fn create(&self) -> Rc<dyn DomView>;
}

/// Container drawn above the player.
pub trait OverlayView {
    fn set_frame(&self, frame: Frame);
    fn set_background(&self, color: Color);
    fn set_alpha(&self, alpha: f64);
    fn add_subview(&self, view: Rc<dyn TextView>);
    fn add_animation(&self, animation: Animation, key: &str);
}

pub trait TextView {
    fn set_frame(&self, frame: Frame);
    fn set_text(&self, text: AttributedText);
}

pub trait OverlayHost {
    fn create_view(&self) -> Rc<dyn OverlayView>;
    fn create_text_view(&self) -> Rc<dyn TextView>;
    /// Makes `view` the player's overlay.
    fn present(&self, view: Rc<dyn OverlayView>);
}

pub trait Notifier {
    fn alert(&self, message: &str);
}

/// Notifier for headless use: alerts become warnings in the log and are
/// kept for inspection.
#[derive(Debug, Default)]
pub struct LogNotifier {
    alerts: RefCell<Vec<String>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.borrow().clone()
    }
}

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        tracing::warn!(target: "host", message, "alert");
        self.alerts.borrow_mut().push(message.to_string());
    }
}
