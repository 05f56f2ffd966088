use super::document::{Document, Element};

pub const ERROR_DIALOG_ID: &str = "com.atvkit.error-dialog";

/// Text used for the generic "service unavailable" fallback page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnavailableText {
    pub message: String,
    pub description: String,
}

impl UnavailableText {
    pub fn for_service(name: &str, info_url: &str) -> Self {
        Self {
            message: format!("{name} is currently unavailable. Try again later."),
            description: format!("Go to {info_url} for more information."),
        }
    }
}

impl Default for UnavailableText {
    fn default() -> Self {
        Self {
            message: "This service is currently unavailable. Try again later.".into(),
            description: String::new(),
        }
    }
}

/// `<atv><body><dialog>` with CDATA title and description.
pub fn error_document(message: &str, description: &str) -> Document {
    let dialog = Element::new("dialog")
        .with_attr("id", ERROR_DIALOG_ID)
        .with_child(Element::new("title").with_cdata(message))
        .with_child(Element::new("description").with_cdata(description));
    Document::new(Element::new("atv").with_child(Element::new("body").with_child(dialog)))
}

pub fn unavailable_document(text: &UnavailableText) -> Document {
    error_document(&text.message, &text.description)
}
