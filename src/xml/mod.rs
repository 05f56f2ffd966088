mod document;
mod node_spec;
mod templates;

pub use document::{Document, Element, Node, XmlError};
pub use node_spec::{create_node, AttrSpec, NodeSpec};
pub use templates::{
    error_document, unavailable_document, UnavailableText, ERROR_DIALOG_ID,
};
