use serde::{Deserialize, Serialize};

use super::document::Element;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrSpec {
    pub name: String,
    pub value: String,
}

/// Declarative description of an element subtree, e.g.
/// `{"name": "label", "text": "Hi", "attrs": [{"name": "id", "value": "x"}]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<AttrSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push(AttrSpec {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// Builds an element from a spec. Returns `None` for an unnamed spec;
/// unnamed children are skipped.
pub fn create_node(spec: &NodeSpec) -> Option<Element> {
    if spec.name.is_empty() {
        return None;
    }

    let mut element = Element::new(spec.name.clone());
    if let Some(text) = spec.text.as_deref().filter(|text| !text.is_empty()) {
        element.set_text_content(text);
    }
    for attr in &spec.attrs {
        element.set_attribute(attr.name.clone(), attr.value.clone());
    }
    for child in &spec.children {
        if let Some(node) = create_node(child) {
            element.append_child(node);
        }
    }
    Some(element)
}
